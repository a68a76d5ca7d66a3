//! Channels to a FastCGI application.
//!
//! A [`Client`] is acquired from a [`ClientFactory`] for every request and
//! released exactly once afterwards. [`FcgiClient`] implements the FastCGI
//! wire exchange over any pair of `futures-util` IO halves.

use std::future::Future;
use std::pin::pin;

use futures_util::future::{self, BoxFuture, Either};
use futures_util::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use futures_util::FutureExt;

use crate::macros::trace_record;
use crate::protocol::{self as fcgi, body, nv, RecordHeader, RecordType};
use crate::{Config, Error, Request, Response};


/// A channel to a FastCGI application, owned by a single request.
pub trait Client: Send + 'static {
    /// Releases the channel and any resources held by it.
    ///
    /// Consuming `self` guarantees a client is released at most once.
    ///
    /// # Errors
    /// Returns an error if releasing the underlying resources failed.
    fn close(self) -> BoxFuture<'static, Result<(), Error>>;
}


/// A source of [`Client`]s.
///
/// Closures returning a future of `Result<C, Error>` implement this trait:
///
/// ```
/// # use gofast::{Client, ClientFactory, Error};
/// # use futures_util::future::{self, BoxFuture, FutureExt};
/// struct Null;
/// impl Client for Null {
///     fn close(self) -> BoxFuture<'static, Result<(), Error>> {
///         future::ready(Ok(())).boxed()
///     }
/// }
///
/// fn assert_factory(_: impl ClientFactory) {}
/// assert_factory(|| future::ready(Ok::<_, Error>(Null)));
/// ```
pub trait ClientFactory: Send + Sync {
    /// The type of client produced.
    type Client: Client;

    /// Acquires a new client.
    ///
    /// # Errors
    /// Returns an error if no channel to the application could be opened.
    fn new_client(&self) -> BoxFuture<'_, Result<Self::Client, Error>>;
}

impl<F, Fut, C> ClientFactory for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<C, Error>> + Send + 'static,
    C: Client,
{
    type Client = C;

    #[inline]
    fn new_client(&self) -> BoxFuture<'_, Result<C, Error>> {
        self().boxed()
    }
}


/// The request ID used for the single request on each connection.
const REQUEST_ID: u16 = 1;

/// A FastCGI connection carrying a single request in the Responder role.
///
/// The connection is split into a read half `R` and a write half `W`. The
/// application is not asked to keep the connection open, so it is expected
/// to close its end after the `EndRequest` record.
#[derive(Debug)]
pub struct FcgiClient<R, W> {
    reader: R,
    writer: W,
    rbuf: Vec<u8>,
    wbuf: Vec<u8>,
}

/// How sending the request ended, if the request body could be read.
enum Sent {
    Complete,
    /// The application stopped accepting input.
    Aborted(Error),
}

impl<R, W> FcgiClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wraps the two halves of an established FastCGI connection.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer, rbuf: Vec::new(), wbuf: Vec::new() }
    }

    /// Sends `request` to the application and collects its response.
    ///
    /// The request's environment is sent as the `Params` stream and its body
    /// as the `Stdin` stream, split into records of at most
    /// `Config::stdin_chunk` bytes. The response is read while the request
    /// is still being sent, until the application's `EndRequest` record. An
    /// application may answer without consuming the whole body, in which
    /// case the rest of it is not sent.
    ///
    /// # Errors
    /// Returns an error if the connection fails or ends early, if the request
    /// body cannot be read, if the application sends malformed records, or if
    /// it ends the request with a protocol status other than
    /// `RequestComplete`.
    pub async fn exchange(&mut self, mut request: Request, config: &Config) -> Result<Response, Error> {
        let Self { reader, writer, rbuf, wbuf } = self;
        let send = pin!(send_request(writer, wbuf, &mut request, config.chunk_len()));
        let recv = pin!(read_response(reader, rbuf));

        match future::select(send, recv).await {
            Either::Left((Err(e), _)) => Err(e),
            Either::Left((Ok(sent), recv)) => {
                if let Sent::Aborted(e) = sent {
                    tracing::debug!(error = %e, "application stopped reading the request");
                }
                recv.await
            },
            Either::Right((resp, _)) => {
                if resp.is_ok() {
                    tracing::trace!("application answered before the request was fully sent");
                }
                resp
            },
        }
    }
}

/// Writes the whole request. Failures of the connection are reported as
/// [`Sent::Aborted`], failures of the request body as errors.
async fn send_request<W>(writer: &mut W, buf: &mut Vec<u8>, request: &mut Request, chunk_len: usize) -> Result<Sent, Error>
where
    W: AsyncWrite + Unpin,
{
    let mut params = Vec::new();
    for (name, value) in request.params() {
        nv::write((name.as_bytes(), value), &mut params)?;
    }

    let begin = body::BeginRequest { role: fcgi::Role::Responder, flags: fcgi::RequestFlags::empty() };
    if let Err(e) = writer.write_all(&begin.to_record(REQUEST_ID)).await {
        return Ok(Sent::Aborted(e.into()));
    }
    for chunk in params.chunks(fcgi::MAX_ALIGNED_PAYLOAD.into()) {
        if let Err(e) = write_record(writer, buf, RecordType::Params, chunk).await {
            return Ok(Sent::Aborted(e));
        }
    }
    if let Err(e) = write_record(writer, buf, RecordType::Params, &[]).await {
        return Ok(Sent::Aborted(e));
    }

    let mut chunk = vec![0; chunk_len];
    let mut stdin_len = 0;
    loop {
        let n = request.body_mut().read(&mut chunk).await?;
        if let Err(e) = write_record(writer, buf, RecordType::Stdin, &chunk[..n]).await {
            return Ok(Sent::Aborted(e));
        }
        if n == 0 {
            break;
        }
        stdin_len += n;
    }
    if let Err(e) = writer.flush().await {
        return Ok(Sent::Aborted(e.into()));
    }

    tracing::trace!(params = params.len(), stdin = stdin_len, "sent FastCGI request");
    Ok(Sent::Complete)
}

/// Writes one stream record, padded to 8-byte alignment.
async fn write_record<W>(writer: &mut W, buf: &mut Vec<u8>, rtype: RecordType, payload: &[u8]) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let len = u16::try_from(payload.len()).map_err(|_| fcgi::Error::InvalidLength)?;
    let head = RecordHeader::with_payload(rtype, REQUEST_ID, len);
    trace_record!(?rtype, len, "writing record");

    buf.clear();
    buf.extend_from_slice(&head.to_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(head.padding_bytes());
    writer.write_all(buf.as_slice()).await?;
    Ok(())
}

async fn read_response<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<Response, Error>
where
    R: AsyncRead + Unpin,
{
    let mut resp = Response::default();
    loop {
        let mut head = [0; RecordHeader::LEN];
        reader.read_exact(&mut head).await?;
        let head = RecordHeader::from_bytes(head)?;

        buf.resize(head.body_len(), 0);
        reader.read_exact(buf.as_mut_slice()).await?;
        let payload = &buf[..head.content_length.into()];

        if head.is_management() {
            if head.rtype == RecordType::Unknown {
                let unknown = body::UnknownType::from_bytes(payload)?;
                tracing::debug!(rtype = unknown.rtype, "application did not understand a management record");
            } else {
                trace_record!(rtype = ?head.rtype, "skipping management record");
            }
            continue;
        }
        if head.request_id != REQUEST_ID {
            trace_record!(request_id = head.request_id, "skipping record for another request");
            continue;
        }

        match head.rtype {
            RecordType::Stdout => resp.stdout.extend_from_slice(payload),
            RecordType::Stderr => resp.stderr.extend_from_slice(payload),
            RecordType::EndRequest => {
                let end = body::EndRequest::from_bytes(payload)?;
                if end.protocol_status != fcgi::ProtocolStatus::RequestComplete {
                    return Err(Error::Rejected(end.protocol_status));
                }
                resp.app_status = end.app_status;
                tracing::trace!(
                    stdout = resp.stdout.len(), stderr = resp.stderr.len(),
                    app_status = end.app_status, "received FastCGI response",
                );
                return Ok(resp);
            },
            rtype => {
                tracing::debug!(?rtype, "ignoring unexpected record from application");
            },
        }
    }
}

impl<R, W> Client for FcgiClient<R, W>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    fn close(mut self) -> BoxFuture<'static, Result<(), Error>> {
        async move {
            self.writer.close().await?;
            Ok::<_, Error>(())
        }.boxed()
    }
}


#[cfg(feature = "tokio")]
pub use net::*;

#[cfg(feature = "tokio")]
mod net {
    use tokio::net::{tcp, TcpStream, ToSocketAddrs};
    use tokio_util::compat::{Compat, TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

    use super::{ClientFactory, FcgiClient};
    use crate::Error;

    /// A [`FcgiClient`] over a TCP connection.
    pub type TcpClient = FcgiClient<Compat<tcp::OwnedReadHalf>, Compat<tcp::OwnedWriteHalf>>;

    /// Opens a TCP connection to a FastCGI application.
    ///
    /// # Errors
    /// Returns an error if the address does not resolve or the connection
    /// cannot be established.
    pub async fn connect_tcp(addr: impl ToSocketAddrs) -> Result<TcpClient, Error> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (r, w) = stream.into_split();
        Ok(FcgiClient::new(r.compat(), w.compat_write()))
    }

    /// Returns a [`ClientFactory`] opening a new TCP connection to `addr`
    /// for every request.
    pub fn tcp_factory(addr: impl Into<String>) -> impl ClientFactory<Client = TcpClient> {
        let addr: String = addr.into();
        move || connect_tcp(addr.clone())
    }

    #[cfg(unix)]
    pub use self::unix::*;

    #[cfg(unix)]
    mod unix {
        use std::path::{Path, PathBuf};

        use tokio::net::{unix, UnixStream};
        use tokio_util::compat::{Compat, TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

        use crate::client::{ClientFactory, FcgiClient};
        use crate::Error;

        /// A [`FcgiClient`] over a Unix domain socket.
        pub type UnixClient = FcgiClient<Compat<unix::OwnedReadHalf>, Compat<unix::OwnedWriteHalf>>;

        /// Connects to a FastCGI application listening on a Unix socket.
        ///
        /// # Errors
        /// Returns an error if the connection cannot be established.
        pub async fn connect_unix(path: impl AsRef<Path>) -> Result<UnixClient, Error> {
            let stream = UnixStream::connect(path).await?;
            let (r, w) = stream.into_split();
            Ok(FcgiClient::new(r.compat(), w.compat_write()))
        }

        /// Returns a [`ClientFactory`] opening a new connection to the Unix
        /// socket at `path` for every request.
        pub fn unix_factory(path: impl Into<PathBuf>) -> impl ClientFactory<Client = UnixClient> {
            let path: PathBuf = path.into();
            move || connect_unix(path.clone())
        }
    }
}
