//! Writing HTTP responses, and the FastCGI responses relayed into them.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::io::AsyncWrite;
use futures_util::{AsyncWriteExt, FutureExt};
use http::header::{self, HeaderMap, HeaderValue};
use http::StatusCode;

use crate::{cgi, Error};


/// The HTTP response writer of the host server.
///
/// The head (status line and headers) is committed by `write_head` or,
/// failing that, by the first body write, which implies `200 OK`. Header
/// changes after the commit have no effect on the wire.
pub trait ResponseWriter: AsyncWrite + Send + Unpin {
    /// Returns the headers to be sent with the head.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commits the head with the given status. Only the first call has an
    /// effect.
    fn write_head(&mut self, status: StatusCode);
}


/// Writes a plain-text error response.
///
/// `message` is sent verbatim as the body. Any `Content-Length` set earlier
/// is dropped since it would not match the message.
///
/// # Errors
/// Any errors from writing the body are forwarded to the caller.
pub async fn error(w: &mut dyn ResponseWriter, status: StatusCode, message: &str) -> io::Result<()> {
    let headers = w.headers_mut();
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    w.write_head(status);
    w.write_all(message.as_bytes()).await?;
    w.flush().await
}


/// An in-memory [`ResponseWriter`].
///
/// Hosts that work with complete `http::Response` values can serve into a
/// [`ResponseRecorder`] and convert it afterwards.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    headers: HeaderMap,
    head: Option<(StatusCode, HeaderMap)>,
    body: Vec<u8>,
}

impl ResponseRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed status, or `200 OK` if nothing was committed.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.head.as_ref().map_or(StatusCode::OK, |(s, _)| *s)
    }

    /// Returns the headers as they were at commit time, or the current
    /// headers if nothing was committed.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.head.as_ref().map_or(&self.headers, |(_, h)| h)
    }

    /// Returns the body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Tests whether the head was committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.head.is_some()
    }

    /// Converts the recording into an `http::Response`.
    #[must_use]
    pub fn into_response(self) -> http::Response<Vec<u8>> {
        let (status, headers) = self.head.unwrap_or((StatusCode::OK, self.headers));
        let mut response = http::Response::new(self.body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) {
        if let Some((committed, _)) = &self.head {
            tracing::debug!(%committed, ignored = %status, "response head was already written");
            return;
        }
        self.head = Some((status, self.headers.clone()));
    }
}

impl AsyncWrite for ResponseRecorder {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.head.is_none() {
            this.write_head(StatusCode::OK);
        }
        this.body.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    #[inline]
    fn poll_flush(self: Pin<&mut Self>, _: &mut Context) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    #[inline]
    fn poll_close(self: Pin<&mut Self>, _: &mut Context) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}


/// The result of a FastCGI session, ready to be relayed to the HTTP caller.
pub trait Relay: Send + 'static {
    /// Writes the response to `w` and any error stream output of the
    /// application to `errors`.
    ///
    /// # Errors
    /// Failures to produce or write the response. By the time an error is
    /// returned, parts of the response may already have been written to `w`.
    fn relay<'a>(self, w: &'a mut dyn ResponseWriter, errors: &'a mut Vec<u8>) -> BoxFuture<'a, Result<(), Error>>;
}


/// A complete FastCGI response as collected by [`FcgiClient`](crate::FcgiClient).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// The application's `Stdout` stream: a CGI/1.1 response.
    pub stdout: Vec<u8>,
    /// The application's `Stderr` stream.
    pub stderr: Vec<u8>,
    /// The application's exit status from its `EndRequest` record.
    pub app_status: u32,
}

impl Response {
    async fn write_to(self, w: &mut dyn ResponseWriter, errors: &mut Vec<u8>) -> Result<(), Error> {
        // The error stream is surfaced even if the document is unusable
        errors.extend_from_slice(&self.stderr);

        let (head, offset) = match cgi::response::parse_headers(&self.stdout) {
            Ok(parsed) => parsed,
            Err(e) => {
                // Nothing is committed yet, so the caller still gets a failure status
                error(w, StatusCode::BAD_GATEWAY, "invalid response from FastCGI application").await?;
                return Err(e.into());
            },
        };
        w.headers_mut().extend(head.headers);
        w.write_head(head.status);
        w.write_all(&self.stdout[offset..]).await?;
        w.flush().await?;
        Ok(())
    }
}

impl Relay for Response {
    fn relay<'a>(self, w: &'a mut dyn ResponseWriter, errors: &'a mut Vec<u8>) -> BoxFuture<'a, Result<(), Error>> {
        self.write_to(w, errors).boxed()
    }
}
