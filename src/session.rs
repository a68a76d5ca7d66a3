//! Driving a single FastCGI exchange over an acquired client.

use futures_util::future::BoxFuture;
use futures_util::io::{AsyncRead, AsyncWrite};
use futures_util::FutureExt;

use crate::response::Relay;
use crate::{cgi, Config, Error, FcgiClient, Request, Response};


/// Performs the FastCGI exchange for one request over a client `C`.
///
/// Implementations may adjust the request's CGI environment before sending
/// it. The returned response is relayed to the HTTP caller afterwards.
pub trait SessionHandler<C>: Send + Sync {
    /// The response produced by a successful exchange.
    type Response: Relay;

    /// Runs the exchange for `request` over `client`.
    ///
    /// The client stays owned by the caller, who releases it afterwards.
    ///
    /// # Errors
    /// Returns an error if the exchange failed. No part of the response has
    /// been sent to the HTTP caller at that point.
    fn handle<'a>(&'a self, client: &'a mut C, request: Request) -> BoxFuture<'a, Result<Self::Response, Error>>;
}


/// A [`SessionHandler`] for [`FcgiClient`]s.
///
/// Adds the server-side CGI variables from its [`Config`] to the request
/// before running [`FcgiClient::exchange`].
#[derive(Debug, Clone, Default)]
pub struct BasicSession {
    config: Config,
}

impl BasicSession {
    /// Creates a [`BasicSession`] applying `config`.
    #[inline]
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns the applied configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn prepare(&self, request: &mut Request) {
        request.set_param(cgi::SERVER_SOFTWARE, self.config.server_software.as_bytes());
        let Some(root) = &self.config.document_root else {
            return;
        };
        request.set_param(cgi::DOCUMENT_ROOT, root.as_os_str().as_encoded_bytes());

        let script = request.param_str(cgi::SCRIPT_NAME).and_then(|s| self.config.script_filename(s));
        if let Some(script) = script {
            request.set_param(cgi::SCRIPT_FILENAME, script.as_os_str().as_encoded_bytes());
        }
    }
}

impl<R, W> SessionHandler<FcgiClient<R, W>> for BasicSession
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    type Response = Response;

    fn handle<'a>(
        &'a self, client: &'a mut FcgiClient<R, W>, mut request: Request,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        self.prepare(&mut request);
        tracing::debug!(
            method = %request.method(), uri = %request.uri(), params = request.params().len(),
            "forwarding request to FastCGI application",
        );
        async move { client.exchange(request, &self.config).await }.boxed()
    }
}


#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tokio::io::{duplex, AsyncReadExt as _, AsyncWriteExt as _};
    use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

    use super::*;
    use crate::protocol::{nv, RecordHeader, RecordType};
    use crate::Body;

    fn request(uri: &str) -> Request {
        let req = http::Request::get(uri)
            .header(http::header::HOST, "localhost")
            .body(Body::empty())
            .expect("request should be valid");
        Request::new(req)
    }

    #[test]
    fn document_root_vars() {
        let session = BasicSession::new(Config::with_root("/srv/www").server_software("test/1.0"));
        let mut req = request("/app/index.php?q=1");
        session.prepare(&mut req);

        assert_eq!(req.param_str(cgi::DOCUMENT_ROOT), Some("/srv/www"));
        let script = req.param_str(cgi::SCRIPT_FILENAME).map(PathBuf::from);
        assert_eq!(script, Some(PathBuf::from("/srv/www/app/index.php")));
        assert_eq!(req.param_str(cgi::SERVER_SOFTWARE), Some("test/1.0"));
    }

    #[test]
    fn without_document_root() {
        let session = BasicSession::default();
        let mut req = request("/index.php");
        session.prepare(&mut req);

        assert_eq!(req.param(cgi::DOCUMENT_ROOT), None);
        assert_eq!(req.param(cgi::SCRIPT_FILENAME), None);
        assert!(req.param_str(cgi::SERVER_SOFTWARE).is_some_and(|s| s.starts_with("gofast/")));
    }

    #[tokio::test]
    async fn sends_prepared_request() -> Result<(), Error> {
        let (client_w, mut app_r) = duplex(1 << 16);
        let (mut app_w, client_r) = duplex(1 << 16);
        let mut client = FcgiClient::new(client_r.compat(), client_w.compat_write());
        let session = BasicSession::new(Config::with_root("/srv/www"));

        let app = async move {
            let mut params = Vec::new();
            loop {
                let mut head = [0; RecordHeader::LEN];
                app_r.read_exact(&mut head).await.expect("request should be complete");
                let head = RecordHeader::from_bytes(head).expect("header should be valid");
                let mut body = vec![0; head.body_len()];
                app_r.read_exact(&mut body).await.expect("request should be complete");
                body.truncate(head.content_length.into());
                match head.rtype {
                    RecordType::Params => params.extend(body),
                    RecordType::Stdin if body.is_empty() => break,
                    _ => {},
                }
            }

            let out = b"Content-Type: text/plain\n\nhi";
            let mut reply = RecordHeader::with_payload(RecordType::Stdout, 1, 28).to_bytes().to_vec();
            reply.extend_from_slice(out);
            reply.extend_from_slice(&[0; 4]);
            reply.extend_from_slice(&RecordHeader::with_payload(RecordType::EndRequest, 1, 8).to_bytes());
            reply.extend_from_slice(&[0; 8]);
            app_w.write_all(&reply).await.expect("client should be listening");

            nv::NVIter::new(&params)
                .find(|(n, _)| *n == b"SCRIPT_FILENAME")
                .map(|(_, v)| v.to_vec())
        };

        let (resp, script) = tokio::join!(session.handle(&mut client, request("/hello.php")), app);
        let resp = resp?;
        assert_eq!(script.as_deref(), Some(&b"/srv/www/hello.php"[..]));
        assert_eq!(resp.stdout, b"Content-Type: text/plain\n\nhi");
        Ok(())
    }
}
