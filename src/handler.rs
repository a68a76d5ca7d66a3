//! The HTTP-facing entry point: one FastCGI session per inbound request.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use http::StatusCode;

use crate::client::{Client, ClientFactory};
use crate::log::{Logger, LoggerSlot};
use crate::response::{self, Relay, ResponseRecorder, ResponseWriter};
use crate::session::SessionHandler;
use crate::{Body, Request};


type Callback = Box<
    dyn for<'a> Fn(&'a mut dyn ResponseWriter, &'a http::Request<Body>) -> BoxFuture<'a, bool>
        + Send + Sync,
>;

/// A pre-dispatch callback that never handles a request itself.
///
/// Pass this to [`Handler::new`] if every request should be forwarded.
pub fn default_callback<'a>(_: &'a mut dyn ResponseWriter, _: &'a http::Request<Body>) -> BoxFuture<'a, bool> {
    future::ready(false).boxed()
}


/// Forwards HTTP requests to a FastCGI application.
///
/// A [`Handler`] is shared by all requests of a host server. For each
/// request it consults the pre-dispatch callback, acquires a client from
/// its [`ClientFactory`], runs the [`SessionHandler`] and relays the
/// response. The client is released exactly once after it was acquired,
/// even if a collaborator panics.
///
/// Failures never reach the host server. The HTTP caller sees
/// `502 Bad Gateway` if no client could be acquired and
/// `500 Internal Server Error` if the session failed. A [`Response`](crate::Response)
/// whose CGI header block is unusable is relayed as `502 Bad Gateway`. All
/// failures are reported to the handler's [`Logger`].
pub struct Handler<S, F> {
    session_handler: S,
    client_factory: F,
    callback: Callback,
    logger: LoggerSlot,
}

impl<S, F> Handler<S, F>
where
    F: ClientFactory,
    S: SessionHandler<F::Client>,
{
    /// Assembles a [`Handler`] from its collaborators. No I/O takes place.
    ///
    /// If `callback` resolves to `true`, it has served the request and the
    /// handler does nothing further. Use [`default_callback`] to forward
    /// every request.
    pub fn new<C>(session_handler: S, client_factory: F, callback: C) -> Self
    where
        C: for<'a> Fn(&'a mut dyn ResponseWriter, &'a http::Request<Body>) -> BoxFuture<'a, bool>
            + Send + Sync + 'static,
    {
        Self { session_handler, client_factory, callback: Box::new(callback), logger: LoggerSlot::default() }
    }

    /// Replaces the sink for diagnostic lines.
    ///
    /// [`None`] restores the default [`TracingLogger`](crate::TracingLogger).
    /// Requests in flight may still log some lines to the previous sink.
    pub fn set_logger(&self, logger: Option<Arc<dyn Logger>>) {
        self.logger.set(logger);
    }

    /// Serves one HTTP request by forwarding it to the FastCGI application.
    ///
    /// Everything the HTTP caller should see is written to `w`. Nothing is
    /// written to `w` once this future completes.
    pub async fn serve(&self, w: &mut dyn ResponseWriter, req: http::Request<Body>) {
        if (self.callback)(&mut *w, &req).await {
            tracing::trace!(uri = %req.uri(), "request served by callback");
            return;
        }

        let mut client = match self.client_factory.new_client().await {
            Ok(c) => c,
            Err(e) => {
                write_error(w, StatusCode::BAD_GATEWAY, "failed to connect to FastCGI application").await;
                self.logger.log(format_args!("gofast: unable to connect to FastCGI application. {e}"));
                return;
            },
        };

        // Every path after acquisition, unwinding included, ends up here
        let work = AssertUnwindSafe(self.dispatch(&mut client, w, req)).catch_unwind().await;
        if let Err(e) = client.close().await {
            self.logger.log(format_args!("gofast: error closing client: {e}"));
        }
        if let Err(payload) = work {
            panic::resume_unwind(payload);
        }
    }

    /// Serves one HTTP request into a buffered `http::Response`.
    pub async fn respond(&self, req: http::Request<Body>) -> http::Response<Vec<u8>> {
        let mut rec = ResponseRecorder::new();
        self.serve(&mut rec, req).await;
        rec.into_response()
    }

    async fn dispatch(&self, client: &mut F::Client, w: &mut dyn ResponseWriter, req: http::Request<Body>) {
        let request = Request::new(req);
        let response = match self.session_handler.handle(client, request).await {
            Ok(r) => r,
            Err(e) => {
                write_error(w, StatusCode::INTERNAL_SERVER_ERROR, "failed to process request").await;
                self.logger.log(format_args!("gofast: unable to process request {e}"));
                return;
            },
        };

        let mut errors = Vec::new();
        if let Err(e) = response.relay(w, &mut errors).await {
            self.logger.log(format_args!("gofast: problem writing error buffer to response - {e}"));
        }
        if !errors.is_empty() {
            let stderr = String::from_utf8_lossy(&errors);
            self.logger.log(format_args!("gofast: error stream from application process {}", stderr.trim_end()));
        }
    }
}

impl<S, F> fmt::Debug for Handler<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Handler").field("logger", &self.logger).finish_non_exhaustive()
    }
}

async fn write_error(w: &mut dyn ResponseWriter, status: StatusCode, message: &str) {
    if let Err(e) = response::error(w, status, message).await {
        tracing::debug!(%status, error = %e, "failed to write error response");
    }
}
