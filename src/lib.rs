// TODO(docs): #![deny(missing_docs)]
#![deny(unsafe_code, single_use_lifetimes, unused_lifetimes)]
#![warn(keyword_idents, let_underscore_drop, unreachable_pub, unused_import_braces)]

#![deny(clippy::suspicious, clippy::cargo)]
#![deny(clippy::exit, clippy::semicolon_inside_block, clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::multiple_crate_versions)]
#![allow(clippy::enum_glob_use, clippy::items_after_statements, clippy::module_name_repetitions)]

//! The "web server" half of FastCGI: an HTTP handler that forwards each
//! request to a FastCGI application and relays the application's response.
//!
//! [`Handler`] is the entry point. It is assembled from a [`SessionHandler`]
//! that drives one FastCGI exchange, a [`ClientFactory`] that opens the
//! channel for it, and a pre-dispatch callback that may answer a request on
//! its own. [`BasicSession`] and [`FcgiClient`] are ready-made collaborators
//! speaking the FastCGI wire protocol.

use std::io;

mod macros;

/// Runtime configuration for the bundled session handler.
mod config;

// Based on the FastCGI spec, Section 8, seen from the web server side.
// See: https://fastcgi-archives.github.io/FastCGI_Specification.html
pub mod protocol;

/// Helpers for CGI/1.1 environments and response headers.
pub mod cgi;

pub mod client;
pub mod handler;
pub mod log;
pub mod request;
pub mod response;
pub mod session;

pub use client::{Client, ClientFactory, FcgiClient};
pub use config::Config;
pub use handler::{default_callback, Handler};
pub use log::{Logger, TracingLogger};
pub use request::{Body, RemoteAddr, Request};
pub use response::{Relay, Response, ResponseRecorder, ResponseWriter};
pub use session::{BasicSession, SessionHandler};


/// Errors reported by the collaborators of a [`Handler`].
///
/// The handler never returns these to the HTTP caller. They end up in the
/// diagnostic log, while the caller sees a fixed status code.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O operation on the FastCGI connection or the HTTP writer failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The application sent a record that could not be decoded.
    #[error("FastCGI protocol error: {0}")]
    Protocol(#[from] protocol::Error),

    /// The application ended the request with a status other than
    /// [`RequestComplete`](protocol::ProtocolStatus::RequestComplete).
    #[error("FastCGI application rejected the request: {0}")]
    Rejected(protocol::ProtocolStatus),

    /// The application's standard output was not a valid CGI response.
    #[error("invalid CGI response from FastCGI application: {0}")]
    InvalidResponse(#[from] cgi::response::Error),

    /// A failure from a user-supplied collaborator.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary error from a user-supplied collaborator.
    pub fn other<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Other(error.into())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let refused = Error::from(io::Error::new(io::ErrorKind::ConnectionRefused, "dial tcp: refused"));
        assert_eq!(refused.to_string(), "dial tcp: refused");

        let other = Error::other("broken pipe");
        assert_eq!(other.to_string(), "broken pipe");

        let rejected = Error::Rejected(protocol::ProtocolStatus::Overloaded);
        assert_eq!(
            rejected.to_string(),
            "FastCGI application rejected the request: application overloaded",
        );
    }

    #[test]
    fn trait_check() {
        fn ok<T: Send + Sync>() {}
        ok::<Error>();
        ok::<Config>();
    }
}
