//! The FastCGI-side view of an inbound HTTP request.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use compact_str::CompactString;
use futures_util::io::{AsyncRead, Cursor};
use http::header::{self, HeaderMap};
use smallvec::SmallVec;

use crate::cgi;


const SMALLVEC_BASE_SIZE: usize = std::mem::size_of::<SmallVec<[u8; 0]>>();
// Maximum number of inline bytes before SmallVec exceeds SMALLVEC_BASE_SIZE.
// This derives from SmallVec's layout, which uses 1 usize as discriminant.
const INLINE_BYTES: usize = SMALLVEC_BASE_SIZE - std::mem::size_of::<usize>();
type SmallBytes = SmallVec<[u8; INLINE_BYTES]>;


/// The body of an inbound HTTP request.
///
/// [`Body`] erases the type of the host server's body reader. It is sent to
/// the FastCGI application as the `Stdin` stream. The reader must be `Sync`
/// so that the pre-dispatch callback can borrow the request across `.await`
/// points in a `Send` future.
#[derive(Default)]
pub struct Body(Option<Box<dyn AsyncRead + Send + Sync + Unpin>>);

impl Body {
    /// Returns a body without any content.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self(None)
    }

    /// Wraps a reader producing the body's content.
    #[inline]
    #[must_use]
    pub fn from_reader<R: AsyncRead + Send + Sync + Unpin + 'static>(reader: R) -> Self {
        Self(Some(Box::new(reader)))
    }
}

impl AsyncRead for Body {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().0 {
            Some(r) => Pin::new(r).poll_read(cx, buf),
            None => Poll::Ready(Ok(0)),
        }
    }
}

impl From<Vec<u8>> for Body {
    #[inline]
    fn from(v: Vec<u8>) -> Self {
        Self::from_reader(Cursor::new(v))
    }
}

impl From<&'static [u8]> for Body {
    #[inline]
    fn from(v: &'static [u8]) -> Self {
        Self::from_reader(v)
    }
}

impl From<String> for Body {
    #[inline]
    fn from(v: String) -> Self {
        v.into_bytes().into()
    }
}

impl From<&'static str> for Body {
    #[inline]
    fn from(v: &'static str) -> Self {
        v.as_bytes().into()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(if self.0.is_some() { "Body(..)" } else { "Body(empty)" })
    }
}


/// The peer address of an inbound connection.
///
/// Host servers insert this into the extensions of the `http::Request` to
/// populate `REMOTE_ADDR` and `REMOTE_PORT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteAddr(pub SocketAddr);


/// An HTTP request translated into a CGI/1.1 environment and a body stream.
///
/// [`Request::new`] derives the environment from the HTTP request line,
/// headers and extensions. Session handlers may adjust the variables before
/// the request is sent to the FastCGI application.
#[derive(Debug)]
pub struct Request {
    parts: http::request::Parts,
    params: BTreeMap<CompactString, SmallBytes>,
    body: Body,
}

impl Request {
    /// Translates an inbound HTTP request.
    #[must_use]
    pub fn new(request: http::Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        let mut req = Self { parts, params: BTreeMap::new(), body };
        req.fill_request_vars();
        req.fill_server_vars();
        req.fill_header_vars();
        req
    }

    fn fill_request_vars(&mut self) {
        let uri = self.parts.uri.clone();
        let path = uri.path();
        let protocol = match self.parts.version {
            http::Version::HTTP_09 => "HTTP/0.9",
            http::Version::HTTP_10 => "HTTP/1.0",
            http::Version::HTTP_2 => "HTTP/2.0",
            http::Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/1.1",
        };
        let method = self.parts.method.clone();

        self.set_param(cgi::GATEWAY_INTERFACE, cgi::GATEWAY_VERSION);
        self.set_param(cgi::SERVER_PROTOCOL, protocol);
        self.set_param(cgi::REQUEST_METHOD, method.as_str());
        self.set_param(cgi::REQUEST_URI, uri.path_and_query().map_or(path, |pq| pq.as_str()));
        self.set_param(cgi::SCRIPT_NAME, path);
        self.set_param(cgi::DOCUMENT_URI, path);
        self.set_param(cgi::QUERY_STRING, uri.query().unwrap_or_default());

        let content_type = self.parts.headers.get(header::CONTENT_TYPE).cloned();
        let content_length = self.parts.headers.get(header::CONTENT_LENGTH).cloned();
        self.set_param(cgi::CONTENT_TYPE, content_type.as_ref().map_or(&b""[..], |v| v.as_bytes()));
        self.set_param(cgi::CONTENT_LENGTH, content_length.as_ref().map_or(&b""[..], |v| v.as_bytes()));
    }

    fn fill_server_vars(&mut self) {
        let https = self.parts.uri.scheme() == Some(&http::uri::Scheme::HTTPS);
        let scheme = if https { "https" } else { "http" };
        self.set_param(cgi::REQUEST_SCHEME, scheme);
        if https {
            self.set_param(cgi::HTTPS, "on");
        }

        let host = self.parts.headers.get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.parse::<http::uri::Authority>().ok())
            .or_else(|| self.parts.uri.authority().cloned());
        if let Some(host) = host {
            let port = host.port_u16().unwrap_or(if https { 443 } else { 80 });
            self.set_param(cgi::SERVER_NAME, host.host());
            self.set_param(cgi::SERVER_PORT, port.to_string());
        }

        if let Some(&RemoteAddr(addr)) = self.parts.extensions.get::<RemoteAddr>() {
            self.set_param(cgi::REMOTE_ADDR, addr.ip().to_canonical().to_string());
            self.set_param(cgi::REMOTE_PORT, addr.port().to_string());
        }
    }

    fn fill_header_vars(&mut self) {
        let headers: &HeaderMap = &self.parts.headers;
        let mut vars = Vec::with_capacity(headers.keys_len());
        for name in headers.keys() {
            // Content-* already have their own variables. HTTP_PROXY would
            // be mistaken for a proxy setting by many applications (httpoxy).
            let skip = [header::CONTENT_TYPE, header::CONTENT_LENGTH, header::PROXY_AUTHORIZATION];
            if skip.contains(name) || name.as_str() == "proxy" {
                continue;
            }

            let sep: &[u8] = if *name == header::COOKIE { b"; " } else { b", " };
            let mut value = SmallBytes::new();
            for (i, v) in headers.get_all(name).iter().enumerate() {
                if i > 0 {
                    value.extend_from_slice(sep);
                }
                value.extend_from_slice(v.as_bytes());
            }
            vars.push((cgi::header_var_name(name), value));
        }
        self.params.extend(vars);
    }

    /// Returns the HTTP method of the request.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &http::Method {
        &self.parts.method
    }

    /// Returns the request URI.
    #[inline]
    #[must_use]
    pub fn uri(&self) -> &http::Uri {
        &self.parts.uri
    }

    /// Returns the HTTP request headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Returns the extensions attached to the HTTP request by the host server.
    #[inline]
    #[must_use]
    pub fn extensions(&self) -> &http::Extensions {
        &self.parts.extensions
    }

    /// Retrieves the value of a CGI variable, if it is set.
    #[must_use]
    pub fn param(&self, name: impl AsRef<str>) -> Option<&[u8]> {
        self.params.get(name.as_ref()).map(AsRef::as_ref)
    }

    /// Retrieves the value of a CGI variable if it is set and valid UTF-8.
    #[must_use]
    pub fn param_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.param(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Sets a CGI variable, replacing any previous value.
    pub fn set_param(&mut self, name: impl AsRef<str>, value: impl AsRef<[u8]>) {
        self.params.insert(name.as_ref().into(), SmallBytes::from_slice(value.as_ref()));
    }

    /// Removes a CGI variable, returning whether it was set.
    pub fn remove_param(&mut self, name: impl AsRef<str>) -> bool {
        self.params.remove(name.as_ref()).is_some()
    }

    /// Returns an iterator over all CGI variables, sorted by name.
    pub fn params(&self) -> impl ExactSizeIterator<Item = (&str, &[u8])> + Clone + '_ {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Returns the body, to be sent as the `Stdin` stream.
    #[inline]
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}
