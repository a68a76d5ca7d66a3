use compact_str::CompactString;

pub mod response;

pub use StaticVarName::*;


/// A CGI/1.1 meta-variable name set by the gateway.
///
/// The variants are exposed as constants on the [`cgi`](crate::cgi) module.
/// They convert into `&'static str` and can be passed wherever
/// [`Request`](crate::Request) expects a variable name.
#[allow(missing_docs, non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr, strum::AsRefStr)]
#[non_exhaustive]
pub enum StaticVarName {
    // From RFC 3875, Section 4.1 (CGI/1.1)
    AUTH_TYPE,
    CONTENT_LENGTH,
    CONTENT_TYPE,
    GATEWAY_INTERFACE,
    PATH_INFO,
    QUERY_STRING,
    REMOTE_ADDR,
    REMOTE_PORT,
    REQUEST_METHOD,
    SCRIPT_NAME,
    SERVER_NAME,
    SERVER_PORT,
    SERVER_PROTOCOL,
    SERVER_SOFTWARE,

    // Common web server extensions (Apache, nginx)
    DOCUMENT_ROOT,
    DOCUMENT_URI,
    HTTPS,
    REQUEST_SCHEME,
    REQUEST_URI,
    SCRIPT_FILENAME,
}

/// The `GATEWAY_INTERFACE` value announced to applications.
pub const GATEWAY_VERSION: &str = "CGI/1.1";

/// The prefix of meta-variables carrying HTTP request headers.
const HTTP_PREFIX: &str = "HTTP_";


/// Maps an HTTP request header name to its CGI/1.1 meta-variable name.
///
/// The name is upper-cased, dashes become underscores and the result is
/// prefixed with `HTTP_` (RFC 3875, Section 4.1.18). `Content-Type` and
/// `Content-Length` have dedicated variables and are mapped to those.
#[must_use]
pub fn header_var_name(name: &http::HeaderName) -> CompactString {
    if *name == http::header::CONTENT_TYPE {
        return CONTENT_TYPE.as_ref().into();
    }
    if *name == http::header::CONTENT_LENGTH {
        return CONTENT_LENGTH.as_ref().into();
    }

    let mut var = CompactString::with_capacity(HTTP_PREFIX.len() + name.as_str().len());
    var.push_str(HTTP_PREFIX);
    var.extend(name.as_str().chars().map(|c| match c {
        '-' => '_',
        c => c.to_ascii_uppercase(),
    }));
    var
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_names() {
        let name: &'static str = REQUEST_METHOD.into();
        assert_eq!(name, "REQUEST_METHOD");
        assert_eq!(SCRIPT_FILENAME.as_ref(), "SCRIPT_FILENAME");
    }

    #[test]
    fn header_names() {
        use http::header::{self, HeaderName};
        assert_eq!(header_var_name(&header::ACCEPT_ENCODING), "HTTP_ACCEPT_ENCODING");
        assert_eq!(header_var_name(&header::HOST), "HTTP_HOST");
        assert_eq!(header_var_name(&header::CONTENT_TYPE), "CONTENT_TYPE");
        assert_eq!(header_var_name(&header::CONTENT_LENGTH), "CONTENT_LENGTH");

        let custom = HeaderName::from_static("x-forwarded-proto");
        assert_eq!(header_var_name(&custom), "HTTP_X_FORWARDED_PROTO");
    }
}
