use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;


/// Ways in which a CGI/1.1 response header block can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The output ended before the empty line terminating the headers.
    #[error("header block is not terminated by an empty line")]
    Unterminated,
    /// A header line has no `:` separator or an empty name.
    #[error("malformed header line {0}")]
    MalformedLine(usize),
    /// A header name contains characters not allowed in HTTP.
    #[error("invalid header name on line {0}")]
    InvalidName(usize),
    /// A header value contains characters not allowed in HTTP.
    #[error("invalid header value on line {0}")]
    InvalidValue(usize),
    /// The `Status` header does not start with a 3-digit HTTP status code.
    #[error("invalid Status header {0:?}")]
    InvalidStatus(String),
}


/// The parsed header block of a CGI/1.1 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    /// The HTTP status, taken from the `Status` header if present.
    pub status: StatusCode,
    /// All headers other than `Status`, in their original order.
    pub headers: HeaderMap,
}


/// Splits one line off the front of `data`, without its line terminator.
///
/// CGI/1.1 allows both `\n` and `\r\n` as line terminators.
fn split_line(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let nl = data.iter().position(|&b| b == b'\n')?;
    let line = &data[..nl];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, &data[(nl + 1)..]))
}

fn trim(mut v: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = v {
        v = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = v {
        v = rest;
    }
    v
}

fn parse_status(value: &[u8]) -> Result<StatusCode, Error> {
    let invalid = || Error::InvalidStatus(String::from_utf8_lossy(value).into_owned());
    // "Status: 404 Not Found": the reason phrase is informational only
    let code = value.get(..3).ok_or_else(invalid)?;
    if value.get(3).is_some_and(|&b| b != b' ' && b != b'\t') {
        return Err(invalid());
    }
    StatusCode::from_bytes(code).map_err(|_| invalid())
}


/// Parses the CGI/1.1 header block at the start of an application's output.
///
/// Returns the parsed [`Head`] and the offset at which the response body
/// begins. The status defaults to `200 OK`, or to `302 Found` if the
/// application sent a `Location` header without a `Status` (a client
/// redirect as per RFC 3875, Section 6.2.3).
///
/// # Errors
/// Returns an error if the header block is not terminated or any line in it
/// does not form a valid HTTP header.
pub fn parse_headers(data: &[u8]) -> Result<(Head, usize), Error> {
    let mut status = None;
    let mut headers = HeaderMap::new();
    let mut rest = data;

    for lineno in 1.. {
        let (line, next) = split_line(rest).ok_or(Error::Unterminated)?;
        rest = next;
        if line.is_empty() {
            break;
        }

        let colon = line.iter().position(|&b| b == b':').ok_or(Error::MalformedLine(lineno))?;
        let (name, value) = (trim(&line[..colon]), trim(&line[(colon + 1)..]));
        if name.is_empty() {
            return Err(Error::MalformedLine(lineno));
        }

        if name.eq_ignore_ascii_case(b"status") {
            status = Some(parse_status(value)?);
            continue;
        }
        let name = HeaderName::from_bytes(name).map_err(|_| Error::InvalidName(lineno))?;
        let value = HeaderValue::from_bytes(value).map_err(|_| Error::InvalidValue(lineno))?;
        headers.append(name, value);
    }

    let status = status.unwrap_or_else(|| {
        if headers.contains_key(header::LOCATION) { StatusCode::FOUND } else { StatusCode::OK }
    });
    Ok((Head { status, headers }, data.len() - rest.len()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_response() -> Result<(), Error> {
        const OUT: &[u8] = b"Content-Type: text/html\r\nX-Powered-By: PHP\r\n\r\n<html></html>";
        let (head, body) = parse_headers(OUT)?;
        assert_eq!(head.status, StatusCode::OK);
        assert_eq!(head.headers[header::CONTENT_TYPE], "text/html");
        assert_eq!(head.headers["x-powered-by"], "PHP");
        assert_eq!(&OUT[body..], b"<html></html>");
        Ok(())
    }

    #[test]
    fn status_header() -> Result<(), Error> {
        const OUT: &[u8] = b"status:404 Not Found\nContent-Type: text/plain\n\nmissing\n";
        let (head, body) = parse_headers(OUT)?;
        assert_eq!(head.status, StatusCode::NOT_FOUND);
        assert_eq!(head.headers.len(), 1);
        assert_eq!(&OUT[body..], b"missing\n");

        let (head, _) = parse_headers(b"Status: 204\n\n")?;
        assert_eq!(head.status, StatusCode::NO_CONTENT);
        Ok(())
    }

    #[test]
    fn redirects() -> Result<(), Error> {
        const OUT: &[u8] = b"Location: https://example.com/\n\n";
        let (head, body) = parse_headers(OUT)?;
        assert_eq!(head.status, StatusCode::FOUND);
        assert_eq!(head.headers[header::LOCATION], "https://example.com/");
        assert_eq!(body, OUT.len());

        let custom = b"Status: 307 Temporary Redirect\nLocation: /next\n\n";
        let (head, _) = parse_headers(custom)?;
        assert_eq!(head.status, StatusCode::TEMPORARY_REDIRECT);
        Ok(())
    }

    #[test]
    fn repeated_headers() -> Result<(), Error> {
        let (head, _) = parse_headers(b"Set-Cookie: a=1\nSet-Cookie: b=2\n\n")?;
        let cookies: Vec<_> = head.headers.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        Ok(())
    }

    #[test]
    fn malformed() {
        assert_eq!(parse_headers(b"Content-Type: text/plain\n"), Err(Error::Unterminated));
        assert_eq!(parse_headers(b""), Err(Error::Unterminated));
        assert_eq!(parse_headers(b"X-A: 1\nno colon here\n\n"), Err(Error::MalformedLine(2)));
        assert_eq!(parse_headers(b": empty\n\n"), Err(Error::MalformedLine(1)));
        assert_eq!(parse_headers(b"Bad Name: x\n\n"), Err(Error::InvalidName(1)));
        assert!(matches!(parse_headers(b"Status: OK\n\n"), Err(Error::InvalidStatus(_))));
        assert!(matches!(parse_headers(b"Status: 2000\n\n"), Err(Error::InvalidStatus(_))));
        assert!(matches!(parse_headers(b"Status: 99\n\n"), Err(Error::InvalidStatus(_))));
    }
}
