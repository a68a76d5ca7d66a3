use std::path::{Path, PathBuf};

use compact_str::CompactString;

use crate::protocol as fcgi;


/// Settings applied by [`BasicSession`](crate::BasicSession) to every
/// forwarded request.
///
/// The defaults forward requests without a document root, announce this
/// crate as `SERVER_SOFTWARE` and send the request body in 8 KiB records.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// The directory scripts are resolved against, sent as `DOCUMENT_ROOT`.
    ///
    /// If set, `SCRIPT_FILENAME` is derived from it and the request's
    /// `SCRIPT_NAME`.
    pub document_root: Option<PathBuf>,
    /// The value of the `SERVER_SOFTWARE` variable.
    pub server_software: CompactString,
    /// The maximum payload of a single `Stdin` record. Values outside of
    /// `1..=65528` are clamped.
    pub stdin_chunk: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document_root: None,
            server_software: CompactString::const_new(concat!("gofast/", env!("CARGO_PKG_VERSION"))),
            stdin_chunk: 8192,
        }
    }
}

impl Config {
    /// Returns a [`Config`] with the given document root and default
    /// values otherwise.
    #[must_use]
    pub fn with_root(document_root: impl Into<PathBuf>) -> Self {
        Self { document_root: Some(document_root.into()), ..Self::default() }
    }

    /// Replaces the `SERVER_SOFTWARE` value.
    #[must_use]
    pub fn server_software(mut self, software: &str) -> Self {
        self.server_software = software.into();
        self
    }

    /// Replaces the `Stdin` record size.
    #[must_use]
    pub fn stdin_chunk(mut self, bytes: usize) -> Self {
        self.stdin_chunk = bytes;
        self
    }

    /// Returns the effective `Stdin` record size.
    #[inline]
    #[must_use]
    pub(crate) fn chunk_len(&self) -> usize {
        self.stdin_chunk.clamp(1, fcgi::MAX_ALIGNED_PAYLOAD.into())
    }

    /// Resolves a CGI script name against the document root.
    #[must_use]
    pub(crate) fn script_filename(&self, script_name: &str) -> Option<PathBuf> {
        let root: &Path = self.document_root.as_deref()?;
        Some(root.join(script_name.trim_start_matches('/')))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_clamping() {
        assert_eq!(Config::default().chunk_len(), 8192);
        assert_eq!(Config::default().stdin_chunk(0).chunk_len(), 1);
        assert_eq!(Config::default().stdin_chunk(usize::MAX).chunk_len(), 65528);
    }

    #[test]
    fn script_resolution() {
        assert_eq!(Config::default().script_filename("/index.php"), None);
        let config = Config::with_root("/var/www");
        assert_eq!(
            config.script_filename("/blog/index.php"),
            Some(PathBuf::from("/var/www/blog/index.php")),
        );
        assert!(Config::default().server_software.starts_with("gofast/"));
    }
}
