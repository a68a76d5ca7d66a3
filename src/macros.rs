/// Constructs a per-record trace event if `trace-more` is enabled.
///
/// Record-level events fire for every FastCGI record on the wire, which is
/// too chatty for the regular trace level.
#[cfg(feature = "trace-more")]
macro_rules! trace_record {
    ($($arg:tt)+) => (::tracing::trace!(target: "gofast::wire", $($arg)+));
}
/// Constructs a per-record trace event if `trace-more` is enabled.
#[cfg(not(feature = "trace-more"))]
macro_rules! trace_record {
    ($($arg:tt)+) => {};
}
pub(crate) use trace_record;
