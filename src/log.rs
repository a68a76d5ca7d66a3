//! Diagnostic sinks for [`Handler`](crate::Handler).
//!
//! Every diagnostic line the handler emits starts with `gofast:`, so
//! operators can grep for them regardless of the sink.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;


/// A sink for the diagnostic lines of a [`Handler`](crate::Handler).
///
/// Closures taking a `&str` implement this trait.
pub trait Logger: Send + Sync {
    /// Records one complete diagnostic line.
    fn log(&self, line: &str);
}

impl<F: Fn(&str) + Send + Sync> Logger for F {
    #[inline]
    fn log(&self, line: &str) {
        self(line);
    }
}


/// The process-wide default [`Logger`].
///
/// Lines become `tracing` events at the error level with target `gofast`.
/// Where they end up depends on the installed `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, line: &str) {
        tracing::error!(target: "gofast", "{line}");
    }
}


/// A [`Logger`] slot that can be replaced while readers are active.
///
/// Readers clone the current `Arc` under a read lock, so a concurrent
/// replacement never yields a torn reference. Lines logged while the slot is
/// being replaced may still reach the previous sink.
#[derive(Default)]
pub(crate) struct LoggerSlot(RwLock<Option<Arc<dyn Logger>>>);

impl LoggerSlot {
    /// Replaces the sink. [`None`] restores [`TracingLogger`].
    pub(crate) fn set(&self, logger: Option<Arc<dyn Logger>>) {
        *self.0.write() = logger;
    }

    /// Formats and records one line on the current sink.
    pub(crate) fn log(&self, args: fmt::Arguments) {
        let line = args.to_string();
        let logger = self.0.read().clone();
        match logger {
            Some(l) => l.log(&line),
            None => TracingLogger.log(&line),
        }
    }
}

impl fmt::Debug for LoggerSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let custom = self.0.read().is_some();
        f.debug_struct("LoggerSlot").field("custom", &custom).finish()
    }
}


#[cfg(test)]
pub(crate) mod tests {
    use std::io;
    use std::sync::Mutex;

    use super::*;

    /// A [`Logger`] collecting lines in memory.
    #[derive(Debug, Default)]
    pub(crate) struct Captured(Mutex<Vec<String>>);

    impl Captured {
        pub(crate) fn lines(&self) -> Vec<String> {
            self.0.lock().map(|l| l.clone()).unwrap_or_default()
        }
    }

    impl Logger for Captured {
        fn log(&self, line: &str) {
            if let Ok(mut lines) = self.0.lock() {
                lines.push(line.to_owned());
            }
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn default_goes_to_tracing() {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            LoggerSlot::default().log(format_args!("gofast: error closing client: {}", "eof"));
        });
        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("ERROR"), "{out}");
        assert!(out.contains("gofast: error closing client: eof"), "{out}");
    }

    #[test]
    fn replace_and_restore() {
        let slot = LoggerSlot::default();
        let first = Arc::new(Captured::default());
        let second = Arc::new(Captured::default());

        slot.set(Some(first.clone()));
        slot.log(format_args!("gofast: one"));
        slot.set(Some(second.clone()));
        slot.log(format_args!("gofast: {}", "two"));
        slot.set(None);
        slot.log(format_args!("gofast: three"));

        assert_eq!(first.lines(), ["gofast: one"]);
        assert_eq!(second.lines(), ["gofast: two"]);
        assert_eq!(format!("{slot:?}"), "LoggerSlot { custom: false }");
    }

    #[test]
    fn closures_are_loggers() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        let slot = LoggerSlot::default();
        slot.set(Some(Arc::new(move |line: &str| sink.lock().unwrap().push_str(line))));
        slot.log(format_args!("gofast: closure"));
        assert_eq!(*seen.lock().unwrap(), "gofast: closure");
    }
}
