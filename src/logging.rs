//! Logging handle passed into the encoder
//!
//! Records go through the `log` facade. By default they reach whatever
//! logger the application installed; an encoder can instead be handed its
//! own `log::Log` implementation so that its records stay separate.

use log::{Level, Log, Metadata, Record};
use std::fmt;
use std::sync::Arc;

/// Target attached to every record the encoder emits
pub const LOG_TARGET: &str = "s_zipstream";

#[derive(Clone, Default)]
enum Sink {
    #[default]
    Global,
    Injected(Arc<dyn Log>),
}

/// Structured logging handle owned by a [`ZipStream`](crate::ZipStream)
#[derive(Clone, Default)]
pub struct StreamLogger {
    sink: Sink,
}

impl StreamLogger {
    /// Log through the process-wide `log` logger
    pub fn global() -> Self {
        Self { sink: Sink::Global }
    }

    /// Log through `logger` only
    pub fn new(logger: Arc<dyn Log>) -> Self {
        Self {
            sink: Sink::Injected(logger),
        }
    }

    pub(crate) fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(LOG_TARGET).build();
        let enabled = match &self.sink {
            Sink::Global => level <= log::max_level() && log::logger().enabled(&metadata),
            Sink::Injected(logger) => logger.enabled(&metadata),
        };
        if !enabled {
            return;
        }

        let record = Record::builder()
            .metadata(metadata)
            .args(args)
            .module_path_static(Some(module_path!()))
            .build();
        match &self.sink {
            Sink::Global => log::logger().log(&record),
            Sink::Injected(logger) => logger.log(&record),
        }
    }
}

impl fmt::Debug for StreamLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sink {
            Sink::Global => f.write_str("StreamLogger(global)"),
            Sink::Injected(_) => f.write_str("StreamLogger(injected)"),
        }
    }
}

macro_rules! stream_log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format_args!($($arg)+))
    };
}

pub(crate) use stream_log;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Collects records in memory
    #[derive(Default)]
    pub(crate) struct MemoryLog {
        pub(crate) records: Mutex<Vec<(Level, String)>>,
    }

    impl Log for MemoryLog {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            assert_eq!(record.target(), LOG_TARGET);
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    #[test]
    fn test_injected_logger_receives_records() {
        let memory = Arc::new(MemoryLog::default());
        let logger = StreamLogger::new(memory.clone());
        stream_log!(logger, Level::Warn, "skipping {}", "namea");

        let records = memory.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], (Level::Warn, "skipping namea".to_string()));
    }

    #[test]
    fn test_global_logger_is_default() {
        let logger = StreamLogger::default();
        assert_eq!(format!("{:?}", logger), "StreamLogger(global)");
        // No logger installed: must not panic
        stream_log!(logger, Level::Debug, "nothing listens");
    }
}
