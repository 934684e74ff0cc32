//! Progress and log delivery to the host.
//!
//! Callbacks run on the pipeline thread. They must return quickly; an
//! observer that needs to hand work to another thread should forward
//! events like [`ChannelObserver`] does.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, error, info, warn};

use super::record::{ProcessingRecord, RunReport, RunStatistics};

/// Severity of a pipeline log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    /// A message was archived. Reported to `tracing` at INFO.
    Success,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Success => "SUCCESS",
        };
        f.write_str(name)
    }
}

/// Receives run progress. All arguments are immutable snapshots.
pub trait ProgressObserver: Send + Sync {
    /// Called once per finished message (success, failure or cancellation).
    fn on_progress(&self, stats: &RunStatistics, record: &ProcessingRecord);

    fn on_log(&self, _level: LogLevel, _message: &str) {}

    /// Called once when the run reaches a terminal state.
    fn on_finished(&self, _report: &RunReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_progress(&self, _stats: &RunStatistics, _record: &ProcessingRecord) {}
}

/// An event forwarded by [`ChannelObserver`].
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Progress {
        stats: RunStatistics,
        record: ProcessingRecord,
    },
    Log {
        level: LogLevel,
        message: String,
    },
    Finished(Box<RunReport>),
}

/// Forwards every callback over an unbounded channel.
///
/// Sending never blocks the pipeline. Events are dropped silently once the
/// receiver is gone.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: Sender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, stats: &RunStatistics, record: &ProcessingRecord) {
        let _ = self.tx.send(ProgressEvent::Progress {
            stats: stats.clone(),
            record: record.clone(),
        });
    }

    fn on_log(&self, level: LogLevel, message: &str) {
        let _ = self.tx.send(ProgressEvent::Log {
            level,
            message: message.to_string(),
        });
    }

    fn on_finished(&self, report: &RunReport) {
        let _ = self.tx.send(ProgressEvent::Finished(Box::new(report.clone())));
    }
}

/// Write a record to `tracing` and to the observer.
pub(crate) fn emit(observer: &dyn ProgressObserver, level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!("{message}"),
        LogLevel::Info | LogLevel::Success => info!("{message}"),
        LogLevel::Warning => warn!("{message}"),
        LogLevel::Error => error!("{message}"),
    }
    observer.on_log(level, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_forwards_logs() {
        let (observer, rx) = ChannelObserver::new();
        emit(&observer, LogLevel::Success, "archived");
        match rx.try_recv().unwrap() {
            ProgressEvent::Log { level, message } => {
                assert_eq!(level, LogLevel::Success);
                assert_eq!(message, "archived");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_log(LogLevel::Info, "nobody listens");
    }

    #[test]
    fn test_level_names() {
        assert_eq!(LogLevel::Warning.to_string(), "WARNING");
        assert!(LogLevel::Debug < LogLevel::Error);
    }
}
