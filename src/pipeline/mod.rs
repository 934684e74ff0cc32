//! The batch archiving pipeline.
//!
//! A run is started with [`start`] (or through a [`Controller`]) and executes
//! entirely on one background thread: the mail store and document renderer
//! are built there and never shared. The host observes the run through a
//! [`ProgressObserver`] and may stop it with [`RunHandle::cancel`].

pub mod cancel;
pub mod controller;
pub mod observer;
pub mod record;

pub use cancel::CancellationSignal;
pub use controller::{start, Collaborators, Controller, PipelineOptions, RunHandle, RunRequest};
pub use observer::{ChannelObserver, LogLevel, NullObserver, ProgressEvent, ProgressObserver};
pub use record::{
    AttachmentOutcome, AttachmentRecord, MailboxIssue, ProcessingRecord, RecordStatus, RunReport,
    RunState, RunStatistics,
};
