//! Pipeline controller: runs Filter → Convert → Merge → Categorize → Relocate
//! for every selected message on one background thread.
//!
//! Store calls are isolated one by one, so a store that panics costs one
//! mailbox update and never the archive already written.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use chrono::Utc;

use super::cancel::CancellationSignal;
use super::observer::{emit, LogLevel, ProgressObserver};
use super::record::{
    AttachmentRecord, MailboxIssue, ProcessingRecord, RecordStatus, RunReport, RunState,
    RunStatistics,
};
use crate::convert::{Dispatcher, DocumentRenderer, RenderOptions};
use crate::error::{ArchiveError, Result};
use crate::export::archive::{MergeEngine, MergeResult, DEFAULT_DATE_FORMAT};
use crate::filter::{select, FilterCriteria};
use crate::model::message::Message;
use crate::store::{MailStore, StoreError};

/// What to process and where the results go.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Source folder in the mail store.
    pub folder: String,
    pub criteria: FilterCriteria,
    /// Folder archived messages are moved to. `None` leaves them in place.
    pub dest_folder: Option<String>,
    /// Directory receiving the PDFs.
    pub output_dir: PathBuf,
    /// Category applied to archived messages.
    pub success_category: Option<String>,
    /// Category applied to messages that could not be archived.
    pub error_category: Option<String>,
    /// Mark archived messages as read before moving them.
    pub mark_read: bool,
}

/// How the run renders and writes its output.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub render: RenderOptions,
    /// strftime pattern for dates on body pages.
    pub date_format: String,
    /// Create `output_dir` if it does not exist.
    pub create_output_dir: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            create_output_dir: true,
        }
    }
}

/// The external collaborators of a run.
///
/// Built on the pipeline thread by the `connect` factory passed to
/// [`start`], and dropped there.
pub struct Collaborators {
    pub store: Box<dyn MailStore>,
    pub renderer: Box<dyn DocumentRenderer>,
}

impl Collaborators {
    pub fn new(
        store: impl MailStore + 'static,
        renderer: impl DocumentRenderer + 'static,
    ) -> Self {
        Self {
            store: Box::new(store),
            renderer: Box::new(renderer),
        }
    }
}

/// Handle on a run in progress.
pub struct RunHandle {
    cancel: CancellationSignal,
    state: Arc<AtomicU8>,
    thread: Option<JoinHandle<RunReport>>,
    folder: String,
    output_dir: PathBuf,
}

impl RunHandle {
    /// Ask the run to stop. The message in flight finishes its current step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the run's cancellation signal, e.g. for a Ctrl-C handler.
    pub fn cancellation(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Block until the run ends and return its report.
    pub fn wait(mut self) -> RunReport {
        let joined = match self.thread.take() {
            Some(thread) => thread.join(),
            None => Err(Box::new("run already joined") as Box<dyn Any + Send>),
        };
        joined.unwrap_or_else(|panic| {
            self.state.store(RunState::Failed.as_u8(), Ordering::SeqCst);
            RunReport {
                state: RunState::Failed,
                error: Some(format!("pipeline thread panicked: {}", panic_message(&panic))),
                folder: self.folder.clone(),
                output_dir: self.output_dir.clone(),
                statistics: RunStatistics::new(Utc::now()),
                records: Vec::new(),
            }
        })
    }
}

/// Start a run on a new background thread.
///
/// `connect` runs on that thread and builds the mail store and renderer, so
/// neither needs to be `Send`. A `connect` error ends the run as
/// [`RunState::Failed`].
pub fn start<F>(
    request: RunRequest,
    options: PipelineOptions,
    connect: F,
    observer: Arc<dyn ProgressObserver>,
) -> Result<RunHandle>
where
    F: FnOnce() -> std::result::Result<Collaborators, StoreError> + Send + 'static,
{
    let cancel = CancellationSignal::new();
    let state = Arc::new(AtomicU8::new(RunState::Running.as_u8()));
    let folder = request.folder.clone();
    let output_dir = request.output_dir.clone();

    let thread = {
        let cancel = cancel.clone();
        let state = Arc::clone(&state);
        std::thread::Builder::new()
            .name("mailpress-pipeline".to_string())
            .spawn(move || {
                let report = execute(&request, &options, connect, observer.as_ref(), &cancel);
                state.store(report.state.as_u8(), Ordering::SeqCst);
                observer.on_finished(&report);
                report
            })
            .map_err(|e| {
                ArchiveError::FatalPrecondition(format!("cannot start pipeline thread: {e}"))
            })?
    };

    Ok(RunHandle {
        cancel,
        state,
        thread: Some(thread),
        folder,
        output_dir,
    })
}

/// Host-facing controller that allows one run at a time.
pub struct Controller {
    options: PipelineOptions,
    observer: Arc<dyn ProgressObserver>,
    current: Option<RunHandle>,
}

impl Controller {
    pub fn new(options: PipelineOptions, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            options,
            observer,
            current: None,
        }
    }

    /// Start a run, refusing while another one is still running.
    pub fn start<F>(&mut self, request: RunRequest, connect: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<Collaborators, StoreError> + Send + 'static,
    {
        if self.is_running() {
            return Err(ArchiveError::AlreadyRunning);
        }
        let handle = start(
            request,
            self.options.clone(),
            connect,
            Arc::clone(&self.observer),
        )?;
        self.current = Some(handle);
        Ok(())
    }

    pub fn cancel(&self) {
        if let Some(handle) = &self.current {
            handle.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(RunHandle::is_running)
    }

    pub fn state(&self) -> RunState {
        self.current
            .as_ref()
            .map_or(RunState::Idle, RunHandle::state)
    }

    /// Wait for the current run, if any, and return its report.
    pub fn wait(&mut self) -> Option<RunReport> {
        self.current.take().map(RunHandle::wait)
    }
}

/// Mutable state of one run, owned by the pipeline thread.
struct Run<'a> {
    request: &'a RunRequest,
    observer: &'a dyn ProgressObserver,
    cancel: &'a CancellationSignal,
    started: Instant,
    stats: RunStatistics,
    records: Vec<ProcessingRecord>,
}

impl<'a> Run<'a> {
    fn log(&self, level: LogLevel, message: &str) {
        emit(self.observer, level, message);
    }

    fn finish(mut self, state: RunState, error: Option<String>) -> RunReport {
        self.stats.elapsed = self.started.elapsed();
        let summary = format!(
            "Run {state}: {} processed, {} archived, {} failed, {} cancelled in {:.1}s",
            self.stats.processed,
            self.stats.succeeded,
            self.stats.failed,
            self.stats.cancelled,
            self.stats.elapsed.as_secs_f64()
        );
        let level = match state {
            RunState::Failed => LogLevel::Error,
            RunState::Cancelled => LogLevel::Warning,
            _ => LogLevel::Info,
        };
        self.log(level, &summary);

        RunReport {
            state,
            error,
            folder: self.request.folder.clone(),
            output_dir: self.request.output_dir.clone(),
            statistics: self.stats,
            records: self.records,
        }
    }

    fn fatal(self, reason: String) -> RunReport {
        self.log(LogLevel::Error, &reason);
        self.finish(RunState::Failed, Some(reason))
    }
}

fn execute<F>(
    request: &RunRequest,
    options: &PipelineOptions,
    connect: F,
    observer: &dyn ProgressObserver,
    cancel: &CancellationSignal,
) -> RunReport
where
    F: FnOnce() -> std::result::Result<Collaborators, StoreError>,
{
    let mut run = Run {
        request,
        observer,
        cancel,
        started: Instant::now(),
        stats: RunStatistics::new(Utc::now()),
        records: Vec::new(),
    };
    run.log(
        LogLevel::Info,
        &format!("Starting run on folder '{}'", request.folder),
    );

    let Collaborators {
        mut store,
        renderer,
    } = match connect() {
        Ok(collaborators) => collaborators,
        Err(e) => return run.fatal(format!("cannot open mail store: {e}")),
    };

    let messages = match store.list_messages(&request.folder) {
        Ok(messages) => messages,
        Err(e) => return run.fatal(format!("cannot list folder '{}': {e}", request.folder)),
    };

    if !request.output_dir.is_dir() {
        if !options.create_output_dir {
            return run.fatal(format!(
                "output directory '{}' does not exist",
                request.output_dir.display()
            ));
        }
        if let Err(e) = std::fs::create_dir_all(&request.output_dir) {
            return run.fatal(
                ArchiveError::io(&request.output_dir, e).to_string(),
            );
        }
    }

    if request.criteria.keywords.is_empty() {
        run.log(
            LogLevel::Warning,
            "No keywords given: empty keyword sets select nothing",
        );
    }

    let dest_folder = match request.dest_folder.as_deref() {
        Some(dest) if !store.has_folder(dest) => {
            run.log(
                LogLevel::Warning,
                &format!("Destination folder '{dest}' not found; messages will stay in place"),
            );
            None
        }
        other => other,
    };

    let selection = select(&messages, &request.criteria);
    run.stats.folder_size = messages.len();
    run.stats.total = selection.count_matching();
    run.log(
        LogLevel::Info,
        &format!(
            "{} of {} messages match",
            run.stats.total, run.stats.folder_size
        ),
    );

    let dispatcher = Dispatcher::new(renderer, options.render.clone());
    let mut engine = MergeEngine::new(
        request.output_dir.clone(),
        options.render.clone(),
        options.date_format.clone(),
    );
    let mut steps = Steps {
        dispatcher: &dispatcher,
        engine: &mut engine,
        store: store.as_mut(),
        dest_folder,
        request,
        observer,
        cancel,
    };

    let mut cancelled = false;
    for (position, message) in selection.enumerate() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let index = position + 1;
        run.stats.current_index = index;

        let started = Instant::now();
        let mut record = ProcessingRecord::pending(index, message);
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| steps.process(message, &mut record))) {
            steps.recover(message, &mut record, &panic_message(&panic));
        }
        record.elapsed = started.elapsed();

        run.stats.record(&record);
        run.stats.elapsed = run.started.elapsed();
        observer.on_progress(&run.stats, &record);
        let was_cancelled = record.status == RecordStatus::Cancelled;
        run.records.push(record);
        if was_cancelled {
            cancelled = true;
            break;
        }
    }

    if cancelled {
        run.finish(RunState::Cancelled, None)
    } else {
        run.finish(RunState::Completed, None)
    }
}

/// Per-message work. Borrowed collaborators stay on the pipeline thread.
struct Steps<'a> {
    dispatcher: &'a Dispatcher,
    engine: &'a mut MergeEngine,
    store: &'a mut dyn MailStore,
    dest_folder: Option<&'a str>,
    request: &'a RunRequest,
    observer: &'a dyn ProgressObserver,
    cancel: &'a CancellationSignal,
}

impl Steps<'_> {
    fn log(&self, level: LogLevel, message: &str) {
        emit(self.observer, level, message);
    }

    /// Run one message. `record` stays `Cancelled` until the merge settles
    /// the outcome.
    fn process(&mut self, message: &Message, record: &mut ProcessingRecord) {
        self.log(
            LogLevel::Debug,
            &format!(
                "Processing '{}' ({} attachment(s))",
                message.subject,
                message.attachments.len()
            ),
        );

        let mut outcomes = Vec::with_capacity(message.attachments.len());
        for (position, attachment) in message.attachments.iter().enumerate() {
            if self.cancel.is_cancelled() {
                record.attachments.extend(
                    message.attachments[position..]
                        .iter()
                        .map(AttachmentRecord::skipped),
                );
                self.log(
                    LogLevel::Warning,
                    &format!("'{}' cancelled before merge", message.subject),
                );
                return;
            }
            let outcome = self.dispatcher.convert(attachment);
            if let Some(reason) = outcome.failure() {
                self.log(
                    LogLevel::Warning,
                    &format!("'{}': {}: {reason}", message.subject, attachment.filename),
                );
            }
            record.attachments.push(AttachmentRecord::new(attachment, &outcome));
            outcomes.push(outcome);
        }

        // From here on the message commits to a real outcome.
        let request = self.request;
        match self.engine.merge(message, &outcomes) {
            MergeResult::Success {
                path,
                page_count,
                included,
                total,
            } => {
                let line = format!(
                    "Archived '{}' ({included}/{total} attachments, {page_count} pages) to {}",
                    message.subject,
                    path.display()
                );
                record.status = RecordStatus::Success;
                record.output = Some(path);
                record.page_count = page_count;
                record.included = included;
                self.log(LogLevel::Success, &line);

                if let Some(category) = request.success_category.as_deref() {
                    self.categorize(message, category, record);
                }
                if request.mark_read {
                    if let Err(reason) = self.mailbox(|store| store.mark_read(&message.id)) {
                        self.log(
                            LogLevel::Warning,
                            &format!("'{}' could not be marked as read: {reason}", message.subject),
                        );
                        record
                            .mailbox_issues
                            .push(MailboxIssue::MarkReadFailed { reason });
                    }
                }
                if let Some(dest) = self.dest_folder {
                    if let Err(reason) = self.mailbox(|store| store.move_message(&message.id, dest)) {
                        self.log(
                            LogLevel::Warning,
                            &format!("'{}' could not be moved to '{dest}': {reason}", message.subject),
                        );
                        record.mailbox_issues.push(MailboxIssue::RelocationFailed {
                            folder: dest.to_string(),
                            reason,
                        });
                    }
                }
            }
            MergeResult::Failure { reason, included } => {
                let line = format!("'{}' not archived: {reason}", message.subject);
                record.status = RecordStatus::Failure(reason);
                record.included = included;
                self.log(LogLevel::Error, &line);
                if let Some(category) = request.error_category.as_deref() {
                    self.categorize(message, category, record);
                }
            }
        }
    }

    /// Settle a record after `process` panicked.
    ///
    /// Before the merge settled the outcome the message fails, keeping the
    /// attachment outcomes gathered so far. Afterwards the outcome stands and
    /// the panic is reported as a mailbox issue.
    fn recover(&mut self, message: &Message, record: &mut ProcessingRecord, panic: &str) {
        let reason = format!("internal error: {panic}");
        if record.status != RecordStatus::Cancelled {
            self.log(
                LogLevel::Warning,
                &format!("'{}': mailbox updates interrupted: {reason}", message.subject),
            );
            record
                .mailbox_issues
                .push(MailboxIssue::Interrupted { reason });
            return;
        }

        self.log(LogLevel::Error, &format!("'{}': {reason}", message.subject));
        let done = record.attachments.len().min(message.attachments.len());
        record.attachments.extend(
            message.attachments[done..]
                .iter()
                .map(AttachmentRecord::skipped),
        );
        record.status = RecordStatus::Failure(reason);
        record.output = None;
        record.page_count = 0;
        if let Some(category) = self.request.error_category.as_deref() {
            self.categorize(message, category, record);
        }
    }

    fn categorize(&mut self, message: &Message, category: &str, record: &mut ProcessingRecord) {
        if let Err(reason) = self.mailbox(|store| store.apply_category(&message.id, category)) {
            self.log(
                LogLevel::Warning,
                &format!(
                    "'{}' could not be labelled '{category}': {reason}",
                    message.subject
                ),
            );
            record.mailbox_issues.push(MailboxIssue::CategorizationFailed {
                category: category.to_string(),
                reason,
            });
        }
    }

    /// One store update. Errors and panics both come back as the reason.
    fn mailbox<T>(
        &mut self,
        update: impl FnOnce(&mut dyn MailStore) -> std::result::Result<T, StoreError>,
    ) -> std::result::Result<T, String> {
        match catch_unwind(AssertUnwindSafe(|| update(&mut *self.store))) {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(panic) => Err(format!("store panicked: {}", panic_message(&panic))),
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
