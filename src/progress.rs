//! Setup progress reporting and terminal rendering.
//!
//! An import run reports through four fixed steps. Every change is pushed to
//! a [`ProgressSink`] as a full snapshot, so observers never have to merge
//! partial updates. The terminal helpers at the bottom keep log lines from
//! tearing live progress bars.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

/// The fixed steps of an import run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    Db,
    Download,
    Process,
    Finalize,
}

impl StepId {
    pub const ALL: [StepId; 4] = [
        StepId::Db,
        StepId::Download,
        StepId::Process,
        StepId::Finalize,
    ];

    pub fn default_label(self) -> &'static str {
        match self {
            StepId::Db => "Preparing local database",
            StepId::Download => "Downloading book list",
            StepId::Process => "Installing scripture",
            StepId::Finalize => "Finishing up",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepId::Db => write!(f, "db"),
            StepId::Download => write!(f, "download"),
            StepId::Process => write!(f, "process"),
            StepId::Finalize => write!(f, "finalize"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Loading,
    Completed,
    Error,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Loading => write!(f, "loading"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Error => write!(f, "error"),
        }
    }
}

/// One step as seen by observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupStep {
    pub id: StepId,
    pub label: String,
    pub status: StepStatus,
}

/// Receives a snapshot of all steps after every change
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, steps: &[SetupStep]);
}

impl<F> ProgressSink for F
where
    F: Fn(&[SetupStep]) + Send + Sync,
{
    fn on_progress(&self, steps: &[SetupStep]) {
        self(steps)
    }
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _steps: &[SetupStep]) {}
}

/// Step state for one import run.
///
/// Created fresh per run; nothing is persisted. Status transitions always
/// emit a snapshot. Label updates emit only when the text changes, so the
/// per-chapter `process` updates reach the sink once per percentage step,
/// not once per chapter: a single long book can go by without a snapshot.
pub struct SetupProgress<'a> {
    steps: Vec<SetupStep>,
    sink: &'a dyn ProgressSink,
}

impl<'a> SetupProgress<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        let steps = StepId::ALL
            .iter()
            .map(|id| SetupStep {
                id: *id,
                label: id.default_label().to_string(),
                status: StepStatus::Pending,
            })
            .collect();
        let progress = Self { steps, sink };
        progress.emit();
        progress
    }

    pub fn steps(&self) -> &[SetupStep] {
        &self.steps
    }

    pub fn status(&self, id: StepId) -> StepStatus {
        self.step(id).status
    }

    /// The step currently in `loading`, if any
    pub fn current(&self) -> Option<StepId> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Loading)
            .map(|s| s.id)
    }

    pub fn start(&mut self, id: StepId) {
        self.transition(id, StepStatus::Loading);
    }

    pub fn complete(&mut self, id: StepId) {
        self.transition(id, StepStatus::Completed);
    }

    pub fn fail(&mut self, id: StepId) {
        self.transition(id, StepStatus::Error);
    }

    pub fn reset(&mut self, id: StepId) {
        self.transition(id, StepStatus::Pending);
    }

    /// Relabel a step; a no-op (and no snapshot) when the label is unchanged
    pub fn set_label(&mut self, id: StepId, label: impl Into<String>) {
        let label = label.into();
        let step = self.step_mut(id);
        if step.label != label {
            step.label = label;
            self.emit();
        }
    }

    fn transition(&mut self, id: StepId, status: StepStatus) {
        self.step_mut(id).status = status;
        self.emit();
    }

    fn step(&self, id: StepId) -> &SetupStep {
        // Steps are built from StepId::ALL so the index always exists
        &self.steps[Self::index(id)]
    }

    fn step_mut(&mut self, id: StepId) -> &mut SetupStep {
        &mut self.steps[Self::index(id)]
    }

    fn index(id: StepId) -> usize {
        match id {
            StepId::Db => 0,
            StepId::Download => 1,
            StepId::Process => 2,
            StepId::Finalize => 3,
        }
    }

    fn emit(&self) {
        self.sink.on_progress(&self.steps);
    }
}

/// True when every step of a snapshot finished
pub fn all_completed(steps: &[SetupStep]) -> bool {
    steps.iter().all(|s| s.status == StepStatus::Completed)
}

/// Percentage label for the `process` step
pub fn process_label(books_completed: usize, total_books: usize) -> String {
    let percent = if total_books == 0 {
        100
    } else {
        books_completed * 100 / total_books
    };
    format!("{} ({}%)", StepId::Process.default_label(), percent)
}

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

pub fn add_spinner() -> ProgressBar {
    multi_progress().add(ProgressBar::new_spinner())
}

/// Sink that renders the loading step as a terminal spinner
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new(translation: &str) -> Self {
        let bar = add_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.set_prefix(translation.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl ProgressSink for TerminalProgress {
    fn on_progress(&self, steps: &[SetupStep]) {
        if let Some(step) = steps.iter().find(|s| s.status == StepStatus::Loading) {
            self.bar.set_message(step.label.clone());
        } else if let Some(step) = steps.iter().find(|s| s.status == StepStatus::Error) {
            self.bar.set_message(format!("{} failed", step.label));
        }
    }
}

#[derive(Default, Clone)]
pub struct LogWriterFactory;

pub struct LogWriter {
    buffer: String,
}

impl LogWriter {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = self.buffer.trim_end_matches('\n').trim_end_matches('\r');
        let _ = multi_progress().println(line.to_string());
        self.buffer.clear();
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.buffer.find('\n') {
            let line = self.buffer[..idx].trim_end_matches('\r').to_string();
            let _ = multi_progress().println(line);
            self.buffer.drain(..idx + 1);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer();
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter::new()
    }
}
