use std::io::{self, Write};
use std::time::Instant;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Parsing,
    Translating,
    Rebuilding,
    Complete,
    Error,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Parsing => "parsing",
            Phase::Translating => "translating",
            Phase::Rebuilding => "rebuilding",
            Phase::Complete => "complete",
            Phase::Error => "error",
        }
    }
}

/// Snapshot of a running job; the only state visible while it runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: Phase,
    pub current_segment: usize,
    pub total_segments: usize,
    pub current_batch: usize,
    pub total_batches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            current_segment: 0,
            total_segments: 0,
            current_batch: 0,
            total_batches: 0,
            message: None,
        }
    }

    pub fn segments(mut self, current: usize, total: usize) -> Self {
        self.current_segment = current;
        self.total_segments = total;
        self
    }

    pub fn batches(mut self, current: usize, total: usize) -> Self {
        self.current_batch = current;
        self.total_batches = total;
        self
    }

    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: &ProgressEvent) {
        self(event)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: &ProgressEvent) {}
}

pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    fn line(&self, event: &ProgressEvent) -> String {
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut line = format!("[{ts}] {}", event.phase.as_str());
        if event.total_segments > 0 {
            let total = event.total_segments.max(1);
            let current = event.current_segment.min(total);
            let pct = (current as f64 / total as f64) * 100.0;
            line.push_str(&format!(" {current}/{total} ({pct:5.1}%)"));
        }
        if event.total_batches > 0 {
            line.push_str(&format!(" batch {}/{}", event.current_batch, event.total_batches));
        }
        if let Some(msg) = event.message.as_deref() {
            line.push_str(": ");
            line.push_str(msg);
        }
        line
    }
}

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: &ProgressEvent) {
        if !self.enabled {
            return;
        }
        let line = self.line(event);
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{line}");
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
