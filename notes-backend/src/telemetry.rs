//! Operational event sink — structured observability for remote calls.
//!
//! The repository client, the attachment store, and the board all report
//! failures here instead of writing ad-hoc log lines. Production uses
//! `LogSink`; tests inject a recording sink to assert on emitted events.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    Ok,
    Failed,
}

impl OpOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpOutcome::Ok => "ok",
            OpOutcome::Failed => "failed",
        }
    }
}

pub trait OpsSink: Send + Sync {
    fn event(&self, op: &str, outcome: OpOutcome, detail: &str);
}

/// Sink backed by the `log` crate. Failures log at warn so they show up
/// under the default filter; successes stay at debug.
pub struct LogSink;

impl OpsSink for LogSink {
    fn event(&self, op: &str, outcome: OpOutcome, detail: &str) {
        let line = format!("op={} outcome={} {}", op, outcome.as_str(), detail);
        match outcome {
            OpOutcome::Ok => log::debug!("{}", line.trim_end()),
            OpOutcome::Failed => log::warn!("{}", line.trim_end()),
        }
    }
}

#[cfg(test)]
pub struct RecordingSink {
    pub events: std::sync::Mutex<Vec<(String, OpOutcome, String)>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failures_for(&self, op: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, outcome, _)| o == op && *outcome == OpOutcome::Failed)
            .count()
    }
}

#[cfg(test)]
impl OpsSink for RecordingSink {
    fn event(&self, op: &str, outcome: OpOutcome, detail: &str) {
        self.events
            .lock()
            .unwrap()
            .push((op.to_string(), outcome, detail.to_string()));
    }
}
