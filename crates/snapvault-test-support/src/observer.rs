//! Observer that records event kinds for assertions.

use std::sync::Mutex;

use snapvault_core::{FailureKind, Phase, PipelineEvent, PipelineObserver};

/// Records the kind of every observed event, plus failure details.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    kinds: Mutex<Vec<&'static str>>,
    failures: Mutex<Vec<(Phase, FailureKind)>>,
}

impl RecordingObserver {
    /// Construct an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Event kinds in observation order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.kinds
            .lock()
            .map(|kinds| kinds.clone())
            .unwrap_or_default()
    }

    /// Failed phases with their classification.
    #[must_use]
    pub fn failures(&self) -> Vec<(Phase, FailureKind)> {
        self.failures
            .lock()
            .map(|failures| failures.clone())
            .unwrap_or_default()
    }
}

impl PipelineObserver for RecordingObserver {
    fn observe(&self, event: &PipelineEvent<'_>) {
        if let Ok(mut kinds) = self.kinds.lock() {
            kinds.push(event.kind());
        }
        if let PipelineEvent::PhaseFailed { phase, error } = event
            && let Ok(mut failures) = self.failures.lock()
        {
            failures.push((*phase, error.kind()));
        }
    }
}
