//! Scoped phase timer
//!
//! A [`PhaseTimer`] starts the clock on construction, stops it the first time
//! its duration is read, and always reports when it goes out of scope, also
//! when the scope is left through `?` or a panic.

use std::cell::Cell;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

#[derive(Debug)]
pub struct PhaseTimer {
    label: String,
    started_at: Instant,
    ended_at: Cell<Option<Instant>>,
}

impl PhaseTimer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        tracing::info!("Benching {}.", label);
        Self {
            label,
            started_at: Instant::now(),
            ended_at: Cell::new(None),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// End instant, fixed on the first call.
    pub fn ended_at(&self) -> Instant {
        match self.ended_at.get() {
            Some(end) => end,
            None => {
                let end = Instant::now();
                self.ended_at.set(Some(end));
                end
            }
        }
    }

    /// Elapsed time. The first read stops the clock; later reads return the
    /// same value.
    pub fn duration(&self) -> Duration {
        self.ended_at().saturating_duration_since(self.started_at)
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.get().is_some()
    }

    /// Forget the cached end and restart the clock.
    pub fn reset(&mut self) {
        self.ended_at.set(None);
        self.started_at = Instant::now();
    }

    pub fn snapshot(&self) -> PhaseTiming {
        PhaseTiming {
            label: self.label.clone(),
            duration: self.duration(),
        }
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        let duration = self.duration();
        tracing::info!("-> {} took {:.3} seconds.", self.label, duration.as_secs_f64());
    }
}

/// Finished interval, as recorded into a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTiming {
    pub label: String,
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
}

pub(crate) fn as_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}
