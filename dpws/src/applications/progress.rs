//! Periodic progress reports during a run.

use dpws_core::internet::{AppId, Internet, NetworkError, Tag};
use dpws_core::{Application, Time};
use std::any::Any;
use std::time::Instant;

/// Logs elapsed virtual and real time on a fixed virtual-time interval,
/// rescheduling itself until the stop event ends the run. Only worker 0
/// installs one.
pub struct ProgressReporter {
    interval: Time,
    total: Time,
    started: Instant,
}

impl ProgressReporter {
    pub const TAG_TICK: Tag = 1;

    pub fn new(interval: Time, total: Time) -> Self {
        Self {
            interval,
            total,
            started: Instant::now(),
        }
    }
}

impl Application for ProgressReporter {
    fn timer(&mut self, internet: &mut Internet, id: AppId, tag: Tag) -> Result<(), NetworkError> {
        if tag == Self::TAG_TICK {
            println!(
                "simulation progress: elapsed simulation time (s): ({} of {}), elapsed real-time (s): {:.3}",
                internet.now().as_secs_f64(),
                self.total.as_secs_f64(),
                self.started.elapsed().as_secs_f64()
            );
            internet.schedule(self.interval, id, Self::TAG_TICK);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
