//! The pulse-wave attack schedule.
//!
//! All attackers share one schedule derived purely from the vector list and
//! the number of targets, so the whole fleet produces a time-division
//! multiplexed waveform: at any steady-state instant exactly one
//! (vector, target) pair is under attack, and across one cycle every pair is
//! hit exactly once.

use crate::config::AttackVectorConfig;
use dpws_core::Time;

/// The derived timings for one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorTiming {
    /// Offset from the attacker's start time to this vector's first send
    /// window. Cumulative: vector `k` starts once vectors `0..k` have each
    /// visited every target once.
    pub start_offset: Time,
    /// Time spent on one target: the burst duration.
    pub on_time: Time,
    /// The idle stretch after the last target of a cycle, until this vector's
    /// turn comes around again. Off periods between targets never elapse in
    /// full; the retarget cuts them short.
    pub off_time: Time,
    /// Interval to the next retarget while mid-cycle: burst + switch.
    pub standard_retarget_interval: Time,
    /// Interval to the next retarget from the final target: burst + off.
    pub last_target_retarget_interval: Time,
}

/// The cyclic waveform shared by every attacker.
///
/// With `T` targets and per-vector burst `b` and switch gap `s`, the cycle
/// lasts `D = Σ T·(b + s)` and each vector's off time is
/// `D − T·b − (T−1)·s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackSchedule {
    num_targets: usize,
    cycle_duration: Time,
    timings: Vec<VectorTiming>,
}

impl AttackSchedule {
    /// Derives the schedule from the resolved vector list (burst and switch
    /// durations already filled in) and the target count.
    pub fn new(vectors: &[AttackVectorConfig], num_targets: usize) -> Self {
        let targets = num_targets as u64;
        let durations: Vec<(Time, Time)> = vectors
            .iter()
            .map(|vector| {
                (
                    Time::from_secs_f64(vector.burst_duration_s),
                    Time::from_secs_f64(vector.target_switch_duration_s),
                )
            })
            .collect();

        let mut cycle_duration = Time::ZERO;
        for &(burst, switch) in &durations {
            cycle_duration += Time::from_nanos(targets * (burst + switch).as_nanos());
        }

        let mut timings = Vec::with_capacity(durations.len());
        let mut start_offset = Time::ZERO;
        for &(burst, switch) in &durations {
            let on_total = Time::from_nanos(targets * burst.as_nanos());
            let switch_total =
                Time::from_nanos(targets.saturating_sub(1) * switch.as_nanos());
            let off_time = cycle_duration
                .saturating_sub(on_total)
                .saturating_sub(switch_total);
            timings.push(VectorTiming {
                start_offset,
                on_time: burst,
                off_time,
                standard_retarget_interval: burst + switch,
                last_target_retarget_interval: burst + off_time,
            });
            start_offset += Time::from_nanos(targets * (burst + switch).as_nanos());
        }

        Self {
            num_targets,
            cycle_duration,
            timings,
        }
    }

    pub fn num_targets(&self) -> usize {
        self.num_targets
    }

    pub fn cycle_duration(&self) -> Time {
        self.cycle_duration
    }

    pub fn vector_count(&self) -> usize {
        self.timings.len()
    }

    pub fn timing(&self, vector_index: usize) -> &VectorTiming {
        &self.timings[vector_index]
    }

    /// The interval to the next retarget given the target currently under
    /// attack. Standard mid-cycle, longer from the final target so the source
    /// idles until its next turn.
    pub fn retarget_interval(&self, vector_index: usize, target_index: usize) -> Time {
        let timing = &self.timings[vector_index];
        if target_index + 1 == self.num_targets {
            timing.last_target_retarget_interval
        } else {
            timing.standard_retarget_interval
        }
    }

    /// Targets advance by a monotonically increasing index, wrapping at the
    /// end of the list.
    pub fn next_target_index(&self, target_index: usize) -> usize {
        if target_index + 1 == self.num_targets {
            0
        } else {
            target_index + 1
        }
    }
}
