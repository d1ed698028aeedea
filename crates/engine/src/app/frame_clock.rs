use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClockConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
}

impl Default for FrameClockConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 240,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub ticks_to_run: u32,
    pub remaining_accumulator: Duration,
    pub dropped_backlog: Duration,
}

/// Turns variable frame deltas into a whole number of fixed update ticks.
#[derive(Debug, Clone)]
pub struct FrameClock {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    total_ticks: u64,
}

impl FrameClock {
    /// Zero settings fall back: `target_tps` and `max_ticks_per_frame` to 1,
    /// `max_frame_delta` to its default.
    pub fn new(config: FrameClockConfig) -> Self {
        let target_tps = config.target_tps.max(1);
        let max_frame_delta = if config.max_frame_delta.is_zero() {
            FrameClockConfig::default().max_frame_delta
        } else {
            config.max_frame_delta
        };
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / f64::from(target_tps)),
            max_frame_delta,
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            total_ticks: 0,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Feeds one frame's elapsed time and returns how many ticks to run now.
    /// Frame time past `max_frame_delta` is ignored; whole ticks past
    /// `max_ticks_per_frame` are dropped rather than carried.
    pub fn advance(&mut self, frame_dt: Duration) -> StepPlan {
        let pending = self
            .accumulator
            .saturating_add(frame_dt.min(self.max_frame_delta));
        let due = pending.as_nanos() / self.fixed_dt.as_nanos();
        let ticks_to_run = due.min(u128::from(self.max_ticks_per_frame)) as u32;
        let leftover = pending.saturating_sub(self.fixed_dt * ticks_to_run);

        let plan = if due > u128::from(ticks_to_run) {
            StepPlan {
                ticks_to_run,
                remaining_accumulator: Duration::ZERO,
                dropped_backlog: leftover,
            }
        } else {
            StepPlan {
                ticks_to_run,
                remaining_accumulator: leftover,
                dropped_backlog: Duration::ZERO,
            }
        };

        self.accumulator = plan.remaining_accumulator;
        self.total_ticks = self.total_ticks.saturating_add(u64::from(ticks_to_run));
        if !plan.dropped_backlog.is_zero() {
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(target_tps: u32, max_ticks_per_frame: u32) -> FrameClock {
        FrameClock::new(FrameClockConfig {
            target_tps,
            max_frame_delta: Duration::from_secs(1),
            max_ticks_per_frame,
        })
    }

    #[test]
    fn whole_ticks_run_and_remainder_carries() {
        let mut clock = clock(50, 10);
        let plan = clock.advance(Duration::from_millis(70));
        assert_eq!(
            plan,
            StepPlan {
                ticks_to_run: 3,
                remaining_accumulator: Duration::from_millis(10),
                dropped_backlog: Duration::ZERO,
            }
        );
        assert_eq!(clock.advance(Duration::from_millis(10)).ticks_to_run, 1);
    }

    #[test]
    fn ticks_past_the_cap_are_dropped() {
        let mut clock = clock(50, 4);
        let plan = clock.advance(Duration::from_millis(250));
        assert_eq!(plan.ticks_to_run, 4);
        assert_eq!(plan.remaining_accumulator, Duration::ZERO);
        assert_eq!(plan.dropped_backlog, Duration::from_millis(170));
        assert_eq!(clock.advance(Duration::ZERO).ticks_to_run, 0);
        assert_eq!(clock.total_ticks(), 4);
    }

    #[test]
    fn advance_carries_partial_ticks_between_frames() {
        let mut clock = FrameClock::new(FrameClockConfig {
            target_tps: 100,
            ..FrameClockConfig::default()
        });
        assert_eq!(clock.advance(Duration::from_millis(15)).ticks_to_run, 1);
        assert_eq!(clock.advance(Duration::from_millis(5)).ticks_to_run, 1);
        assert_eq!(clock.advance(Duration::from_millis(4)).ticks_to_run, 0);
        assert_eq!(clock.total_ticks(), 2);
    }

    #[test]
    fn advance_clamps_long_frames() {
        let mut clock = FrameClock::new(FrameClockConfig {
            target_tps: 100,
            max_frame_delta: Duration::from_millis(50),
            max_ticks_per_frame: 240,
        });
        let plan = clock.advance(Duration::from_secs(10));
        assert_eq!(plan.ticks_to_run, 5);
        assert_eq!(plan.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn zero_config_values_fall_back_to_sane_minimums() {
        let mut clock = FrameClock::new(FrameClockConfig {
            target_tps: 0,
            max_frame_delta: Duration::ZERO,
            max_ticks_per_frame: 0,
        });
        assert_eq!(clock.fixed_dt(), Duration::from_secs(1));
        let plan = clock.advance(Duration::from_millis(100));
        assert_eq!(plan.ticks_to_run, 0);
    }
}
