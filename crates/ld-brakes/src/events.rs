//! Brake-handle states, sound events and the pressure-trend latch.

use serde::{Deserialize, Serialize};

/// Pressure change below which the trend counts as stable, psi.
pub const TREND_THRESHOLD_PSI: f64 = 0.005;
/// Trend sampling period in ticks; sampling every tick would chatter on the
/// jumping pipe pressure.
pub const SOUND_TRIGGER_PERIOD: u32 = 4;

/// Discrete train-brake-controller position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrakeControllerState {
    Apply,
    ApplyAll,
    #[default]
    Lap,
    Release,
    ReleaseOn,
    Emergency,
}

/// Sound event handed to the audio layer. Each is fired exactly once per
/// transition of the state it reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrakeEvent {
    TrainBrakePressureIncrease,
    TrainBrakePressureDecrease,
    TrainBrakePressureStoppedChanging,
    BrakePipePressureIncrease,
    BrakePipePressureDecrease,
    BrakePipePressureStoppedChanging,
    LargeEjectorOn,
    LargeEjectorOff,
    SmallEjectorOn,
    SmallEjectorOff,
}

/// Transition reported by [`PressureTrend::observe`], in terms of the raw
/// pressure (the vacuum convention inverts the sense for the listener).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrendEvent {
    StartedRising,
    StartedFalling,
    StoppedChanging,
}

/// Three-state pressure-trend latch: Stable → Rising/Falling → Stable.
///
/// Each state change returns exactly one event; holding a trend returns
/// nothing. A direct flip between rising and falling also yields exactly one
/// event for the new direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PressureTrend {
    #[default]
    Stable,
    Rising,
    Falling,
}

impl PressureTrend {
    /// Feed one sampled pressure delta (current − previous, psi).
    pub fn observe(&mut self, delta_psi: f64) -> Option<TrendEvent> {
        let next = if delta_psi > TREND_THRESHOLD_PSI {
            Self::Rising
        } else if delta_psi < -TREND_THRESHOLD_PSI {
            Self::Falling
        } else {
            Self::Stable
        };
        if next == *self {
            return None;
        }
        *self = next;
        Some(match next {
            Self::Rising => TrendEvent::StartedRising,
            Self::Falling => TrendEvent::StartedFalling,
            Self::Stable => TrendEvent::StoppedChanging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_fires_exactly_one_event_each_way() {
        let mut trend = PressureTrend::default();
        // crossing the threshold fires once
        assert_eq!(trend.observe(0.01), Some(TrendEvent::StartedRising));
        // holding the trend stays silent
        assert_eq!(trend.observe(0.01), None);
        assert_eq!(trend.observe(0.02), None);
        // settling fires the stop exactly once
        assert_eq!(trend.observe(0.001), Some(TrendEvent::StoppedChanging));
        assert_eq!(trend.observe(0.0), None);
    }

    #[test]
    fn sub_threshold_delta_never_fires_from_stable() {
        let mut trend = PressureTrend::default();
        assert_eq!(trend.observe(0.004), None);
        assert_eq!(trend.observe(-0.004), None);
    }

    #[test]
    fn direction_flip_fires_single_event() {
        let mut trend = PressureTrend::default();
        assert_eq!(trend.observe(-0.01), Some(TrendEvent::StartedFalling));
        assert_eq!(trend.observe(0.01), Some(TrendEvent::StartedRising));
        assert_eq!(trend.observe(0.01), None);
    }
}
