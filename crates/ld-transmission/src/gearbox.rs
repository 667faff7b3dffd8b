//! Gear-selection state machine with clutch dynamics.

use crate::gear::{Gear, GearBoxOperation, GearBoxParams};
use serde::{Deserialize, Serialize};

/// Clutch fraction below which the box counts as disengaged.
pub const CLUTCH_DISENGAGED_MAX: f64 = 0.05;
/// Clutch fraction above which a down-shift may commit with partial
/// engagement. Up-shifts require full engagement instead; the asymmetry is
/// tuned-by-feel and must not be unified.
pub const CLUTCH_DOWNSHIFT_MIN: f64 = 0.5;
/// Fully engaged clutch fraction, the up-shift commit gate.
pub const CLUTCH_FULL_ENGAGED: f64 = 1.0;
/// Clutch percentage below which the box returns coasting drag instead of
/// tractive force.
pub const COASTING_CLUTCH_FLOOR_PCT: f64 = -20.0;

/// Shift-threshold blend against throttle in advanced mode:
/// `threshold = gear_speed · (SHIFT_BLEND_BASE + SHIFT_BLEND_THROTTLE · throttle)`.
pub const SHIFT_BLEND_BASE: f64 = 0.75;
pub const SHIFT_BLEND_THROTTLE: f64 = 0.25;

/// Side effect of a committed gear change, handed to the audio layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GearEvent {
    Up,
    Down,
}

/// Per-tick inputs the box consults. An explicit context object: the box
/// never reaches into sibling locomotive state.
#[derive(Clone, Copy, Debug, Default)]
pub struct GearBoxContext {
    /// Operator throttle, percent [0, 100].
    pub throttle_percent: f64,
    /// Throttle demanded of the prime mover, percent [0, 100].
    pub demanded_throttle_percent: f64,
    /// Road speed toward the direction of travel, m/s.
    pub speed_mps: f64,
    /// Engine RPM this tick.
    pub engine_rpm: f64,
    pub engine_max_rpm: f64,
    pub engine_starting_rpm: f64,
    pub engine_running: bool,
    /// Usable engine output power, W.
    pub engine_power_w: f64,
    /// Engine torque-table value at the current RPM.
    pub torque_at_rpm: f64,
    /// Largest value of the engine torque table.
    pub torque_max: f64,
}

/// Persisted gearbox state. Field order mirrors the save order; neutral is
/// stored as −1 as in the original field list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GearBoxSnapshot {
    pub current_gear_index: i32,
    pub next_gear_index: i32,
    pub geared_up: bool,
    pub geared_down: bool,
    pub clutch_on: bool,
    pub clutch: f64,
}

/// Gear-selection state machine.
///
/// `current` and `next` are always valid gear indices or `None` (neutral).
/// A pending selection in `next` is committed by [`GearBox::update`] only
/// when the clutch crosses the engagement thresholds; the commit is visible
/// to tractive-force computation in the same tick.
#[derive(Clone, Debug)]
pub struct GearBox {
    gears: Vec<Gear>,
    operation: GearBoxOperation,
    current: Option<usize>,
    next: Option<usize>,
    geared_up: bool,
    geared_down: bool,
    clutch_on: bool,
    /// Clutch fraction; [0, 1] engaged range, sign-extended to −1 while
    /// coasting past full disengagement.
    clutch: f64,
    /// Any gear with distinct min/max speed switches the box to the
    /// advanced shift logic.
    advanced: bool,
    time_for_speed_change_s: f64,
    elapsed_speed_change_s: f64,
    speed_changing: bool,
}

fn rank(slot: Option<usize>) -> i64 {
    match slot {
        None => -1,
        Some(i) => i as i64,
    }
}

impl GearBox {
    pub fn new(params: &GearBoxParams, engine_max_rpm: f64) -> Self {
        let gears = params.build_gears(engine_max_rpm);
        let advanced = gears.iter().any(|g| g.min_speed_mps != g.max_speed_mps);
        Self {
            gears,
            operation: params.operation,
            current: None,
            next: None,
            geared_up: false,
            geared_down: false,
            clutch_on: false,
            clutch: 0.0,
            advanced,
            time_for_speed_change_s: params.time_for_speed_change_s,
            elapsed_speed_change_s: 0.0,
            speed_changing: false,
        }
    }

    pub fn num_gears(&self) -> usize {
        self.gears.len()
    }

    pub fn current_gear_index(&self) -> Option<usize> {
        self.current
    }

    pub fn next_gear_index(&self) -> Option<usize> {
        self.next
    }

    pub fn current_gear(&self) -> Option<&Gear> {
        self.current.and_then(|i| self.gears.get(i))
    }

    pub fn next_gear(&self) -> Option<&Gear> {
        self.next.and_then(|i| self.gears.get(i))
    }

    /// Select a pending gear directly (manual/semiautomatic lever).
    /// Ignored in automatic operation.
    pub fn select_gear(&mut self, index: Option<usize>) {
        if self.operation == GearBoxOperation::Automatic {
            return;
        }
        self.next = index.filter(|&i| i < self.gears.len());
    }

    pub fn is_advanced(&self) -> bool {
        self.advanced
    }

    pub fn is_speed_changing(&self) -> bool {
        self.speed_changing
    }

    pub fn geared_up(&self) -> bool {
        self.geared_up
    }

    pub fn geared_down(&self) -> bool {
        self.geared_down
    }

    pub fn clutch_percent(&self) -> f64 {
        self.clutch * 100.0
    }

    pub fn set_clutch_percent(&mut self, percent: f64) {
        self.clutch = percent.clamp(-100.0, 100.0) / 100.0;
    }

    /// Advance the pending selection one gear up.
    ///
    /// Gated on a disengaged clutch (advanced boxes shift under load).
    /// Edge-triggered: a second call while already geared-up resets the flag
    /// instead of advancing again. Leaving a real gear arms the speed-change
    /// timer.
    pub fn auto_gear_up(&mut self) -> bool {
        if self.clutch < CLUTCH_DISENGAGED_MAX || self.advanced {
            if !self.geared_up {
                let count = self.gears.len();
                let candidate = match self.next {
                    None => 0,
                    Some(i) => i + 1,
                };
                if candidate >= count {
                    self.next = count.checked_sub(1);
                } else {
                    self.next = Some(candidate);
                    self.geared_up = true;
                    if self.current.is_some() {
                        self.speed_changing = true;
                    }
                }
            } else {
                self.geared_up = false;
            }
        }
        self.geared_up
    }

    /// Advance the pending selection one gear down.
    ///
    /// Gated on a disengaged clutch, or on the current gear being a
    /// speed-trigger gear (distinct min/max speeds). Floors at gear 0; the
    /// geared-down flag only arms when the target is above gear 0.
    pub fn auto_gear_down(&mut self) -> bool {
        let speed_trigger = self
            .current_gear()
            .is_some_and(|g| g.max_speed_mps != g.min_speed_mps);
        if self.clutch < CLUTCH_DISENGAGED_MAX || speed_trigger {
            if !self.geared_down {
                let candidate = rank(self.next) - 1;
                if candidate <= 0 {
                    self.next = if self.gears.is_empty() { None } else { Some(0) };
                } else {
                    self.next = Some(candidate as usize);
                    self.geared_down = true;
                    if self.current.is_some() {
                        self.speed_changing = true;
                    }
                }
            } else {
                self.geared_down = false;
            }
        }
        self.geared_down
    }

    /// Settle at the current gear: clear both shift flags.
    pub fn auto_at_gear(&mut self) {
        self.geared_up = false;
        self.geared_down = false;
    }

    fn reset_to_neutral(&mut self) {
        self.next = None;
        self.current = None;
        self.clutch_on = false;
        self.geared_down = false;
        self.geared_up = false;
    }

    /// Per-tick update: advances the speed-change timer, commits the pending
    /// gear when the clutch allows, and runs the automatic shift scheduler.
    ///
    /// Up-shifts commit at clutch ≤ 0.05 or ≥ 1.0, down-shifts already at
    /// ≥ 0.5 (or either at ≤ 0.05); advanced boxes bypass the clutch gates.
    /// Each commit emits one [`GearEvent`].
    pub fn update(&mut self, dt_s: f64, ctx: &GearBoxContext) -> Option<GearEvent> {
        if self.speed_changing && self.time_for_speed_change_s > self.elapsed_speed_change_s {
            self.elapsed_speed_change_s += dt_s;
            if self.elapsed_speed_change_s > self.time_for_speed_change_s {
                self.speed_changing = false;
                self.elapsed_speed_change_s = 0.0;
            }
        }

        let mut event = None;
        if (self.clutch <= CLUTCH_DISENGAGED_MAX
            || self.clutch >= CLUTCH_FULL_ENGAGED
            || self.advanced)
            && rank(self.current) < rank(self.next)
        {
            self.current = self.next;
            event = Some(GearEvent::Up);
        }
        if (self.clutch <= CLUTCH_DISENGAGED_MAX
            || self.clutch >= CLUTCH_DOWNSHIFT_MIN
            || self.advanced)
            && rank(self.current) > rank(self.next)
        {
            self.current = self.next;
            event = Some(GearEvent::Down);
        }

        if !ctx.engine_running {
            self.reset_to_neutral();
            return event;
        }

        match self.operation {
            GearBoxOperation::Manual => {
                if ctx.throttle_percent == 0.0 {
                    self.clutch_on = false;
                    self.clutch = 0.0;
                }
            }
            GearBoxOperation::Automatic | GearBoxOperation::Semiautomatic => {
                if let Some(gear) = self.current_gear() {
                    let (g_min, g_max, g_ratio, up_p, down_p) = (
                        gear.min_speed_mps,
                        gear.max_speed_mps,
                        gear.ratio,
                        gear.up_gear_proportion,
                        gear.down_gear_proportion,
                    );
                    if self.advanced {
                        let blend =
                            SHIFT_BLEND_BASE + SHIFT_BLEND_THROTTLE * (ctx.throttle_percent / 100.0);
                        if ctx.speed_mps > g_max * blend {
                            self.auto_gear_up();
                        } else if ctx.speed_mps < g_min * blend {
                            self.auto_gear_down();
                        } else {
                            self.auto_at_gear();
                        }
                    } else if ctx.speed_mps > ctx.engine_max_rpm * up_p * g_ratio {
                        self.auto_gear_up();
                    } else if ctx.speed_mps < ctx.engine_max_rpm * down_p * g_ratio {
                        self.auto_gear_down();
                    } else {
                        self.auto_at_gear();
                    }

                    if ctx.throttle_percent == 0.0 {
                        self.reset_to_neutral();
                    }
                } else if ctx.throttle_percent > 0.0 {
                    self.auto_gear_up();
                } else {
                    self.reset_to_neutral();
                }
            }
        }

        event
    }

    /// Shaft RPM seen through the current gear; the engine's own RPM when
    /// neutral.
    pub fn shaft_rpm(&self, ctx: &GearBoxContext) -> f64 {
        match self.current_gear() {
            Some(g) if g.ratio > 0.0 => ctx.speed_mps / g.ratio,
            _ => ctx.engine_rpm,
        }
    }

    /// Clutch engagement: throttle applied and shaft RPM past the gear's
    /// down-proportion of max RPM engages; a torque-converter gear never
    /// engages; shaft RPM under the engine's starting RPM always disengages.
    pub fn is_clutch_on(&mut self, ctx: &GearBoxContext) -> bool {
        let shaft_rpm = self.shaft_rpm(ctx);
        let gear_info = self
            .current_gear()
            .map(|g| (g.down_gear_proportion, g.is_converter));
        if ctx.throttle_percent > 0.0 {
            if let Some((down_proportion, is_converter)) = gear_info {
                if shaft_rpm >= down_proportion * ctx.engine_max_rpm {
                    self.clutch_on = true;
                }
                if is_converter {
                    self.clutch_on = false;
                }
            }
        }
        if shaft_rpm < ctx.engine_starting_rpm {
            self.clutch_on = false;
        }
        self.clutch_on
    }

    /// Engine RPM past the gear's overspeed-failure percentage of max RPM.
    pub fn is_overspeed_error(&self, ctx: &GearBoxContext) -> bool {
        match self.current_gear() {
            None => false,
            Some(g) => {
                ctx.engine_max_rpm > 0.0
                    && ctx.engine_rpm / ctx.engine_max_rpm * 100.0 > g.overspeed_percentage
            }
        }
    }

    /// Engine RPM past max RPM while in gear.
    pub fn is_overspeed_warning(&self, ctx: &GearBoxContext) -> bool {
        match self.current_gear() {
            None => false,
            Some(_) => ctx.engine_max_rpm > 0.0 && ctx.engine_rpm > ctx.engine_max_rpm,
        }
    }

    /// Tractive force at the rail for this tick.
    ///
    /// Zero when neutral. Engaged (clutch ≥ −20 %): the torque-table value at
    /// the current RPM, scaled by demanded throttle over the table maximum
    /// and the gear's max tractive force, capped so force × speed never
    /// exceeds the engine's output power. An all-zero torque table means the
    /// engine is stopped: zero force, before any division. Past −20 % the
    /// box returns coasting drag proportional to how far beyond full
    /// disengagement the clutch sits.
    pub fn tractive_force_n(&self, ctx: &GearBoxContext) -> f64 {
        let Some(gear) = self.current_gear() else {
            return 0.0;
        };
        let clutch_pct = self.clutch_percent();
        if clutch_pct >= COASTING_CLUTCH_FLOOR_PCT {
            if ctx.torque_max <= 0.0 {
                return 0.0;
            }
            let mut force_n = ctx.torque_at_rpm * ctx.demanded_throttle_percent / ctx.torque_max
                * 0.01
                * gear.max_tractive_force_n;
            if ctx.speed_mps > 0.0 && force_n > ctx.engine_power_w / ctx.speed_mps {
                force_n = ctx.engine_power_w / ctx.speed_mps;
            }
            force_n
        } else {
            -gear.coasting_force_n * (100.0 + clutch_pct) / 100.0
        }
    }

    /// Seed the box for a moving start: lowest gear covering the speed,
    /// clutch engaged at 0.4.
    pub fn initialize_moving(&mut self, speed_mps: f64) {
        for (i, gear) in self.gears.iter().enumerate() {
            if gear.max_speed_mps < speed_mps {
                continue;
            }
            self.current = Some(i);
            self.next = Some(i);
            break;
        }
        self.geared_up = false;
        self.geared_down = false;
        self.clutch_on = true;
        self.clutch = 0.4;
    }

    pub fn snapshot(&self) -> GearBoxSnapshot {
        GearBoxSnapshot {
            current_gear_index: rank(self.current) as i32,
            next_gear_index: rank(self.next) as i32,
            geared_up: self.geared_up,
            geared_down: self.geared_down,
            clutch_on: self.clutch_on,
            clutch: self.clutch,
        }
    }

    /// Restore persisted state. Out-of-range indices collapse to neutral
    /// rather than leaving an invalid cursor.
    pub fn restore(&mut self, snapshot: &GearBoxSnapshot) {
        let to_slot = |idx: i32| -> Option<usize> {
            usize::try_from(idx).ok().filter(|&i| i < self.gears.len())
        };
        self.current = to_slot(snapshot.current_gear_index);
        self.next = to_slot(snapshot.next_gear_index);
        self.geared_up = snapshot.geared_up;
        self.geared_down = snapshot.geared_down;
        self.clutch_on = snapshot.clutch_on;
        self.clutch = snapshot.clutch;
    }
}
