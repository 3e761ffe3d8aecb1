// Stuck detection from successive position samples.
//
// Every frame the mover (player being recorded, or bot following a path)
// reports where it is and how long the frame was. If it covered less ground
// than walking speed would carry it, distress rises; otherwise distress
// decays. Accumulated distress maps onto escalating advice: first a jump to
// clear a lip or small obstacle, then a forced heading change.
//
// Riding a mover counts stuck frames at a much lower rate and never yields
// advice, since standing still on a lift is expected. Liquid scales the
// expected travel down. A jump in position larger than the teleport
// distance resets everything.

use crate::config::{NavConfig, StuckParams};
use crate::types::Vec3;
use serde::{Deserialize, Serialize};

/// What a stuck mover should try next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StuckAdvice {
    /// Making progress, or not stuck for long enough to act.
    #[default]
    None,
    /// Nudge upward.
    Jump,
    /// Pick a new heading.
    Turn,
}

/// Per-frame movement facts fed to the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveSample {
    pub position: Vec3,
    /// Frame length in milliseconds.
    pub msec: u32,
    pub in_liquid: bool,
    pub on_mover: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StuckDetector {
    distress: f32,
    last_position: Option<Vec3>,
}

impl StuckDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distress(&self) -> f32 {
        self.distress
    }

    /// Forget accumulated distress and the position baseline.
    pub fn reset(&mut self) {
        self.distress = 0.0;
        self.last_position = None;
    }

    /// Ground a walker should cover in `msec`.
    pub fn expected_travel(config: &NavConfig, msec: u32, in_liquid: bool) -> f32 {
        let travel = config.run_speed * config.walk_speed_modifier * msec as f32 / 1000.0;
        if in_liquid {
            travel * config.stuck.liquid_factor
        } else {
            travel
        }
    }

    /// Feed one frame and get advice.
    pub fn update(&mut self, sample: MoveSample, config: &NavConfig) -> StuckAdvice {
        let Some(last) = self.last_position.replace(sample.position) else {
            return StuckAdvice::None;
        };

        let moved = last.distance(sample.position);
        if moved > config.teleport_distance {
            self.distress = 0.0;
            return StuckAdvice::None;
        }

        let params = &config.stuck;
        if moved < Self::expected_travel(config, sample.msec, sample.in_liquid) {
            if sample.on_mover {
                self.distress += params.mover_distress_step;
                return StuckAdvice::None;
            }
            self.distress += params.distress_step;
        } else {
            self.distress = (self.distress - params.distress_step).max(0.0);
        }

        Self::advice_for(self.distress, params)
    }

    fn advice_for(distress: f32, params: &StuckParams) -> StuckAdvice {
        if distress > params.turn_threshold {
            StuckAdvice::Turn
        } else if distress > params.jump_threshold {
            StuckAdvice::Jump
        } else {
            StuckAdvice::None
        }
    }
}
