//! Animation clock: the single monotonic time source for deformation.
//!
//! One policy per clock, picked at construction. Fixed-step is the default:
//! time advances by a constant amount per tick regardless of wall-clock frame
//! duration, which makes runs reproducible and keeps captured output free of
//! timing skew. Wall-clock matches real elapsed time but is non-deterministic
//! across runs. The two are never mixed within one animation.

use std::time::Instant;

use crate::config::ClockPolicy;

/// Monotonic time source advancing once per rendered frame.
#[derive(Debug)]
pub struct AnimationClock {
    policy: ClockPolicy,
    time: f32,
    origin: Option<Instant>,
}

impl AnimationClock {
    pub fn new(policy: ClockPolicy) -> Self {
        Self {
            policy,
            time: 0.0,
            origin: None,
        }
    }

    /// Advance the clock by one tick and return the new time.
    pub fn advance(&mut self) -> f32 {
        match self.policy {
            ClockPolicy::FixedStep { dt } => {
                self.time += dt;
            }
            ClockPolicy::WallClock => {
                let origin = *self.origin.get_or_insert_with(Instant::now);
                self.time = origin.elapsed().as_secs_f32();
            }
        }
        self.time
    }

    /// Current time without advancing.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn policy(&self) -> ClockPolicy {
        self.policy
    }
}
