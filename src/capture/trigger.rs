//! Trigger policies: who starts and stops a recording, and when.
//!
//! Three observed policies, all configuration choices: press-to-start with
//! an auto-stop timeout, press-to-toggle, and auto-start after a delay. The
//! schedule converts user presses and the passage of time into explicit
//! [`CaptureCommand`] messages; the recorder never learns which policy is
//! driving it.
//!
//! Time here is the capture timebase (tick index / target framerate), not
//! wall clock, so schedules are deterministic and stay aligned with the
//! encoded output. Deferred stops are delivered by `poll` between ticks,
//! which is what keeps a timed stop from racing a capture call.

use crate::config::TriggerPolicy;

/// Command message delivered to the recorder's `handle` entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Start,
    Stop,
}

/// Stateful schedule for one trigger policy.
#[derive(Debug)]
pub struct TriggerSchedule {
    policy: TriggerPolicy,
    /// Pending deferred start, capture-timebase seconds
    start_at: Option<f64>,
    /// Pending deferred stop, capture-timebase seconds
    stop_at: Option<f64>,
    /// Whether this schedule believes a session it initiated is running
    active: bool,
}

impl TriggerSchedule {
    pub fn new(policy: TriggerPolicy) -> Self {
        let start_at = match policy {
            TriggerPolicy::AutoStart { delay, .. } => Some(f64::from(delay)),
            _ => None,
        };
        Self {
            policy,
            start_at,
            stop_at: None,
            active: false,
        }
    }

    /// A user press of the record trigger at time `now`.
    pub fn press(&mut self, now: f64) -> Option<CaptureCommand> {
        match self.policy {
            TriggerPolicy::PressWithTimeout { duration } => {
                if self.active {
                    // Session already running toward its timeout
                    None
                } else {
                    self.active = true;
                    self.stop_at = Some(now + f64::from(duration));
                    Some(CaptureCommand::Start)
                }
            }
            TriggerPolicy::Toggle => {
                self.active = !self.active;
                if self.active {
                    Some(CaptureCommand::Start)
                } else {
                    Some(CaptureCommand::Stop)
                }
            }
            // Fully automatic; presses are ignored
            TriggerPolicy::AutoStart { .. } => None,
        }
    }

    /// Deliver any timer-driven command due at time `now`. Called once per
    /// tick, before the tick's animation update, so a deferred stop always
    /// lands between two ticks.
    pub fn poll(&mut self, now: f64) -> Option<CaptureCommand> {
        if let Some(at) = self.start_at {
            if now >= at {
                self.start_at = None;
                self.active = true;
                if let TriggerPolicy::AutoStart { duration, .. } = self.policy {
                    self.stop_at = Some(at + f64::from(duration));
                }
                return Some(CaptureCommand::Start);
            }
        }
        if let Some(at) = self.stop_at {
            if now >= at {
                self.stop_at = None;
                self.active = false;
                return Some(CaptureCommand::Stop);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_with_timeout_schedule() {
        let mut schedule = TriggerSchedule::new(TriggerPolicy::PressWithTimeout { duration: 5.0 });
        assert_eq!(schedule.poll(0.0), None);

        assert_eq!(schedule.press(1.0), Some(CaptureCommand::Start));
        // Second press during the session does nothing
        assert_eq!(schedule.press(2.0), None);

        assert_eq!(schedule.poll(5.9), None);
        assert_eq!(schedule.poll(6.0), Some(CaptureCommand::Stop));
        assert_eq!(schedule.poll(7.0), None);

        // A new press starts a fresh session
        assert_eq!(schedule.press(10.0), Some(CaptureCommand::Start));
    }

    #[test]
    fn test_toggle_schedule() {
        let mut schedule = TriggerSchedule::new(TriggerPolicy::Toggle);
        assert_eq!(schedule.press(0.0), Some(CaptureCommand::Start));
        assert_eq!(schedule.poll(100.0), None, "no timers in toggle mode");
        assert_eq!(schedule.press(3.0), Some(CaptureCommand::Stop));
        assert_eq!(schedule.press(4.0), Some(CaptureCommand::Start));
    }

    #[test]
    fn test_auto_start_schedule() {
        let mut schedule = TriggerSchedule::new(TriggerPolicy::AutoStart {
            delay: 2.0,
            duration: 5.0,
        });
        assert_eq!(schedule.press(0.5), None, "presses ignored");
        assert_eq!(schedule.poll(1.9), None);
        assert_eq!(schedule.poll(2.0), Some(CaptureCommand::Start));
        assert_eq!(schedule.poll(6.9), None);
        // Stop fires at delay + duration
        assert_eq!(schedule.poll(7.0), Some(CaptureCommand::Stop));
        assert_eq!(schedule.poll(20.0), None, "one-shot");
    }

    #[test]
    fn test_auto_start_late_poll_still_fires_both() {
        let mut schedule = TriggerSchedule::new(TriggerPolicy::AutoStart {
            delay: 1.0,
            duration: 1.0,
        });
        // Start is overdue; stop is anchored to the scheduled start time
        assert_eq!(schedule.poll(1.5), Some(CaptureCommand::Start));
        assert_eq!(schedule.poll(2.0), Some(CaptureCommand::Stop));
    }
}
