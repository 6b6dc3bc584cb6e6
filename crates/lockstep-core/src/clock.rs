//! Simulated clock: maps real elapsed time to simulation time under a
//! mutable speed multiplier.
//!
//! The clock is independent of the tick loop. It anchors a simulated
//! timestamp to a real [`Instant`] and derives the current simulation
//! time as `sim_anchor + (real_elapsed - total_paused) * speed`. Speed
//! changes re-anchor both clocks so that simulation time is continuous
//! across the change; only the future rate changes.
//!
//! # Invariants
//!
//! - Simulation time is monotonic non-decreasing while unpaused.
//! - While paused, simulation time is frozen at the value computed the
//!   moment the pause began.
//! - Speed is strictly positive and finite; zero and negative speeds are
//!   rejected (pause already expresses "frozen").

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The requested speed multiplier is not usable.
    #[error("invalid clock speed {speed}: must be finite and strictly positive")]
    InvalidSpeed {
        /// The rejected speed value.
        speed: f64,
    },
}

/// Mutable clock state, guarded by one lock.
#[derive(Debug)]
struct ClockState {
    /// Simulation seconds per real second.
    speed: f64,
    /// Real-time anchor for elapsed measurement.
    real_anchor: Instant,
    /// Simulation time at the real anchor.
    sim_anchor: DateTime<Utc>,
    /// Whether the clock is paused.
    paused: bool,
    /// When the current pause began, if paused.
    paused_at: Option<Instant>,
    /// Accumulated real time spent paused since the last anchor.
    total_paused: Duration,
}

impl ClockState {
    /// Compute the simulation time as of `now`.
    ///
    /// While paused, the reference point is the pause start, which
    /// freezes the returned value for the duration of the pause.
    fn simulation_time(&self, now: Instant) -> DateTime<Utc> {
        let reference = if self.paused {
            self.paused_at.unwrap_or(now)
        } else {
            now
        };
        let real_elapsed = reference
            .checked_duration_since(self.real_anchor)
            .unwrap_or_default();
        let active = real_elapsed.saturating_sub(self.total_paused);
        let sim_elapsed = scale_duration(active, self.speed);
        self.sim_anchor + TimeDelta::from_std(sim_elapsed).unwrap_or(TimeDelta::MAX)
    }

    /// Re-anchor both clocks at `now`, preserving the current simulation
    /// time and the paused flag. Pause bookkeeping restarts from `now`.
    fn re_anchor(&mut self, now: Instant) {
        self.sim_anchor = self.simulation_time(now);
        self.real_anchor = now;
        self.total_paused = Duration::ZERO;
        self.paused_at = self.paused.then_some(now);
    }
}

/// A simulated clock with a mutable speed multiplier and pause support.
///
/// Cheap to share: wrap in an [`Arc`](std::sync::Arc) and hand clones to
/// anything that needs to read simulation time.
#[derive(Debug)]
pub struct SimClock {
    state: RwLock<ClockState>,
}

impl SimClock {
    /// Create a clock running at real time (speed 1.0), with simulation
    /// time anchored to the current wall clock.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a clock whose simulation time starts at the given instant.
    pub fn starting_at(sim_start: DateTime<Utc>) -> Self {
        Self {
            state: RwLock::new(ClockState {
                speed: 1.0,
                real_anchor: Instant::now(),
                sim_anchor: sim_start,
                paused: false,
                paused_at: None,
                total_paused: Duration::ZERO,
            }),
        }
    }

    /// Return the current simulation time.
    ///
    /// Frozen while the clock is paused.
    pub fn simulation_time(&self) -> DateTime<Utc> {
        self.read().simulation_time(Instant::now())
    }

    /// Return the current speed multiplier.
    pub fn speed(&self) -> f64 {
        self.read().speed
    }

    /// Whether the clock is currently paused.
    pub fn is_paused(&self) -> bool {
        self.read().paused
    }

    /// Change the speed multiplier.
    ///
    /// Both clocks are re-anchored to "now" before the new multiplier is
    /// applied, so the simulation time immediately before and after the
    /// change is identical.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidSpeed`] if `speed` is not finite and
    /// strictly positive.
    pub fn set_speed(&self, speed: f64) -> Result<(), ClockError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ClockError::InvalidSpeed { speed });
        }
        let mut state = self.write();
        state.re_anchor(Instant::now());
        state.speed = speed;
        Ok(())
    }

    /// Pause the clock. Idempotent if already paused.
    pub fn pause(&self) {
        let mut state = self.write();
        if !state.paused {
            state.paused = true;
            state.paused_at = Some(Instant::now());
        }
    }

    /// Resume the clock. Idempotent if already running.
    ///
    /// The time spent paused is added to the accumulated paused duration
    /// so it never contributes to simulation time.
    pub fn resume(&self) {
        let mut state = self.write();
        if state.paused {
            if let Some(paused_at) = state.paused_at.take() {
                let paused_for = Instant::now()
                    .checked_duration_since(paused_at)
                    .unwrap_or_default();
                state.total_paused = state.total_paused.saturating_add(paused_for);
            }
            state.paused = false;
        }
    }

    /// Convert a real duration to the simulated duration it spans at the
    /// current speed.
    pub fn to_simulation_duration(&self, real: Duration) -> Duration {
        scale_duration(real, self.read().speed)
    }

    /// Convert a simulated duration to the real duration it takes at the
    /// current speed.
    pub fn to_real_duration(&self, sim: Duration) -> Duration {
        let speed = self.read().speed;
        scale_duration(sim, speed.recip())
    }

    /// Suspend the caller until `sim_duration` of simulation time would
    /// have elapsed at the current speed.
    ///
    /// The speed is sampled once at the start of the wait. Cancellable by
    /// dropping the returned future.
    pub async fn wait_simulation_time(&self, sim_duration: Duration) {
        let real = self.to_real_duration(sim_duration);
        tokio::time::sleep(real).await;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ClockState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ClockState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Multiply a duration by a positive finite factor, saturating at the
/// representable maximum.
fn scale_duration(duration: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
