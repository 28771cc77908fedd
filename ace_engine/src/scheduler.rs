//! Timing primitives for the cooperative tick loop.
//!
//! Everything that used to be a "wait N seconds" suspension point is modelled
//! as explicit state advanced by `tick(dt)`. A sequence category owns at most
//! one of these at a time; installing a new one replaces (and thereby
//! cancels) the old one, which simply stops advancing at whatever value it
//! last produced.

/// Counts wall-clock seconds down to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    remaining: f32,
}

impl Countdown {
    pub fn new(seconds: f32) -> Self {
        Countdown {
            remaining: seconds.max(0.0),
        }
    }

    /// Advances by `dt` seconds; returns true once the countdown has elapsed.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining = (self.remaining - dt).max(0.0);
        self.finished()
    }

    pub fn finished(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }
}

/// Linear interpolation from `from` to `to` over `duration` seconds.
///
/// A zero or negative duration snaps straight to `to` on the first tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
}

impl Ramp {
    pub fn new(from: f32, to: f32, duration: f32) -> Self {
        Ramp {
            from,
            to,
            duration: duration.max(0.0),
            elapsed: 0.0,
        }
    }

    pub fn tick(&mut self, dt: f32) -> f32 {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.value()
    }

    pub fn value(&self) -> f32 {
        if self.duration <= 0.0 || self.elapsed >= self.duration {
            return self.to;
        }
        let t = self.elapsed / self.duration;
        self.from + (self.to - self.from) * t
    }

    pub fn from(&self) -> f32 {
        self.from
    }

    pub fn finished(&self) -> bool {
        self.duration <= 0.0 || self.elapsed >= self.duration
    }
}
