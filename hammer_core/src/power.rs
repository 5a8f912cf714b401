//! Power capture.
//!
//! The meter follows the per-frame face score while the game is idle and
//! freezes the moment a throw is committed. The locked value is mapped into
//! the configured throw power range and never changes for that round.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{config::PowerRange, math::damp_factor};

/// Normalized face score, always inside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct PowerScore(f32);

impl PowerScore {
    pub const ZERO: Self = Self(0.0);
    pub const MAX: Self = Self(1.0);

    /// Clamps into `[0, 1]`; NaN becomes 0.
    pub fn new(v: f32) -> Self {
        if v.is_nan() {
            Self::ZERO
        } else {
            Self(v.clamp(0.0, 1.0))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

/// Launch speed committed for one round.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ThrowPower(f32);

impl ThrowPower {
    /// Maps a score linearly into `range`.
    pub fn from_score(score: PowerScore, range: PowerRange) -> Self {
        Self(range.min + score.value() * range.span())
    }

    /// Wraps an externally supplied power. Rejects negative and non-finite values.
    pub fn from_raw(v: f32) -> Result<Self, PowerError> {
        if !v.is_finite() || v < 0.0 {
            return Err(PowerError::InvalidPower(v));
        }
        Ok(Self(v))
    }

    /// Like [`ThrowPower::from_raw`], but also requires `v` to lie in `range`.
    pub fn within(v: f32, range: PowerRange) -> Result<Self, PowerError> {
        let power = Self::from_raw(v)?;
        if !(range.min..=range.max).contains(&v) {
            return Err(PowerError::OutOfRange {
                power: v,
                min: range.min,
                max: range.max,
            });
        }
        Ok(power)
    }

    /// Inverse of [`ThrowPower::from_score`].
    pub fn to_score(self, range: PowerRange) -> PowerScore {
        PowerScore::new((self.0 - range.min) / range.span())
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

/// Power capture errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerError {
    /// The meter is already locked for this round.
    AlreadyLocked,
    InvalidPower(f32),
    OutOfRange { power: f32, min: f32, max: f32 },
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerError::AlreadyLocked => write!(f, "power already locked for this round"),
            PowerError::InvalidPower(v) => write!(f, "invalid throw power {v}"),
            PowerError::OutOfRange { power, min, max } => {
                write!(f, "throw power {power} outside {min}..={max}")
            }
        }
    }
}

impl std::error::Error for PowerError {}

/// Meter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterState {
    /// Following the face score.
    Capturing,
    /// Frozen at the committed power.
    Locked,
}

/// Smoothed power meter.
#[derive(Debug, Clone)]
pub struct PowerMeter {
    range: PowerRange,
    /// Smoothing rate in 1/s. 0 follows the raw score.
    smoothing: f32,
    current: PowerScore,
    peak: PowerScore,
    state: MeterState,
    locked: Option<ThrowPower>,
}

impl PowerMeter {
    pub fn new(range: PowerRange, smoothing: f32) -> Self {
        Self {
            range,
            smoothing,
            current: PowerScore::ZERO,
            peak: PowerScore::ZERO,
            state: MeterState::Capturing,
            locked: None,
        }
    }

    pub fn state(&self) -> MeterState {
        self.state
    }

    pub fn range(&self) -> PowerRange {
        self.range
    }

    /// Current (smoothed) score.
    pub fn current(&self) -> PowerScore {
        self.current
    }

    /// Highest score seen since the meter was last armed.
    pub fn peak(&self) -> PowerScore {
        self.peak
    }

    /// Power that would be committed right now.
    pub fn preview(&self) -> ThrowPower {
        ThrowPower::from_score(self.current, self.range)
    }

    pub fn locked(&self) -> Option<ThrowPower> {
        self.locked
    }

    /// Feeds one frame's score. Returns `false` if the meter is locked and
    /// the update was ignored.
    pub fn update(&mut self, score: PowerScore, dt: f32) -> bool {
        if self.state == MeterState::Locked {
            return false;
        }
        let next = if self.smoothing > 0.0 {
            let k = damp_factor(self.smoothing, dt);
            self.current.value() + (score.value() - self.current.value()) * k
        } else {
            score.value()
        };
        self.current = PowerScore::new(next);
        if self.current > self.peak {
            self.peak = self.current;
        }
        true
    }

    /// Commits the current power for this round.
    pub fn lock(&mut self) -> Result<ThrowPower, PowerError> {
        if self.state == MeterState::Locked {
            return Err(PowerError::AlreadyLocked);
        }
        let power = self.preview();
        self.lock_at(power);
        Ok(power)
    }

    /// Commits an externally chosen power.
    pub fn lock_at(&mut self, power: ThrowPower) {
        self.state = MeterState::Locked;
        self.locked = Some(power);
    }

    /// Clears the round and resumes capture from zero.
    pub fn rearm(&mut self) {
        self.current = PowerScore::ZERO;
        self.peak = PowerScore::ZERO;
        self.state = MeterState::Capturing;
        self.locked = None;
    }
}

/// Hold-to-throw settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoReleaseConfig {
    pub enabled: bool,
    pub threshold: f32,
    pub hold_secs: f32,
}

impl Default for AutoReleaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.85,
            hold_secs: 1.5,
        }
    }
}

/// Fires a release once the score has stayed high for long enough.
#[derive(Debug, Clone)]
pub struct AutoRelease {
    cfg: AutoReleaseConfig,
    held: f32,
}

impl AutoRelease {
    pub fn new(cfg: AutoReleaseConfig) -> Self {
        Self { cfg, held: 0.0 }
    }

    pub fn enabled(&self) -> bool {
        self.cfg.enabled
    }

    /// Seconds the score has been at or above the threshold.
    pub fn held_secs(&self) -> f32 {
        self.held
    }

    /// Returns `true` on the frame the hold completes.
    pub fn observe(&mut self, score: PowerScore, dt: f32) -> bool {
        if !self.cfg.enabled {
            return false;
        }
        if score.value() >= self.cfg.threshold {
            self.held += dt.max(0.0);
        } else {
            self.held = 0.0;
        }
        if self.held >= self.cfg.hold_secs {
            self.held = 0.0;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.held = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> PowerRange {
        PowerRange::new(10.0, 35.0)
    }

    #[test]
    fn score_is_clamped() {
        assert_eq!(PowerScore::new(-1.0).value(), 0.0);
        assert_eq!(PowerScore::new(3.0).value(), 1.0);
        assert_eq!(PowerScore::new(f32::NAN).value(), 0.0);
    }

    #[test]
    fn mapping_hits_range_ends() {
        assert_eq!(ThrowPower::from_score(PowerScore::ZERO, range()).value(), 10.0);
        assert_eq!(ThrowPower::from_score(PowerScore::MAX, range()).value(), 35.0);
        assert_eq!(ThrowPower::from_score(PowerScore::new(0.5), range()).value(), 22.5);
    }

    #[test]
    fn mapping_is_strictly_monotonic_and_invertible() {
        let mut prev = f32::MIN;
        for i in 0..=200 {
            let s = PowerScore::new(i as f32 / 200.0);
            let p = ThrowPower::from_score(s, range());
            assert!(p.value() > prev);
            prev = p.value();
            assert!((p.to_score(range()).value() - s.value()).abs() < 1e-5);
        }
    }

    #[test]
    fn raw_power_validation() {
        assert!(ThrowPower::from_raw(20.0).is_ok());
        assert_eq!(ThrowPower::from_raw(-1.0), Err(PowerError::InvalidPower(-1.0)));
        assert!(ThrowPower::from_raw(f32::NAN).is_err());
        assert!(ThrowPower::from_raw(f32::INFINITY).is_err());
    }

    #[test]
    fn ranged_power_validation() {
        assert!(ThrowPower::within(10.0, range()).is_ok());
        assert!(ThrowPower::within(35.0, range()).is_ok());
        assert_eq!(
            ThrowPower::within(1000.0, range()),
            Err(PowerError::OutOfRange {
                power: 1000.0,
                min: 10.0,
                max: 35.0
            })
        );
        assert!(matches!(
            ThrowPower::within(0.0, range()),
            Err(PowerError::OutOfRange { .. })
        ));
        // Non-finite input is still an invalid power, not a range miss.
        assert!(matches!(
            ThrowPower::within(f32::NAN, range()),
            Err(PowerError::InvalidPower(_))
        ));
        assert_eq!(
            PowerError::OutOfRange { power: 5.0, min: 10.0, max: 35.0 }.to_string(),
            "throw power 5 outside 10..=35"
        );
    }

    #[test]
    fn unsmoothed_meter_follows_raw_score() {
        let mut meter = PowerMeter::new(range(), 0.0);
        meter.update(PowerScore::new(0.4), 1.0 / 60.0);
        assert_eq!(meter.current().value(), 0.4);
        meter.update(PowerScore::new(0.1), 1.0 / 60.0);
        assert_eq!(meter.current().value(), 0.1);
        assert_eq!(meter.peak().value(), 0.4);
    }

    #[test]
    fn smoothed_meter_converges() {
        let mut meter = PowerMeter::new(range(), 8.0);
        meter.update(PowerScore::MAX, 1.0 / 60.0);
        assert!(meter.current().value() < 0.5);
        for _ in 0..120 {
            meter.update(PowerScore::MAX, 1.0 / 60.0);
        }
        assert!(meter.current().value() > 0.99);
    }

    #[test]
    fn lock_freezes_until_rearm() {
        let mut meter = PowerMeter::new(range(), 0.0);
        meter.update(PowerScore::new(0.8), 0.016);
        let p = meter.lock().unwrap();
        assert!((p.value() - 30.0).abs() < 1e-4);
        assert!(!meter.update(PowerScore::ZERO, 0.016));
        assert_eq!(meter.current().value(), 0.8);
        assert_eq!(meter.lock(), Err(PowerError::AlreadyLocked));
        assert_eq!(meter.locked(), Some(p));

        meter.rearm();
        assert_eq!(meter.state(), MeterState::Capturing);
        assert_eq!(meter.current().value(), 0.0);
        assert!(meter.update(PowerScore::new(0.2), 0.016));
    }

    #[test]
    fn auto_release_needs_continuous_hold() {
        let mut auto = AutoRelease::new(AutoReleaseConfig {
            enabled: true,
            threshold: 0.8,
            hold_secs: 1.0,
        });
        let high = PowerScore::new(0.9);
        for _ in 0..5 {
            assert!(!auto.observe(high, 0.1));
        }
        assert!(!auto.observe(PowerScore::new(0.2), 0.1));
        assert_eq!(auto.held_secs(), 0.0);

        let mut fired = 0;
        for _ in 0..11 {
            if auto.observe(high, 0.1) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn auto_release_disabled_never_fires() {
        let mut auto = AutoRelease::new(AutoReleaseConfig::default());
        for _ in 0..1000 {
            assert!(!auto.observe(PowerScore::MAX, 0.1));
        }
    }
}
