use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Level the simulation starts from.
pub const BATTERY_START: f64 = 85.0;
/// Discharge stops and charging begins at or below this level.
pub const BATTERY_LOW: f64 = 20.0;
/// Charging stops and discharge begins at or above this level.
pub const BATTERY_HIGH: f64 = 100.0;

const DRAIN_PER_TICK: f64 = 0.01;
const CHARGE_PER_TICK: f64 = 0.02;

/// Deterministic battery oscillation advanced once per connected tick.
///
/// Drains by 0.01 per tick until the level reaches [`BATTERY_LOW`], then
/// charges by 0.02 per tick until it reaches [`BATTERY_HIGH`], repeating. The
/// level never leaves `[BATTERY_LOW, BATTERY_HIGH]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatterySimulator {
    level: f64,
    draining: bool,
}

impl BatterySimulator {
    pub fn new() -> Self {
        Self::starting_at(BATTERY_START, true)
    }

    /// Start from an explicit level and direction.
    pub fn starting_at(level: f64, draining: bool) -> Self {
        Self {
            level: level.clamp(BATTERY_LOW, BATTERY_HIGH),
            draining,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Advance one tick and return the new level.
    pub fn advance(&mut self) -> f64 {
        if self.draining {
            self.level = (self.level - DRAIN_PER_TICK).max(BATTERY_LOW);
            if self.level <= BATTERY_LOW {
                self.draining = false;
            }
        } else {
            self.level = (self.level + CHARGE_PER_TICK).min(BATTERY_HIGH);
            if self.level >= BATTERY_HIGH {
                self.draining = true;
            }
        }
        self.level
    }
}

impl Default for BatterySimulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the link's battery reading comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatterySource {
    /// The tick simulation always writes the level; a wire report lasts until
    /// the next tick.
    Simulated,
    /// Only wire reports set the level.
    Reported,
    /// Simulate until the robot reports a level, then the wire owns it until
    /// the next connect.
    #[default]
    Auto,
}

impl BatterySource {
    pub fn as_str(self) -> &'static str {
        match self {
            BatterySource::Simulated => "simulated",
            BatterySource::Reported => "reported",
            BatterySource::Auto => "auto",
        }
    }
}

impl fmt::Display for BatterySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown battery source {0:?} (expected simulated, reported or auto)")]
pub struct UnknownBatterySource(pub String);

impl FromStr for BatterySource {
    type Err = UnknownBatterySource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(BatterySource::Simulated),
            "reported" => Ok(BatterySource::Reported),
            "auto" => Ok(BatterySource::Auto),
            _ => Err(UnknownBatterySource(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_ticks_drain_monotonically() {
        let mut battery = BatterySimulator::new();
        let mut previous = battery.level();
        for _ in 0..100 {
            let level = battery.advance();
            assert!(level <= previous);
            assert!((BATTERY_LOW..=BATTERY_HIGH).contains(&level));
            previous = level;
        }
        assert!((battery.level() - 84.0).abs() < 1e-6);
    }

    #[test]
    fn turns_around_at_low_bound() {
        let mut battery = BatterySimulator::starting_at(20.005, true);
        assert_eq!(battery.advance(), BATTERY_LOW);
        assert!(!battery.is_draining());

        let mut previous = battery.level();
        for _ in 0..50 {
            let level = battery.advance();
            assert!(level >= previous);
            previous = level;
        }
        assert!((battery.level() - 21.0).abs() < 1e-6);
    }

    #[test]
    fn full_cycle_stays_in_bounds() {
        let mut battery = BatterySimulator::new();
        let mut turned_up = false;
        let mut turned_down = false;
        let mut was_draining = battery.is_draining();
        for _ in 0..20_000 {
            let level = battery.advance();
            assert!((BATTERY_LOW..=BATTERY_HIGH).contains(&level));
            if was_draining && !battery.is_draining() {
                turned_up = true;
            }
            if !was_draining && battery.is_draining() {
                turned_down = true;
            }
            was_draining = battery.is_draining();
        }
        assert!(turned_up && turned_down);
    }

    #[test]
    fn source_parses() {
        assert_eq!("AUTO".parse::<BatterySource>().unwrap(), BatterySource::Auto);
        assert_eq!(
            "reported".parse::<BatterySource>().unwrap(),
            BatterySource::Reported
        );
        assert!("solar".parse::<BatterySource>().is_err());
    }
}
