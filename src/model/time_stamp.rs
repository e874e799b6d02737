//! Onset/offset time stamps.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A point in time expressed as `ticks` at `tps` ticks per second.
///
/// Comparison is by absolute time, so `30@60` equals `15@30`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "RawTimeStamp")]
pub struct TimeStamp {
    ticks: i64,
    tps: u32,
}

/// Wire shape of [`TimeStamp`], checked by [`TimeStamp::new`] on the way in.
#[derive(Deserialize)]
struct RawTimeStamp {
    ticks: i64,
    tps: u32,
}

impl TryFrom<RawTimeStamp> for TimeStamp {
    type Error = Error;

    fn try_from(raw: RawTimeStamp) -> Result<Self> {
        Self::new(raw.tps, raw.ticks)
    }
}

impl TimeStamp {
    pub const DEFAULT_TPS: u32 = 60;

    pub fn new(tps: u32, ticks: i64) -> Result<Self> {
        if tps == 0 {
            return Err(Error::InvalidArgument("ticks per second must be positive".into()));
        }
        if ticks < 0 {
            return Err(Error::InvalidArgument(format!("negative tick count {ticks}")));
        }
        Ok(Self { ticks, tps })
    }

    /// Zero at the given tick rate.
    pub fn zero(tps: u32) -> Result<Self> {
        Self::new(tps, 0)
    }

    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    pub fn tps(&self) -> u32 {
        self.tps
    }

    /// Whole milliseconds since zero, truncated.
    pub fn millis(&self) -> i64 {
        ((self.ticks as i128 * 1000) / self.tps as i128) as i64
    }

    fn scaled(&self, other_tps: u32) -> i128 {
        self.ticks as i128 * other_tps as i128
    }
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self { ticks: 0, tps: Self::DEFAULT_TPS }
    }
}

impl PartialEq for TimeStamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeStamp {}

impl PartialOrd for TimeStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scaled(other.tps).cmp(&other.scaled(self.tps))
    }
}

impl fmt::Display for TimeStamp {
    /// `HH:MM:SS:mmm`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.millis();
        write!(
            f,
            "{:02}:{:02}:{:02}:{:03}",
            ms / 3_600_000,
            (ms / 60_000) % 60,
            (ms / 1000) % 60,
            ms % 1000
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_across_rates() {
        let a = TimeStamp::new(60, 30).unwrap();
        let b = TimeStamp::new(30, 15).unwrap();
        let c = TimeStamp::new(1000, 501).unwrap();
        assert_eq!(a, b);
        assert!(c > a);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(TimeStamp::new(0, 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(TimeStamp::new(60, -1), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn deserialization_checks_the_rate() {
        let t: TimeStamp = serde_json::from_str(r#"{"ticks":90,"tps":60}"#).unwrap();
        assert_eq!(t, TimeStamp::new(60, 90).unwrap());
        assert!(serde_json::from_str::<TimeStamp>(r#"{"ticks":1,"tps":0}"#).is_err());
        assert!(serde_json::from_str::<TimeStamp>(r#"{"ticks":-1,"tps":60}"#).is_err());
    }

    #[test]
    fn displays_as_clock() {
        let t = TimeStamp::new(1000, 3_723_004).unwrap();
        assert_eq!(t.to_string(), "01:02:03:004");
    }
}
