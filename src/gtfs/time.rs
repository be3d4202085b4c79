use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::Error;

pub const SECONDS_PER_DAY: u32 = 24 * 3600;

/// Seconds after midnight of the service day. Past-midnight service keeps
/// counting, so `25:10:00` is a valid time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GtfsTime(pub u32);

impl GtfsTime {
    /// Saturates at `u32::MAX` seconds; parsing goes through
    /// [`GtfsTime::checked_from_hms`] instead.
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        GtfsTime(
            hours
                .saturating_mul(3600)
                .saturating_add(minutes.saturating_mul(60))
                .saturating_add(seconds),
        )
    }

    pub fn checked_from_hms(hours: u32, minutes: u32, seconds: u32) -> Option<Self> {
        hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)
            .map(GtfsTime)
    }

    pub fn seconds(self) -> u32 {
        self.0
    }

    pub fn add_seconds(self, seconds: u32) -> Self {
        GtfsTime(self.0.saturating_add(seconds))
    }
}

/// Accepts `H:MM`, `HH:MM` and `HH:MM:SS`.
impl FromStr for GtfsTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mk_err = || Error::InvalidTime(s.to_owned());
        let s = s.trim();

        let mut parts = s.split(':');
        let hour = parts.next().ok_or_else(mk_err)?;
        let min = parts.next().ok_or_else(mk_err)?;
        let sec = parts.next().unwrap_or("00");
        if parts.next().is_some() || hour.is_empty() || min.len() != 2 || sec.len() != 2 {
            return Err(mk_err());
        }

        let hours: u32 = hour.parse().map_err(|_| mk_err())?;
        let minutes: u32 = min.parse().map_err(|_| mk_err())?;
        let seconds: u32 = sec.parse().map_err(|_| mk_err())?;
        if minutes > 59 || seconds > 59 {
            return Err(mk_err());
        }
        GtfsTime::checked_from_hms(hours, minutes, seconds).ok_or_else(mk_err)
    }
}

impl fmt::Display for GtfsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0 / 3600,
            self.0 % 3600 / 60,
            self.0 % 60
        )
    }
}

impl Serialize for GtfsTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GtfsTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!("06:05".parse::<GtfsTime>().unwrap(), GtfsTime(6 * 3600 + 5 * 60));
        assert_eq!("6:05".parse::<GtfsTime>().unwrap(), GtfsTime(6 * 3600 + 5 * 60));
        assert_eq!("25:10:30".parse::<GtfsTime>().unwrap(), GtfsTime::from_hms(25, 10, 30));
    }

    #[test]
    fn test_rejects_garbage() {
        for bad in ["", "6", "06:5", "06:60", "aa:bb", "06:00:00:00", ":30", "1193047:00"] {
            assert!(bad.parse::<GtfsTime>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_largest_time() {
        assert_eq!("1193046:28:15".parse::<GtfsTime>().unwrap(), GtfsTime(u32::MAX));
        assert_eq!(GtfsTime(u32::MAX).add_seconds(10), GtfsTime(u32::MAX));
        assert_eq!(GtfsTime::from_hms(u32::MAX, 0, 0), GtfsTime(u32::MAX));
    }

    #[test]
    fn test_display_past_midnight() {
        assert_eq!(GtfsTime::from_hms(24, 40, 0).to_string(), "24:40:00");
        assert_eq!(GtfsTime(59).to_string(), "00:00:59");
    }
}
