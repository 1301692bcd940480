use chrono::Weekday;
use chrono_tz::Tz;
use tracing::warn;

/// Engine settings shared by every session a registry opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Wall clock on which cells, rules and naive timestamps are read.
    pub timezone: Tz,
    /// First column of the displayed week.
    pub week_start: Weekday,
    /// When a week's bookings arrive, drop selected cells of that week that
    /// are now booked or outside availability. Off by default: selections
    /// are trusted once made.
    pub revalidate_on_load: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            week_start: Weekday::Mon,
            revalidate_on_load: false,
        }
    }
}

impl EngineConfig {
    /// Read `SLOTGRID_TIMEZONE`, `SLOTGRID_WEEK_START` and
    /// `SLOTGRID_REVALIDATE_ON_LOAD`, falling back to defaults for anything
    /// missing or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let timezone = lookup("SLOTGRID_TIMEZONE")
            .and_then(|s| match s.parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(_) => {
                    warn!("SLOTGRID_TIMEZONE={s:?} is not a known zone, using {}", defaults.timezone);
                    None
                }
            })
            .unwrap_or(defaults.timezone);
        let week_start = lookup("SLOTGRID_WEEK_START")
            .and_then(|s| s.parse::<Weekday>().ok())
            .unwrap_or(defaults.week_start);
        let revalidate_on_load = lookup("SLOTGRID_REVALIDATE_ON_LOAD")
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(defaults.revalidate_on_load);

        Self {
            timezone,
            week_start,
            revalidate_on_load,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), EngineConfig::default());
    }

    #[test]
    fn reads_all_keys() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("SLOTGRID_TIMEZONE", "Europe/Zurich"),
            ("SLOTGRID_WEEK_START", "sunday"),
            ("SLOTGRID_REVALIDATE_ON_LOAD", "true"),
        ]));
        assert_eq!(cfg.timezone, Tz::Europe__Zurich);
        assert_eq!(cfg.week_start, Weekday::Sun);
        assert!(cfg.revalidate_on_load);
    }

    #[test]
    fn garbage_falls_back_per_key() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("SLOTGRID_TIMEZONE", "Mars/Olympus"),
            ("SLOTGRID_WEEK_START", "Tue"),
            ("SLOTGRID_REVALIDATE_ON_LOAD", "maybe"),
        ]));
        assert_eq!(cfg.timezone, Tz::UTC);
        assert_eq!(cfg.week_start, Weekday::Tue);
        assert!(!cfg.revalidate_on_load);
    }
}
