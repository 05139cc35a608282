use chrono::{DateTime, Utc};

/// Source of "now" for timestamps, either the system clock or a fixed instant.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    /// Real time.
    #[default]
    System,
    /// Always returns the given instant.
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_is_stable() {
        let start = Utc.with_ymd_and_hms(2025, 4, 1, 9, 30, 0).unwrap();
        let clock = Clock::fixed(start);
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_system_clock_tracks_now() {
        let before = Utc::now();
        let now = Clock::default().now();
        assert!(now >= before);
    }
}
