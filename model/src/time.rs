use anyhow::{Result, bail};

/// The display unit a trace may request for its timestamps.
///
/// Internal model time is always milliseconds; this only affects how a
/// frontend is expected to format values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDisplayUnit {
    Milliseconds,
    Nanoseconds,
}

impl TimeDisplayUnit {
    /// Parses the `displayTimeUnit` trace field. Unknown values are a hard
    /// failure, not a warning.
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "ms" => Ok(Self::Milliseconds),
            "ns" => Ok(Self::Nanoseconds),
            other => bail!("unsupported displayTimeUnit {other:?}"),
        }
    }
}

/// Wire timestamps are microseconds; the model stores milliseconds.
pub fn timestamp_from_us(us: f64) -> f64 {
    us / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_only_the_two_display_modes() {
        assert_eq!(
            TimeDisplayUnit::parse("ms").unwrap(),
            TimeDisplayUnit::Milliseconds
        );
        assert_eq!(
            TimeDisplayUnit::parse("ns").unwrap(),
            TimeDisplayUnit::Nanoseconds
        );
        assert!(TimeDisplayUnit::parse("s").is_err());
    }

    #[test]
    fn microseconds_scale_down_to_milliseconds() {
        assert_eq!(timestamp_from_us(10.0), 0.01);
    }
}
