use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional classification shared by the breakout and momentum tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Neutral,
    Bullish,
    Bearish,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Neutral => "Neutral",
            Direction::Bullish => "Bullish",
            Direction::Bearish => "Bearish",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "neutral" => Ok(Direction::Neutral),
            "bullish" => Ok(Direction::Bullish),
            "bearish" => Ok(Direction::Bearish),
            _ => Err(format!("unsupported direction: {value}")),
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Direction::Neutral)
    }

    /// True only for a confirmed flip: both sides directional and different.
    pub fn opposes(&self, other: Direction) -> bool {
        self.is_directional() && other.is_directional() && *self != other
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Direction;

    #[test]
    fn opposes_ignores_neutral() {
        assert!(Direction::Bullish.opposes(Direction::Bearish));
        assert!(Direction::Bearish.opposes(Direction::Bullish));
        assert!(!Direction::Bullish.opposes(Direction::Neutral));
        assert!(!Direction::Neutral.opposes(Direction::Bearish));
        assert!(!Direction::Bullish.opposes(Direction::Bullish));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Direction::parse("BULLISH").unwrap(), Direction::Bullish);
        assert_eq!(Direction::parse(Direction::Bearish.as_str()).unwrap(), Direction::Bearish);
        assert!(Direction::parse("sideways").is_err());
    }
}
