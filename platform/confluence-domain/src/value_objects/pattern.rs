use crate::value_objects::direction::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngulfingTag {
    #[default]
    None,
    BullishEngulf,
    BearishEngulf,
}

impl EngulfingTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngulfingTag::None => "none",
            EngulfingTag::BullishEngulf => "bullish_engulf",
            EngulfingTag::BearishEngulf => "bearish_engulf",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim() {
            "" | "none" | "na" => Ok(EngulfingTag::None),
            "bullish_engulf" => Ok(EngulfingTag::BullishEngulf),
            "bearish_engulf" => Ok(EngulfingTag::BearishEngulf),
            other => Err(format!("unsupported engulfing tag: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FvgTag {
    #[default]
    None,
    BullishFvg,
    BearishFvg,
}

impl FvgTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FvgTag::None => "none",
            FvgTag::BullishFvg => "bullish_fvg",
            FvgTag::BearishFvg => "bearish_fvg",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim() {
            "" | "none" | "na" => Ok(FvgTag::None),
            "bullish_fvg" => Ok(FvgTag::BullishFvg),
            "bearish_fvg" => Ok(FvgTag::BearishFvg),
            other => Err(format!("unsupported fvg tag: {other}")),
        }
    }
}

/// Per-bar classification produced by the pattern classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatternTag {
    pub breakout: Direction,
    pub engulfing: EngulfingTag,
    pub fvg: FvgTag,
    pub momentum: Direction,
}

/// The candlestick tags carried on an order next to its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecondaryTags {
    pub engulfing: EngulfingTag,
    pub fvg: FvgTag,
}

impl From<&PatternTag> for SecondaryTags {
    fn from(tag: &PatternTag) -> Self {
        Self {
            engulfing: tag.engulfing,
            fvg: tag.fvg,
        }
    }
}
