//! Difficulty presets for the computer opponent
//!
//! Strength is controlled by the engine's skill level (0-20). The presets
//! pick a level; an explicit level can always be used instead.
//!
//! | Difficulty | Skill level | Strength       |
//! |------------|-------------|----------------|
//! | Easy       | 2           | Beginner       |
//! | Medium     | 10          | Club player    |
//! | Hard       | 20          | Full strength  |

use crate::core::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use stockfish_bridge::SkillLevel;

/// AI difficulty levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BotDifficulty {
    /// Makes obvious mistakes; good for new players and testing
    Easy,
    /// Solid play with the occasional slip
    #[default]
    Medium,
    /// The engine at full strength
    Hard,
}

impl BotDifficulty {
    /// Engine skill level used for this preset
    pub fn skill(self) -> SkillLevel {
        match self {
            BotDifficulty::Easy => SkillLevel::new(2),
            BotDifficulty::Medium => SkillLevel::new(10),
            BotDifficulty::Hard => SkillLevel::MAX,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BotDifficulty::Easy => "Easy (skill 2)",
            BotDifficulty::Medium => "Medium (skill 10)",
            BotDifficulty::Hard => "Hard (skill 20)",
        }
    }
}

impl fmt::Display for BotDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl FromStr for BotDifficulty {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(BotDifficulty::Easy),
            "medium" => Ok(BotDifficulty::Medium),
            "hard" => Ok(BotDifficulty::Hard),
            _ => Err(CoreError::InvalidSetting {
                name: "difficulty",
                value: s.to_string(),
            }),
        }
    }
}
