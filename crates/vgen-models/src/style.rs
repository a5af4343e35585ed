//! Target video style definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Visual style requested for a generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoStyle {
    /// Vertical short-form (default)
    #[default]
    Tiktok,
    Youtube,
    Instagram,
    Professional,
    Cinematic,
    Viral,
}

impl VideoStyle {
    pub const ALL: &'static [VideoStyle] = &[
        VideoStyle::Tiktok,
        VideoStyle::Youtube,
        VideoStyle::Instagram,
        VideoStyle::Professional,
        VideoStyle::Cinematic,
        VideoStyle::Viral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStyle::Tiktok => "tiktok",
            VideoStyle::Youtube => "youtube",
            VideoStyle::Instagram => "instagram",
            VideoStyle::Professional => "professional",
            VideoStyle::Cinematic => "cinematic",
            VideoStyle::Viral => "viral",
        }
    }

    /// Output frame size (width, height) requested from providers.
    ///
    /// Short vertical output is the product, so every style renders 9:16.
    pub fn dimensions(&self) -> (u32, u32) {
        (576, 1024)
    }
}

impl fmt::Display for VideoStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoStyle {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        VideoStyle::ALL
            .iter()
            .copied()
            .find(|style| style.as_str() == lower)
            .ok_or_else(|| ModelError::UnknownStyle(s.to_string()))
    }
}
