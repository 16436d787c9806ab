use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which pipeline produced a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Basic,
    Advanced,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Basic => "basic",
            GenerationMode::Advanced => "advanced",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(GenerationMode::Basic),
            "advanced" => Ok(GenerationMode::Advanced),
            other => Err(format!("invalid generation mode: {other}")),
        }
    }
}

/// One persisted record of a successful synthesis + conversion run.
/// Immutable after creation except for deletion. `file_url` resolves to an
/// existing file at creation time but may dangle once the owning session
/// is swept; that eventual inconsistency is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub id: String,
    pub text: String,
    pub mode: GenerationMode,
    pub voice: String,
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub format: String,
    pub file_name: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a new generation row.
#[derive(Debug, Clone)]
pub struct NewGeneration {
    pub text: String,
    pub mode: GenerationMode,
    pub voice: String,
    pub speed: f64,
    pub instructions: Option<String>,
    pub format: String,
    pub file_name: String,
    pub file_url: String,
}

/// A reusable prompt text with `{placeholder}` tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub category: String,
    pub content: String,
    pub variables: Vec<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub category: String,
    pub content: String,
    pub variables: Vec<String>,
    pub is_default: bool,
}
