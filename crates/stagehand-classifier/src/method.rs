use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a job gets converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionMethod {
    /// Full syntax-tree translation.
    AstParser,
    /// Template substitution for recognized patterns.
    PatternMatch,
    /// Needs a human; the job enters the manual review queue.
    AttentionRequired,
}

impl ConversionMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AstParser => "ast_parser",
            Self::PatternMatch => "pattern_match",
            Self::AttentionRequired => "attention_required",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AstParser => "AST Parser",
            Self::PatternMatch => "Pattern Match",
            Self::AttentionRequired => "Attention Required",
        }
    }

    #[must_use]
    pub const fn needs_review(&self) -> bool {
        matches!(self, Self::AttentionRequired)
    }
}

impl fmt::Display for ConversionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structural complexity of the mapping pattern a job implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternComplexity {
    #[default]
    Low,
    Medium,
    High,
}

impl FromStr for PatternComplexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!(
                "Unknown pattern complexity '{other}'. Valid values: low, medium, high"
            )),
        }
    }
}

/// Analysis metadata describing one job, as reported by the conversion engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobProfile {
    /// Recognized mapping pattern, e.g. "SCD Type 2" or "Lookup + Filter".
    pub pattern: String,
    #[serde(default)]
    pub pattern_complexity: PatternComplexity,
    /// Embedded hand-written code (Java transformations, stored procedures).
    #[serde(default)]
    pub custom_code: bool,
    /// Constructs the converter has no translation for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsupported_constructs: Vec<String>,
}

impl JobProfile {
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    /// Why a job with this profile needs manual review, if it does.
    #[must_use]
    pub fn review_reason(&self) -> Option<String> {
        match (self.custom_code, self.unsupported_constructs.is_empty()) {
            (false, true) => None,
            (true, true) => Some("Contains custom code".to_string()),
            (false, false) => Some(format!(
                "Unsupported constructs: {}",
                self.unsupported_constructs.join(", ")
            )),
            (true, false) => Some(format!(
                "Contains custom code; unsupported constructs: {}",
                self.unsupported_constructs.join(", ")
            )),
        }
    }
}

/// Pick the conversion method for a job.
///
/// Custom code or any unsupported construct needs a human. Otherwise
/// high-complexity patterns use pattern matching and everything else goes
/// through the AST parser.
#[must_use]
pub fn assign_method(profile: &JobProfile) -> ConversionMethod {
    if profile.custom_code || !profile.unsupported_constructs.is_empty() {
        ConversionMethod::AttentionRequired
    } else if profile.pattern_complexity == PatternComplexity::High {
        ConversionMethod::PatternMatch
    } else {
        ConversionMethod::AstParser
    }
}
