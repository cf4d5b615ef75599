//! Dialect registry: the closed set of supported regional models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported Arabic dialect variants.
///
/// Each dialect maps to one fine-tuned checkpoint on the Hub and one local
/// artifact directory. The set is fixed at compile time; an identifier that
/// does not parse is a client error, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "egyptian")]
    Egyptian,
    #[serde(rename = "emirates")]
    Emirates,
    #[serde(rename = "ksa")]
    Ksa,
    #[serde(rename = "kuwaiti")]
    Kuwaiti,
}

impl Dialect {
    /// Stable wire identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Egyptian => "egyptian",
            Self::Emirates => "emirates",
            Self::Ksa => "ksa",
            Self::Kuwaiti => "kuwaiti",
        }
    }

    /// Get HuggingFace repository ID for the fine-tuned checkpoint.
    pub fn repo_id(&self) -> &'static str {
        match self {
            Self::Egyptian => "Genarabia-ai/Chatterbox_Egyptian",
            Self::Emirates => "Genarabia-ai/Chatterbox_Emirates",
            Self::Ksa => "Genarabia-ai/Chatterbox_KSA",
            Self::Kuwaiti => "Genarabia-ai/Chatterbox_Kuwaiti",
        }
    }

    /// Get human-readable label.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Egyptian => "Egyptian Arabic (مصري)",
            Self::Emirates => "Emirati Arabic (إماراتي)",
            Self::Ksa => "Saudi Arabic (سعودي)",
            Self::Kuwaiti => "Kuwaiti Arabic (كويتي)",
        }
    }

    /// Get local directory name under the models dir.
    pub fn dir_name(&self) -> &'static str {
        self.id()
    }

    /// Language tag passed to the multilingual synthesis runtime.
    pub fn language_id(&self) -> &'static str {
        "ar"
    }

    /// Get all registered dialects.
    pub fn all() -> &'static [Dialect] {
        &[Self::Egyptian, Self::Emirates, Self::Ksa, Self::Kuwaiti]
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone)]
pub struct ParseDialectError {
    input: String,
}

impl ParseDialectError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

impl fmt::Display for ParseDialectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.input.trim();
        if shown.is_empty() {
            write!(f, "Unknown dialect: <empty>")
        } else {
            write!(f, "Unknown dialect: {shown}")
        }
    }
}

impl std::error::Error for ParseDialectError {}

/// Parse a dialect identifier, accepting the wire id, the repo id or its
/// tail, the display label, and a few common aliases.
pub fn parse_dialect(input: &str) -> Result<Dialect, ParseDialectError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseDialectError::new(input));
    }

    let normalized = normalize_identifier(trimmed);

    if let Some(found) = Dialect::all()
        .iter()
        .copied()
        .find(|dialect| matches_dialect_alias(*dialect, &normalized))
    {
        return Ok(found);
    }

    resolve_by_heuristic(&normalized).ok_or_else(|| ParseDialectError::new(input))
}

fn matches_dialect_alias(dialect: Dialect, normalized: &str) -> bool {
    let repo = dialect.repo_id();
    let repo_tail = repo.rsplit('/').next().unwrap_or(repo);

    let aliases = [dialect.id(), repo, repo_tail, dialect.display_name()];

    aliases
        .iter()
        .any(|alias| normalize_identifier(alias) == normalized)
}

fn resolve_by_heuristic(normalized: &str) -> Option<Dialect> {
    if normalized.contains("egypt") {
        return Some(Dialect::Egyptian);
    }
    if normalized.contains("emirat") || normalized.contains("uae") {
        return Some(Dialect::Emirates);
    }
    if normalized.contains("saudi") || normalized.contains("ksa") {
        return Some(Dialect::Ksa);
    }
    if normalized.contains("kuwait") {
        return Some(Dialect::Kuwaiti);
    }
    None
}

fn normalize_identifier(input: &str) -> String {
    input
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}
