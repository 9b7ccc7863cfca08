//! Language tags and the supported-language catalog

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A supported language with its display name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// Region-qualified tag (e.g. "en-US")
    pub code: &'static str,
    /// English display name
    pub name: &'static str,
}

/// Languages offered by the front end
pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language { code: "en-US", name: "English" },
    Language { code: "es-ES", name: "Spanish" },
    Language { code: "fr-FR", name: "French" },
    Language { code: "de-DE", name: "German" },
    Language { code: "it-IT", name: "Italian" },
    Language { code: "pt-PT", name: "Portuguese" },
    Language { code: "ru-RU", name: "Russian" },
    Language { code: "ja-JP", name: "Japanese" },
    Language { code: "ko-KR", name: "Korean" },
    Language { code: "zh-CN", name: "Chinese" },
    Language { code: "ar-SA", name: "Arabic" },
    Language { code: "hi-IN", name: "Hindi" },
];

/// Opaque, non-empty language identifier such as "en-US"
///
/// Tags outside [`SUPPORTED_LANGUAGES`] are accepted; the catalog only
/// drives display names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageTag(String);

impl LanguageTag {
    /// Parse a language tag, trimming surrounding whitespace
    ///
    /// # Errors
    ///
    /// Returns error if the tag is empty
    pub fn parse(tag: &str) -> Result<Self> {
        let trimmed = tag.trim();
        if trimmed.is_empty() || trimmed.starts_with(['-', '_']) {
            return Err(Error::InvalidLanguage(tag.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build a tag from a known-good literal
    pub(crate) fn from_static(tag: &'static str) -> Self {
        debug_assert!(!tag.is_empty());
        Self(tag.to_string())
    }

    /// Full tag as given
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Language-only code with any region qualifier stripped ("en-US" -> "en")
    #[must_use]
    pub fn base_code(&self) -> &str {
        self.0.split(['-', '_']).next().unwrap_or(&self.0)
    }

    /// Display name from the catalog, falling back to the raw tag
    #[must_use]
    pub fn display_name(&self) -> &str {
        SUPPORTED_LANGUAGES
            .iter()
            .find(|l| l.code.eq_ignore_ascii_case(&self.0))
            .map_or(self.0.as_str(), |l| l.name)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LanguageTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<LanguageTag> for String {
    fn from(tag: LanguageTag) -> Self {
        tag.0
    }
}

impl std::str::FromStr for LanguageTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
