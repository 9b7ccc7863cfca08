//! Translation with a resilient fallback path
//!
//! Resolution is two-tier: the primary [`Translate`] backend returns a typed
//! failure, the [`fallback`] table is consulted only on that failure, and a
//! sentinel guarantees every call ends in a [`TranslationOutcome`].

pub mod fallback;
mod remote;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::language::LanguageTag;

pub use fallback::{FALLBACK_SENTINEL, lookup as fallback_lookup};
pub use remote::RemoteTranslator;

/// Translation request passed to a backend
#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    /// Text to translate
    pub text: &'a str,
    /// Source base code (e.g. "en")
    pub source: &'a str,
    /// Target base code (e.g. "es")
    pub target: &'a str,
}

/// Primary translation backend
#[async_trait]
pub trait Translate: Send + Sync {
    /// Translate text
    ///
    /// # Errors
    ///
    /// Returns `TranslationUnavailable` (or a transport error) on any failure
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<String>;
}

/// Result of resolving a translation; always present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    /// Display text
    pub text: String,
    /// Whether the primary backend failed and the fallback tier answered
    pub was_fallback: bool,
}

/// Total translation function over a primary backend
#[derive(Clone)]
pub struct TranslationResolver {
    primary: Arc<dyn Translate>,
}

impl TranslationResolver {
    /// Wrap a primary backend
    #[must_use]
    pub fn new(primary: Arc<dyn Translate>) -> Self {
        Self { primary }
    }

    /// Resolve `text` from `source` to `target`; never fails
    pub async fn resolve(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
    ) -> TranslationOutcome {
        let request = TranslationRequest {
            text,
            source: source.base_code(),
            target: target.base_code(),
        };

        match self.primary.translate(request).await {
            Ok(translated) => {
                tracing::debug!(
                    source_lang = request.source,
                    target_lang = request.target,
                    "translation resolved"
                );
                TranslationOutcome {
                    text: translated,
                    was_fallback: false,
                }
            }
            Err(e) => {
                let text = fallback::lookup(request.source, request.target)
                    .unwrap_or(FALLBACK_SENTINEL)
                    .to_string();
                tracing::warn!(
                    error = %e,
                    source_lang = request.source,
                    target_lang = request.target,
                    fallback = %text,
                    "translation failed, using fallback"
                );
                TranslationOutcome {
                    text,
                    was_fallback: true,
                }
            }
        }
    }
}

impl fmt::Debug for TranslationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationResolver").finish_non_exhaustive()
    }
}
