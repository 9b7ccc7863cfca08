//! Remote translation over the public `translate_a/single` endpoint

use std::time::Duration;

use async_trait::async_trait;

use super::{Translate, TranslationRequest};
use crate::{Error, Result};

/// HTTP translator
#[derive(Debug, Clone)]
pub struct RemoteTranslator {
    client: reqwest::Client,
    url: String,
}

impl RemoteTranslator {
    /// Create a translator for `url` with a request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Translate for RemoteTranslator {
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<String> {
        tracing::debug!(
            source_lang = request.source,
            target_lang = request.target,
            chars = request.text.chars().count(),
            "requesting translation"
        );

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("client", "gtx"),
                ("sl", request.source),
                ("tl", request.target),
                ("dt", "t"),
                ("q", request.text),
            ])
            .send()
            .await
            .map_err(|e| Error::TranslationUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::TranslationUnavailable(format!(
                "translation service returned {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::TranslationUnavailable(format!("unreadable response: {e}")))?;

        extract_translation(&body)
            .ok_or_else(|| Error::TranslationUnavailable("unexpected response shape".to_string()))
    }
}

/// Concatenate the `data[0][i][0]` sentence segments
fn extract_translation(body: &serde_json::Value) -> Option<String> {
    let text: String = body
        .get(0)?
        .as_array()?
        .iter()
        .filter_map(|segment| segment.get(0)?.as_str())
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
