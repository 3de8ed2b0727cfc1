//! Timestamped-lyrics client for the music generation provider.
//!
//! Once a generation task has finished, the provider can return per-word
//! timings for one of its audio tracks. Polling the task itself is handled
//! elsewhere; this client only asks for the timings.

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::ProviderConfig;
use crate::lyrics::AlignedWord;

/// Response envelope shared by the provider's endpoints
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ProviderClient {
    const TIMESTAMPED_LYRICS_PATH: &'static str = "/generate/get-timestamped-lyrics";
    const USER_AGENT: &'static str = concat!("lyricsync/", env!("CARGO_PKG_VERSION"));

    pub fn new(cfg: &ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }

    /// Word timings for one generated track.
    pub async fn fetch_aligned_words(
        &self,
        task_id: &str,
        audio_id: &str,
    ) -> anyhow::Result<Vec<AlignedWord>> {
        let url = format!("{}{}", self.base_url, Self::TIMESTAMPED_LYRICS_PATH);
        let mut request = self
            .client
            .post(&url)
            .json(&json!({ "taskId": task_id, "audioId": audio_id }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::info!(task_id, audio_id, "requesting timestamped lyrics");
        let response = request.send().await.context("send timestamped lyrics request")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("provider error: {status}");
        }

        let body: Value = response.json().await.context("decode provider response")?;
        let words = words_from_response(body)?;
        tracing::info!(count = words.len(), "received aligned words");
        Ok(words)
    }
}

/// Check the envelope and validate its word list.
fn words_from_response(body: Value) -> anyhow::Result<Vec<AlignedWord>> {
    let envelope: Envelope =
        serde_json::from_value(body).context("unexpected provider response shape")?;
    if envelope.code != 200 {
        anyhow::bail!("provider rejected request ({}): {}", envelope.code, envelope.msg);
    }
    Ok(super::parse_aligned_words(&envelope.data))
}
