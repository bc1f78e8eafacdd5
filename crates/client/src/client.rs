use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use atelier::generation::{CacheBust, GenerationRequest, GenerationResult, SamplingParams};
use atelier::inspection::InternalState;
use atelier::panels::frames::static_url;
use atelier::tokens::TokenRecord;
use atelier::weaver::NextToken;

use crate::error::{ClientError, Result};
use crate::types::*;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_GENERATE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_INSPECT_TIMEOUT: Duration = Duration::from_secs(150);

/// Knobs of one internal forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectOptions {
    pub num_tokens: u32,
    pub layer_index: i32,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            num_tokens: DEFAULT_INSPECT_TOKENS,
            layer_index: DEFAULT_LAYER_INDEX,
        }
    }
}

/// HTTP client for the generation backend. Cheap to clone.
///
/// No call is ever retried; each one carries its own bounded timeout.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http_client: Client,
    generate_timeout: Duration,
    inspect_timeout: Duration,
}

impl BackendClient {
    /// Create a client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> BackendClientBuilder {
        BackendClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn generate_timeout(&self) -> Duration {
        self.generate_timeout
    }

    pub fn inspect_timeout(&self) -> Duration {
        self.inspect_timeout
    }

    /// `GET /static/<frame>?t=<bust>` location of one frame.
    pub fn static_url(&self, frame: &str, bust: CacheBust) -> String {
        static_url(&self.base_url, frame, bust)
    }

    /// PixelPainter: `POST /generate {prompt}`.
    pub async fn generate_frames(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let body = PaintRequest {
            prompt: request.prompt().to_string(),
        };
        let resp: FramesResponse = self
            .post_json("/generate", &body, self.generate_timeout)
            .await?;
        debug!(frames = resp.frames.len(), "frames received");
        Ok(GenerationResult::new(resp.frames))
    }

    /// WordWeaver: `POST /generate {context, temperature, top_k}`.
    pub async fn next_token(&self, context: &str, sampling: SamplingParams) -> Result<NextToken> {
        let body = NextTokenBody {
            context: context.to_string(),
            temperature: sampling.temperature,
            top_k: sampling.top_k,
        };
        let resp: NextTokenResponse = self
            .post_json("/generate", &body, self.generate_timeout)
            .await?;
        Ok(resp.into())
    }

    /// `POST /embed`: embeddings of the last `num_tokens` tokens of `context`.
    pub async fn embed(&self, context: &str, num_tokens: u32) -> Result<Vec<TokenRecord>> {
        let body = EmbedBody {
            context: context.to_string(),
            num_tokens,
        };
        let resp: EmbedResponse = self
            .post_json("/embed", &body, self.generate_timeout)
            .await?;
        Ok(resp.embeddings.into_iter().map(Into::into).collect())
    }

    /// `POST /internal_forward`: tokens, embeddings, attention and logits.
    pub async fn internal_forward(
        &self,
        context: &str,
        options: InspectOptions,
    ) -> Result<InternalState> {
        let body = InternalForwardBody {
            context: context.to_string(),
            num_tokens: options.num_tokens,
            layer_index: options.layer_index,
        };
        let resp: InternalForwardResponse = self
            .post_json("/internal_forward", &body, self.inspect_timeout)
            .await?;
        Ok(resp.into())
    }

    async fn post_json<B, R>(&self, path: &str, body: &B, timeout: Duration) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");

        let response = self
            .http_client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "request failed");
                ClientError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%url, %status, "backend rejected request");
            let detail = text.trim();
            return Err(ClientError::Backend(if detail.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {detail}")
            }));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

pub struct BackendClientBuilder {
    base_url: Option<String>,
    generate_timeout: Option<Duration>,
    inspect_timeout: Option<Duration>,
}

impl BackendClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            generate_timeout: None,
            inspect_timeout: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Timeout of `/generate` and `/embed`.
    pub fn generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = Some(timeout);
        self
    }

    /// Timeout of `/internal_forward`.
    pub fn inspect_timeout(mut self, timeout: Duration) -> Self {
        self.inspect_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<BackendClient> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let generate_timeout = self.generate_timeout.unwrap_or(DEFAULT_GENERATE_TIMEOUT);
        let inspect_timeout = self.inspect_timeout.unwrap_or(DEFAULT_INSPECT_TIMEOUT);

        let http_client = Client::builder()
            .build()
            .map_err(|e| ClientError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(BackendClient {
            base_url,
            http_client,
            generate_timeout,
            inspect_timeout,
        })
    }
}

impl Default for BackendClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let c = BackendClient::new().expect("client");
        assert_eq!(c.base_url(), DEFAULT_BASE_URL);
        assert_eq!(c.generate_timeout(), Duration::from_secs(120));
        assert_eq!(c.inspect_timeout(), Duration::from_secs(150));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let c = BackendClient::builder()
            .base_url("http://example.test:9000/")
            .build()
            .expect("client");
        assert_eq!(
            c.static_url("f.png", CacheBust(3)),
            "http://example.test:9000/static/f.png?t=3"
        );
    }

    #[test]
    fn inspect_defaults() {
        let o = InspectOptions::default();
        assert_eq!((o.num_tokens, o.layer_index), (9999, -1));
    }
}
