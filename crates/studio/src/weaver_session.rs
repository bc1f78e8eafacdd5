//! WordWeaver session: drives the [`WeaverStore`] against the backend and
//! keeps the inspection panels in step with it.

use tracing::{debug, info, warn};

use atelier::controls::ControlParameters;
use atelier::inspection::{EmbeddingViewer, InspectAction, Inspection};
use atelier::prng::Prng;
use atelier::tokens::TokenRecord;
use atelier::weaver::{EmptyContext, WeaverStore};
use atelier_client::{BackendClient, ClientError, InspectOptions};

/// How a generation step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The backend sampled the token.
    Generated,
    /// The backend failed and a local token was used instead.
    Fallback,
    /// A newer step or a reset made this one irrelevant.
    Superseded,
}

pub struct WeaverSession {
    store: WeaverStore,
    inspection: Inspection,
    embeddings: EmbeddingViewer,
    client: BackendClient,
    controls: ControlParameters,
    inspect: InspectOptions,
    rng: Prng,
}

impl WeaverSession {
    pub fn new(client: BackendClient, controls: ControlParameters, rng: Prng) -> Self {
        Self {
            store: WeaverStore::new(),
            inspection: Inspection::new(),
            embeddings: EmbeddingViewer::new(),
            client,
            controls,
            inspect: InspectOptions::default(),
            rng,
        }
    }

    pub fn with_inspect_options(mut self, inspect: InspectOptions) -> Self {
        self.inspect = inspect;
        self
    }

    pub fn set_context(&mut self, text: impl Into<String>) {
        self.store.set_context(text);
    }

    /// Load a preset and refresh the inspection panels for it.
    pub async fn choose_preset(&mut self, text: &str) {
        self.store.choose_preset(text);
        self.refresh_inspection().await;
    }

    /// Sample one token and append it to the output.
    ///
    /// A backend failure is not an error here: the step continues with a
    /// fallback token and the store carries the warning. Only an empty
    /// context is refused.
    pub async fn step(&mut self) -> Result<StepOutcome, EmptyContext> {
        let sampling = self.controls.sampling();
        let req = self.store.begin(sampling)?;
        debug!(request = %req.request, temperature = sampling.temperature, top_k = sampling.top_k, "next token");

        let outcome = match self.client.next_token(&req.context, req.sampling).await {
            Ok(next) => {
                info!(token = %next.token, "token generated");
                if self.store.apply_generated(req.request, next) {
                    StepOutcome::Generated
                } else {
                    StepOutcome::Superseded
                }
            }
            Err(e) => {
                warn!(error = %e, "generation failed, using fallback token");
                if self
                    .store
                    .apply_fallback(req.request, &mut self.rng, sampling.top_k)
                {
                    StepOutcome::Fallback
                } else {
                    StepOutcome::Superseded
                }
            }
        };

        self.refresh_inspection().await;
        Ok(outcome)
    }

    /// Run an internal forward pass if the output changed since the last one.
    pub async fn refresh_inspection(&mut self) {
        let trigger = self.store.refresh_trigger();
        let context = self.store.inspection_context().to_string();
        let Some(action) = self.inspection.observe(trigger, &context) else {
            return;
        };
        self.run_inspection(action).await;
    }

    async fn run_inspection(&mut self, action: InspectAction) {
        let (request, context) = match action {
            InspectAction::Cleared => {
                debug!("inspection cleared");
                return;
            }
            InspectAction::Fetch { request, context } => (request, context),
        };
        match self.client.internal_forward(&context, self.inspect).await {
            Ok(state) => {
                debug!(%request, tokens = state.tokens.len(), "internal state received");
                self.inspection.apply(request, state);
            }
            Err(e) => {
                warn!(%request, error = %e, "internal forward failed");
                self.inspection.fail(request, e.to_string());
            }
        }
    }

    /// Fetch embeddings of the last `num_tokens` tokens of `context` into the
    /// standalone embedding viewer.
    pub async fn embed(&mut self, context: &str, num_tokens: u32) -> Result<&[TokenRecord], ClientError> {
        let request = self.embeddings.begin();
        match self.client.embed(context, num_tokens).await {
            Ok(records) => {
                self.embeddings.apply(request, records);
                Ok(self.embeddings.records())
            }
            Err(e) => {
                self.embeddings.fail(request, e.to_string());
                Err(e)
            }
        }
    }

    /// Clear prompt, output and every panel.
    pub async fn reset(&mut self) {
        self.store.reset();
        self.embeddings.clear();
        self.refresh_inspection().await;
    }

    pub fn store(&self) -> &WeaverStore {
        &self.store
    }

    pub fn inspection(&self) -> &Inspection {
        &self.inspection
    }

    pub fn embeddings(&self) -> &EmbeddingViewer {
        &self.embeddings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier::weaver::FALLBACK_MESSAGE;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(server: &MockServer) -> WeaverSession {
        let client = BackendClient::builder()
            .base_url(server.uri())
            .build()
            .expect("client");
        WeaverSession::new(client, ControlParameters::default(), Prng::new(7))
    }

    fn forward_reply(tokens: &[(&str, u32)]) -> ResponseTemplate {
        let n = tokens.len();
        let attention: Vec<Vec<f32>> = (0..n)
            .map(|q| (0..n).map(|k| if k <= q { 1.0 / (q + 1) as f32 } else { 0.0 }).collect())
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "tokens_selected": tokens.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            "embeddings_selected": tokens
                .iter()
                .map(|(t, id)| json!({"token": t, "token_id": id, "embedding": [*id as f32, 1.0]}))
                .collect::<Vec<_>>(),
            "attention_matrix_selected": attention,
            "logits": [0.1, 2.5, -1.0]
        }))
    }

    #[tokio::test]
    async fn step_appends_the_token_and_inspects_the_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_partial_json(json!({"context": "Once upon a", "top_k": 8})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next_token": " time",
                "candidates": [" time", " hill"],
                "probs": [0.9, 0.1],
                "token_ids": [12522, 5304, 264, 892]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/internal_forward"))
            .and(body_partial_json(json!({"context": "Once upon a time"})))
            .respond_with(forward_reply(&[("Once", 12522), (" upon", 5304), (" a", 264), (" time", 892)]))
            .expect(1)
            .mount(&server)
            .await;

        let mut s = session(&server);
        s.set_context("Once upon a");
        assert_eq!(s.step().await, Ok(StepOutcome::Generated));

        assert_eq!(s.store().output(), "Once upon a time");
        assert_eq!(s.store().token_ids(), [12522, 5304, 264, 892]);
        assert_eq!(s.store().error(), None);
        assert_eq!(s.inspection().window().len(), 4);
        let state = s.inspection().latest().expect("state");
        assert_eq!(state.attention.size(), 4);
        assert_eq!(state.logits.len(), 3);
    }

    #[tokio::test]
    async fn backend_failure_falls_back_to_a_local_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/internal_forward"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut s = session(&server);
        s.set_context("The cat");
        assert_eq!(s.step().await, Ok(StepOutcome::Fallback));

        let out = s.store().output();
        assert!(out.starts_with("The cat "), "{out:?}");
        assert!(out.len() > "The cat ".len());
        assert_eq!(s.store().error(), Some(FALLBACK_MESSAGE));
        assert_eq!(s.store().candidates().len(), 8);
        assert!(s.inspection().error().is_some_and(|e| e.contains("503")));
        assert!(s.inspection().window().is_empty());
    }

    #[tokio::test]
    async fn empty_context_is_refused_without_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut s = session(&server);
        s.set_context("   ");
        assert_eq!(s.step().await, Err(EmptyContext));
        assert!(s.store().error().is_some());
        assert_eq!(s.store().output(), "");
    }

    #[tokio::test]
    async fn inspection_window_keeps_tokens_across_steps() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal_forward"))
            .and(body_partial_json(json!({"context": "red fox"})))
            .respond_with(forward_reply(&[("red", 1), (" fox", 2)]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/internal_forward"))
            .and(body_partial_json(json!({"context": "blue sky"})))
            .respond_with(forward_reply(&[("blue", 3), (" sky", 4)]))
            .mount(&server)
            .await;

        let mut s = session(&server);
        s.choose_preset("red fox").await;
        s.choose_preset("blue sky").await;
        let labels: Vec<String> = s.inspection().window().iter().map(|r| r.label()).collect();
        assert_eq!(labels, ["red (1)", " fox (2)", "blue (3)", " sky (4)"]);

        // Unchanged trigger: nothing new is fetched.
        s.refresh_inspection().await;
        assert_eq!(s.inspection().window().len(), 4);

        s.reset().await;
        assert!(s.inspection().window().is_empty());
        assert_eq!(s.store().output(), "");
    }

    #[tokio::test]
    async fn embed_fills_the_viewer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [
                    {"token": " misty", "token_id": 78878, "embedding": [0.1, 0.2, 0.3]},
                    {"token": " forest", "token_id": 13952, "embedding": [0.3, 0.2, 0.1]}
                ]
            })))
            .mount(&server)
            .await;

        let mut s = session(&server);
        let records = s.embed("A misty forest", 2).await.expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(s.embeddings().records()[1].id, 13952);
        assert_eq!(s.embeddings().error(), None);
    }
}
