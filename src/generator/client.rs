//! HTTP client for the generator service.
//!
//! `POST /api/generate` takes `{model, prompt, system, stream}`. Buffered
//! replies are a single `{response}` or `{error}` object; streamed replies are
//! one JSON object per line, terminated by an object with `done: true`.
//! `GET /api/tags` lists models as `{models: [{name}]}`.
//!
//! Streamed bodies are read on a spawned task and handed to the caller's task
//! over a channel, so `on_chunk` always runs on the task that called
//! [`Generator::generate_streaming`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stream::{decode_line, Fragment, LineBuffer};
use super::{Generator, GeneratorError, GeneratorResponse};
use crate::config::GeneratorConfig;
use crate::context::ContextSnapshot;
use crate::prompt::PromptBuilder;

/// Default service address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Preferred model when none is configured.
pub const DEFAULT_MODEL: &str = "qwen2.5-coder:32b";

/// Upper bound for availability probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Fragments buffered between the reader task and the caller.
const FRAGMENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

/// Picks the model to use from the service's model list.
///
/// Prefers `preferred` when offered, then the first code-oriented model, then
/// the first model. Returns `None` for an empty list.
#[must_use]
pub fn choose_model(preferred: &str, models: &[String]) -> Option<String> {
    if models.iter().any(|m| m == preferred) {
        return Some(preferred.to_string());
    }
    models
        .iter()
        .find(|m| m.to_ascii_lowercase().contains("code"))
        .or_else(|| models.first())
        .cloned()
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Generator backed by an HTTP service.
#[derive(Debug)]
pub struct GeneratorClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    prompt: PromptBuilder,
    available: AtomicBool,
}

impl GeneratorClient {
    /// Creates a client for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GeneratorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(PROBE_TIMEOUT))
            .build()
            .map_err(|e| GeneratorError::Unavailable {
                message: format!("failed to initialise HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
            model: DEFAULT_MODEL.to_string(),
            timeout,
            prompt: PromptBuilder::default(),
            available: AtomicBool::new(false),
        })
    }

    /// Creates a client from configuration.
    ///
    /// When no model is configured, the service is asked for its models and
    /// one is picked with [`choose_model`]. If that fails the default model
    /// is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub async fn connect(
        config: &GeneratorConfig,
        prompt: PromptBuilder,
    ) -> Result<Self, GeneratorError> {
        let mut client = Self::new(&config.base_url, Duration::from_secs(config.timeout_s))?;
        client.prompt = prompt;

        match &config.model {
            Some(model) => client.set_model(model),
            None => {
                client.select_default_model().await;
            }
        }
        Ok(client)
    }

    /// Service base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Points the client at another service and forgets the cached probe.
    pub fn set_base_url(&mut self, url: &str) {
        self.base_url = normalize_base_url(url);
        self.available.store(false, Ordering::Release);
    }

    /// Switches to a model the service offers if the current one is missing.
    ///
    /// Returns the selected model, or `None` if the model list is unavailable
    /// or empty.
    pub async fn select_default_model(&mut self) -> Option<String> {
        let models = match self.list_models().await {
            Ok(models) => models,
            Err(e) => {
                debug!(error = %e, "Keeping default model");
                return None;
            }
        };
        let chosen = choose_model(&self.model, &models)?;
        if chosen != self.model {
            info!(from = %self.model, to = %chosen, "Preferred model not installed, switching");
            self.model.clone_from(&chosen);
        }
        Some(chosen)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, prompt: &str, context: &ContextSnapshot, stream: bool) -> reqwest::RequestBuilder {
        let system = self.prompt.build(context);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system: &system,
            stream,
        };
        self.http.post(self.url("/api/generate")).json(&body)
    }
}

/// Drains fragments on the caller's task until done or cancelled.
async fn receive(
    mut fragments: mpsc::Receiver<Result<Fragment, GeneratorError>>,
    on_chunk: &mut (dyn FnMut(&str) + Send),
    cancel: &CancellationToken,
) -> Result<GeneratorResponse, GeneratorError> {
    let mut text = String::new();
    let mut count = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(fragments = count, "Generation cancelled");
                return Ok(GeneratorResponse::cancelled(text));
            }
            next = fragments.recv() => next,
        };

        let fragment = match next {
            Some(fragment) => fragment?,
            None => {
                warn!(fragments = count, "Stream ended without a final object");
                break;
            }
        };

        if let Some(message) = fragment.error {
            return Err(GeneratorError::service(message));
        }
        if let Some(piece) = fragment.response.filter(|p| !p.is_empty()) {
            count += 1;
            on_chunk(&piece);
            text.push_str(&piece);
        }
        if fragment.done {
            break;
        }
    }

    debug!(fragments = count, chars = text.len(), "Generation complete");
    Ok(GeneratorResponse::complete(text))
}

/// Turns a non-success status into a service error.
async fn check_status(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<reqwest::Response, GeneratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .map_err(|e| GeneratorError::from_transport(&e, timeout))?;
    let message = serde_json::from_str::<ErrorReply>(&body)
        .map_or_else(|_| format!("HTTP {status}: {}", body.trim()), |reply| reply.error);
    Err(GeneratorError::service(message))
}

/// Reads a streamed body and forwards decoded fragments.
async fn read_stream(
    request: reqwest::RequestBuilder,
    timeout: Duration,
    tx: mpsc::Sender<Result<Fragment, GeneratorError>>,
) {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(Err(GeneratorError::from_transport(&e, timeout))).await;
            return;
        }
    };
    let response = match check_status(response, timeout).await {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            return;
        }
    };

    let mut body = response.bytes_stream();
    let mut lines = LineBuffer::new();
    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx.send(Err(GeneratorError::from_transport(&e, timeout))).await;
                return;
            }
        };
        for line in lines.push(&bytes) {
            if let Some(fragment) = decode_line(&line) {
                if tx.send(Ok(fragment)).await.is_err() {
                    return;
                }
            }
        }
    }
    if let Some(fragment) = lines.finish().as_deref().and_then(decode_line) {
        let _ = tx.send(Ok(fragment)).await;
    }
}

#[async_trait]
impl Generator for GeneratorClient {
    async fn is_available(&self) -> bool {
        if self.available.load(Ordering::Acquire) {
            return true;
        }

        let probe = self
            .http
            .get(self.url("/api/tags"))
            .timeout(self.timeout.min(PROBE_TIMEOUT))
            .send()
            .await;
        let available = match probe {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, url = %self.base_url, "Generator probe failed");
                false
            }
        };

        if available {
            self.available.store(true, Ordering::Release);
        }
        available
    }

    async fn list_models(&self) -> Result<Vec<String>, GeneratorError> {
        let response = self
            .http
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| GeneratorError::from_transport(&e, self.timeout))?;
        let response = check_status(response, self.timeout).await?;
        let body = response
            .text()
            .await
            .map_err(|e| GeneratorError::from_transport(&e, self.timeout))?;
        let tags: TagsReply =
            serde_json::from_str(&body).map_err(|e| GeneratorError::protocol(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, name: &str) {
        debug!(model = name, "Model selected");
        self.model = name.to_string();
    }

    async fn generate(
        &self,
        prompt: &str,
        context: &ContextSnapshot,
    ) -> Result<GeneratorResponse, GeneratorError> {
        info!(model = %self.model, stream = false, "Sending generation request");

        let response = self
            .request(prompt, context, false)
            .send()
            .await
            .map_err(|e| GeneratorError::from_transport(&e, self.timeout))?;
        let response = check_status(response, self.timeout).await?;
        let body = response
            .text()
            .await
            .map_err(|e| GeneratorError::from_transport(&e, self.timeout))?;

        let reply: GenerateReply =
            serde_json::from_str(&body).map_err(|e| GeneratorError::protocol(e.to_string()))?;
        if let Some(message) = reply.error {
            return Err(GeneratorError::service(message));
        }
        reply
            .response
            .map(GeneratorResponse::complete)
            .ok_or_else(|| GeneratorError::protocol("reply has no 'response' field"))
    }

    async fn generate_streaming(
        &self,
        prompt: &str,
        context: &ContextSnapshot,
        on_chunk: &mut (dyn for<'s> FnMut(&'s str) + Send),
        cancel: &CancellationToken,
    ) -> Result<GeneratorResponse, GeneratorError> {
        if cancel.is_cancelled() {
            return Ok(GeneratorResponse::cancelled(String::new()));
        }
        info!(model = %self.model, stream = true, "Sending generation request");

        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_stream(
            self.request(prompt, context, true),
            self.timeout,
            tx,
        ));

        let result = receive(rx, on_chunk, cancel).await;
        reader.abort();
        result
    }
}
