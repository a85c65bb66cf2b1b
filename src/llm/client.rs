use super::models::{rank_candidates, ModelCache};
use crate::config::Config;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, warn};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Image attached to a request, passed through to the model untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// One prompt for the generative model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    pub image: Option<EvidenceImage>,
}

/// Response from a model call along with the model that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub model: String,
    pub content: String,
}

/// Transport to the generative model.
///
/// Implementations own networking, authentication, timeouts and transport
/// retries. Everything here only sees text in and text out.
pub trait ModelClient: Send + Sync {
    /// Produce one completion for `request` using `model`.
    fn generate<'a>(
        &'a self,
        model: &'a str,
        request: &'a ModelRequest,
    ) -> BoxFuture<'a, anyhow::Result<String>>;

    /// Names of the models currently available to this client.
    fn list_models<'a>(&'a self) -> BoxFuture<'a, anyhow::Result<Vec<String>>>;
}

/// Call the model, discovering a working alternative if the first one fails.
///
/// The first model is the cached one, else `config.default_model`. When it
/// fails, a cached entry is dropped, available models are listed, and up to
/// `config.max_fallback_models` candidates are tried in ranked order. Any
/// model that answers becomes the cached preference.
pub async fn invoke_with_fallback<C>(
    client: &C,
    cache: &ModelCache,
    config: &Config,
    request: &ModelRequest,
) -> anyhow::Result<ModelReply>
where
    C: ModelClient + ?Sized,
{
    let cached = cache.get();
    let first = cached
        .clone()
        .unwrap_or_else(|| config.default_model.clone());

    let first_err = match client.generate(&first, request).await {
        Ok(content) => {
            if cached.as_deref() != Some(first.as_str()) {
                debug!(model = %first, "caching working model");
            }
            cache.set(first.clone());
            return Ok(ModelReply {
                model: first,
                content,
            });
        }
        Err(err) => err,
    };

    warn!(model = %first, error = %first_err, "model call failed; looking for an alternative");
    if cached.is_some() {
        cache.clear();
    }

    let listed = client.list_models().await.map_err(|list_err| {
        anyhow::anyhow!(
            "Model {} failed ({}) and listing available models also failed: {}",
            first,
            first_err,
            list_err
        )
    })?;

    let tried = vec![first];
    let mut candidates = Vec::new();
    // A stale cache entry should not hide the configured default.
    if cached.is_some() && !tried.contains(&config.default_model) {
        candidates.push(config.default_model.clone());
    }
    for model in rank_candidates(&listed, &config.fallback_models, &tried) {
        if !candidates.contains(&model) {
            candidates.push(model);
        }
    }

    try_candidates(client, cache, config, request, candidates, tried, first_err).await
}

async fn try_candidates<C>(
    client: &C,
    cache: &ModelCache,
    config: &Config,
    request: &ModelRequest,
    candidates: Vec<String>,
    mut tried: Vec<String>,
    mut last_err: anyhow::Error,
) -> anyhow::Result<ModelReply>
where
    C: ModelClient + ?Sized,
{
    for model in candidates.into_iter().take(config.max_fallback_models) {
        match client.generate(&model, request).await {
            Ok(content) => {
                info!(model = %model, "fallback model answered; caching it");
                cache.set(model.clone());
                return Ok(ModelReply { model, content });
            }
            Err(err) => {
                warn!(model = %model, error = %err, "fallback model failed");
                tried.push(model);
                last_err = err;
            }
        }
    }

    Err(anyhow::anyhow!(
        "No working model found (tried {}): {}",
        tried.join(", "),
        last_err
    ))
}
