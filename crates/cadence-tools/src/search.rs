use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use cadence_core::config::SearchConfig;
use cadence_core::error::{CadenceError, Result};
use cadence_core::traits::SearchClient;

const PERPLEXITY_API_URL: &str = "https://api.perplexity.ai/chat/completions";
const TAVILY_API_URL: &str = "https://api.tavily.com/search";

const RESEARCH_SYSTEM_PROMPT: &str = "You are a helpful research assistant. Provide accurate, \
up-to-date information based on web search results. Be concise and include relevant details \
like dates or sources when available.";

/// Build the configured search backend.
///
/// Fails with a config error when the provider is unknown or has no key,
/// so a misconfigured search port is caught before any run starts.
pub fn create_search(config: &SearchConfig) -> Result<Arc<dyn SearchClient>> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            CadenceError::Config(format!("search provider '{}' has no api_key", config.provider))
        })?;

    match config.provider.as_str() {
        "perplexity" => Ok(Arc::new(PerplexitySearch {
            api_key,
            model: config.model.clone(),
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| PERPLEXITY_API_URL.to_string()),
            http: reqwest::Client::new(),
        })),
        "tavily" => Ok(Arc::new(TavilySearch {
            api_key,
            max_results: config.max_results,
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| TAVILY_API_URL.to_string()),
            http: reqwest::Client::new(),
        })),
        other => Err(CadenceError::Config(format!(
            "unknown search provider '{}'",
            other
        ))),
    }
}

/// The search backend as the graph's nodes see it: one query, one summary,
/// bounded by a timeout.
#[derive(Clone)]
pub struct SearchPort {
    client: Arc<dyn SearchClient>,
    timeout: Duration,
}

impl SearchPort {
    pub fn new(client: Arc<dyn SearchClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn provider(&self) -> &str {
        self.client.name()
    }

    pub async fn search(&self, query: &str) -> Result<String> {
        let start = Instant::now();
        let summary = tokio::time::timeout(self.timeout, self.client.search(query))
            .await
            .map_err(|_| CadenceError::timeout("search", self.timeout.as_secs()))??;
        debug!(
            provider = %self.client.name(),
            chars = summary.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for SearchPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPort")
            .field("provider", &self.client.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Perplexity `sonar` chat completions used as a search-and-summarise call.
pub struct PerplexitySearch {
    api_key: String,
    model: String,
    url: String,
    http: reqwest::Client,
}

impl SearchClient for PerplexitySearch {
    fn name(&self) -> &str {
        "perplexity"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<String>> {
        let query = query.to_string();
        Box::pin(async move {
            let body = json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": RESEARCH_SYSTEM_PROMPT },
                    { "role": "user", "content": query },
                ],
                "max_tokens": 300,
                "temperature": 0.1,
                "stream": false,
            });

            let resp = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| transport_error(self.name(), e))?;

            let body = read_json(self.name(), resp).await?;
            let content = body["choices"][0]["message"]["content"]
                .as_str()
                .ok_or_else(|| {
                    CadenceError::upstream(self.name(), "response had no choices[0].message.content")
                })?;
            Ok(content.to_string())
        })
    }
}

/// Tavily search API; snippets joined into one summary.
pub struct TavilySearch {
    api_key: String,
    max_results: u32,
    url: String,
    http: reqwest::Client,
}

impl SearchClient for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<String>> {
        let query = query.to_string();
        Box::pin(async move {
            let resp = self
                .http
                .post(&self.url)
                .json(&json!({
                    "api_key": self.api_key,
                    "query": query,
                    "max_results": self.max_results,
                }))
                .send()
                .await
                .map_err(|e| transport_error(self.name(), e))?;

            let body = read_json(self.name(), resp).await?;
            Ok(format_tavily_results(&body))
        })
    }
}

fn format_tavily_results(body: &serde_json::Value) -> String {
    body["results"]
        .as_array()
        .filter(|arr| !arr.is_empty())
        .map(|arr| {
            arr.iter()
                .map(|r| {
                    format!(
                        "**{}**\n{}\nURL: {}",
                        r["title"].as_str().unwrap_or(""),
                        r["content"].as_str().unwrap_or(""),
                        r["url"].as_str().unwrap_or("")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n---\n\n")
        })
        .unwrap_or_else(|| "No results found.".into())
}

fn transport_error(port: &str, e: reqwest::Error) -> CadenceError {
    CadenceError::upstream(port, format!("request failed: {}", e))
}

async fn read_json(port: &str, resp: reqwest::Response) -> Result<serde_json::Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_else(|_| "unknown".to_string());
        return Err(status_error(port, status, &body));
    }
    resp.json()
        .await
        .map_err(|e| CadenceError::upstream(port, e.to_string()))
}

fn status_error(port: &str, status: StatusCode, body: &str) -> CadenceError {
    let message = format!("HTTP {}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CadenceError::Auth {
            port: port.to_string(),
            message,
        },
        _ => CadenceError::upstream(port, message),
    }
}
