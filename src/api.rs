use std::time::Duration;

use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::{
    config::NetworkConfig,
    error::ApiError,
    model::{Experiment, Simulation, Status},
};

/// Shown when the backend is up but answers with garbage (usually an HTML
/// error page from a proxy in front of it).
pub const SERVICE_UNAVAILABLE: &str =
    "The local platform service is unavailable. Make sure it is running and try again.";

/// Error text produced by the backend when it could not serialize its own
/// error; it carries no information for the user.
const MALFORMED_MARKER: &str = "Unexpected token E in JSON at position 0";

/// The simulation table loads everything in one page.
const SIMULATIONS_PER_PAGE: &str = "9999";

/// Optional server-side filters for the simulation listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationQuery {
    pub experiment_id: Option<String>,
    pub status: Option<Status>,
    /// `(name, value)` pairs, all of which must match.
    pub tags: Vec<(String, String)>,
}

/// API client for the local platform REST service.
#[derive(Clone, Debug)]
pub struct LocalApiClient {
    client: reqwest::Client,
    base: Url,
}

impl LocalApiClient {
    /// Create a new API client with configurable timeouts.
    pub fn new(base_url: &str, network_config: &NetworkConfig) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|e| ApiError::Url(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Url(format!("{base_url} cannot be a base URL")));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    /// `<base>/api/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.base.to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    pub async fn fetch_experiments(&self) -> Result<Vec<Experiment>, ApiError> {
        let url = self.endpoint(&["experiments"])?;
        tracing::debug!("GET {}", url);
        let response = send(self.client.get(url), "Fetching experiments").await?;
        parse_json(response, "experiments").await
    }

    /// Delete an experiment and its simulations. With `delete_data` the
    /// backend also removes the experiment's data directory.
    pub async fn delete_experiment(&self, id: &str, delete_data: bool) -> Result<(), ApiError> {
        let mut url = self.endpoint(&["experiments", id])?;
        if delete_data {
            url.query_pairs_mut().append_pair("data", "true");
        }
        tracing::debug!("DELETE {}", url);
        send(self.client.delete(url), &format!("Deleting experiment {id}")).await?;
        Ok(())
    }

    pub async fn fetch_simulations(
        &self,
        query: &SimulationQuery,
    ) -> Result<Vec<Simulation>, ApiError> {
        let mut url = self.endpoint(&["simulations"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("per_page", SIMULATIONS_PER_PAGE);
            if let Some(experiment_id) = &query.experiment_id {
                pairs.append_pair("experiment_id", experiment_id);
            }
            if let Some(status) = query.status {
                pairs.append_pair("status", status.as_str());
            }
            for (name, value) in &query.tags {
                pairs.append_pair("tags", &format!("{name},{value}"));
            }
        }
        tracing::debug!("GET {}", url);
        let response = send(self.client.get(url), "Fetching simulations").await?;
        parse_json(response, "simulations").await
    }

    /// Ask the backend to cancel a simulation. The simulation only stops once
    /// the worker processes the request.
    pub async fn cancel_simulation(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["simulations", id])?;
        tracing::debug!("PUT {}", url);
        let request = self
            .client
            .put(url)
            .json(&json!({ "status": Status::Canceled.as_str() }));
        send(request, &format!("Canceling simulation {id}")).await?;
        Ok(())
    }
}

async fn send(request: reqwest::RequestBuilder, what: &str) -> Result<Response, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Network(format!("{what}: {e}")))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Failure bodies are read as text; they are often not JSON at all.
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(%status, %body, "{} failed", what);
    let message = parse_error_body(&body)
        .unwrap_or_else(|| format!("{what} failed with status {status}"));
    Err(ApiError::Status { status, message })
}

async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Network(format!("Reading {what}: {e}")))?;
    serde_json::from_str(&body).map_err(|e| ApiError::Malformed(format!("{what}: {e}")))
}

/// User-facing message extracted from an error response body.
///
/// Non-JSON bodies are used verbatim, a JSON `message` field is used unless it
/// is the known malformed-response marker, and a `messages` field is
/// stringified whole. Returns `None` for an empty body.
pub fn parse_error_body(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        return Some(body.to_string());
    };

    if let Some(message) = fields.get("message") {
        let text = match message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if text == MALFORMED_MARKER {
            return Some(SERVICE_UNAVAILABLE.to_string());
        }
        return Some(text);
    }
    if let Some(messages) = fields.get("messages") {
        return Some(messages.to_string());
    }
    Some(body.to_string())
}
