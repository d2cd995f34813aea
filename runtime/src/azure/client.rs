//! Azure Resource Manager REST client.
//!
//! Thin reqwest wrapper that authenticates every request, tags it with a
//! client request ID, decodes ARM error envelopes and waits for long-running
//! operations to complete before returning.

use std::sync::Arc;
use std::time::{Duration, Instant};

use acr_sample_core::error::{Result, SampleError};
use acr_sample_core::PollingConfig;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::credential::{management_scope, TokenCredential};
use super::lro::{self, AsyncOperationDocument, ErrorDetail, OperationStatus, PollingStrategy};
use super::models::{Page, Subscription};
use super::resource_id::ResourceId;
use super::resources::SUBSCRIPTIONS_API_VERSION;

/// Header used to correlate requests with ARM server-side logs.
const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

/// A completed HTTP exchange with a success status.
struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Exchange {
    fn json(&self) -> Option<serde_json::Value> {
        if self.body.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&self.body).ok()
        }
    }
}

/// Client for the Azure Resource Manager REST API.
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    scope: String,
    credential: Arc<dyn TokenCredential>,
    polling: PollingConfig,
}

impl ArmClient {
    /// Create a client for `endpoint` (e.g., `https://management.azure.com`).
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        endpoint: &str,
        polling: PollingConfig,
    ) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            scope: management_scope(&endpoint),
            endpoint,
            credential,
            polling,
        }
    }

    /// Resource Manager base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the request URL for a resource path.
    pub fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    /// Read a resource.
    pub async fn get<R: DeserializeOwned>(&self, id: &ResourceId, api_version: &str) -> Result<R> {
        let url = self.url(&id.to_string(), api_version);
        let exchange = self.send(Method::GET, &url, None).await?;
        Ok(serde_json::from_str(&exchange.body)?)
    }

    /// Create or update a resource and wait for provisioning to finish.
    pub async fn create_or_update<B, R>(
        &self,
        id: &ResourceId,
        api_version: &str,
        body: &B,
    ) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(&id.to_string(), api_version);
        let payload = serde_json::to_value(body)?;
        let operation = format!("PUT {}", id.name());

        let exchange = self.send(Method::PUT, &url, Some(&payload)).await?;
        let initial = exchange.json();
        let strategy = lro::select_strategy(exchange.status, &exchange.headers, initial.as_ref());

        if strategy == PollingStrategy::Done {
            return Ok(serde_json::from_str(&exchange.body)?);
        }

        self.wait(&operation, strategy, &url, &exchange.headers).await?;
        let exchange = self.send(Method::GET, &url, None).await?;
        Ok(serde_json::from_str(&exchange.body)?)
    }

    /// Delete a resource and wait for the deletion to finish.
    pub async fn delete(&self, id: &ResourceId, api_version: &str) -> Result<()> {
        let url = self.url(&id.to_string(), api_version);
        let operation = format!("DELETE {}", id.name());

        let exchange = self.send(Method::DELETE, &url, None).await?;
        let strategy = lro::select_strategy(exchange.status, &exchange.headers, None);
        if strategy != PollingStrategy::Done {
            self.wait(&operation, strategy, &url, &exchange.headers).await?;
        }
        Ok(())
    }

    /// Invoke a resource action (e.g., `listCredentials`).
    pub async fn post<R: DeserializeOwned>(
        &self,
        id: &ResourceId,
        action: &str,
        api_version: &str,
    ) -> Result<R> {
        let url = self.url(&format!("{}/{}", id, action), api_version);
        let operation = format!("POST {}/{}", id.name(), action);

        let exchange = self.send(Method::POST, &url, None).await?;
        let strategy = lro::select_strategy(exchange.status, &exchange.headers, None);
        let body = match strategy {
            PollingStrategy::Done => exchange.body,
            other => self
                .wait(&operation, other, &url, &exchange.headers)
                .await?
                .unwrap_or_default(),
        };
        Ok(serde_json::from_str(&body)?)
    }

    /// List subscriptions visible to the credential, following `nextLink`.
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let mut next = Some(self.url("/subscriptions", SUBSCRIPTIONS_API_VERSION));
        let mut subscriptions = Vec::new();
        while let Some(url) = next {
            let exchange = self.send(Method::GET, &url, None).await?;
            let page: Page<Subscription> = serde_json::from_str(&exchange.body)?;
            subscriptions.extend(page.value);
            next = page.next_link;
        }
        Ok(subscriptions)
    }

    /// Poll until a long-running operation is terminal.
    ///
    /// Returns the final body when the Location strategy produced one.
    async fn wait(
        &self,
        operation: &str,
        strategy: PollingStrategy,
        resource_url: &str,
        initial_headers: &HeaderMap,
    ) -> Result<Option<String>> {
        let started = Instant::now();
        let mut delay = self.delay(initial_headers);

        tracing::debug!(operation, strategy = ?strategy, "Waiting for long-running operation");

        loop {
            self.check_deadline(operation, started)?;
            tokio::time::sleep(delay).await;

            match &strategy {
                PollingStrategy::AsyncOperation(url) => {
                    let exchange = self.send(Method::GET, url, None).await?;
                    let doc: AsyncOperationDocument = serde_json::from_str(&exchange.body)?;
                    let status = OperationStatus::parse(&doc.status);
                    match status {
                        OperationStatus::Succeeded => return Ok(None),
                        OperationStatus::Running(_) => delay = self.delay(&exchange.headers),
                        terminal => {
                            return Err(operation_failed(operation, &terminal, doc.error))
                        }
                    }
                }
                PollingStrategy::Location(url) => {
                    let exchange = self.send(Method::GET, url, None).await?;
                    if exchange.status != StatusCode::ACCEPTED {
                        return Ok(Some(exchange.body));
                    }
                    delay = self.delay(&exchange.headers);
                }
                PollingStrategy::ProvisioningState => {
                    let exchange = self.send(Method::GET, resource_url, None).await?;
                    let state = exchange
                        .json()
                        .as_ref()
                        .and_then(lro::provisioning_state)
                        .unwrap_or_else(|| "Succeeded".to_string());
                    match OperationStatus::parse(&state) {
                        OperationStatus::Succeeded => return Ok(None),
                        OperationStatus::Running(_) => delay = self.delay(&exchange.headers),
                        terminal => return Err(operation_failed(operation, &terminal, None)),
                    }
                }
                PollingStrategy::Done => return Ok(None),
            }

            tracing::trace!(operation, elapsed_secs = started.elapsed().as_secs(), "Operation still running");
        }
    }

    fn delay(&self, headers: &HeaderMap) -> Duration {
        lro::retry_after(headers).unwrap_or(Duration::from_secs(self.polling.interval_secs))
    }

    fn check_deadline(&self, operation: &str, started: Instant) -> Result<()> {
        if self.polling.timeout_secs > 0
            && started.elapsed() > Duration::from_secs(self.polling.timeout_secs)
        {
            return Err(SampleError::TimeoutError(format!(
                "{} did not complete within {}s",
                operation, self.polling.timeout_secs
            )));
        }
        Ok(())
    }

    /// Send an authenticated request; non-success statuses become `ArmError`.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Exchange> {
        let token = self.credential.token(&self.scope).await?;
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::trace!(method = %method, url, request_id = %request_id, "ARM request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .header(CLIENT_REQUEST_ID, &request_id);
        if let Some(body) = body {
            request = request.json(body);
        } else if method == Method::POST {
            request = request.header(reqwest::header::CONTENT_LENGTH, 0);
        }

        let response = request.send().await.map_err(|e| {
            SampleError::HttpError(format!("{} {} failed: {}", method, url, e))
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(|e| {
            SampleError::HttpError(format!("Failed to read {} {} response: {}", method, url, e))
        })?;

        if !status.is_success() {
            let detail = ErrorDetail::from_body(&text);
            tracing::debug!(
                method = %method,
                url,
                request_id = %request_id,
                status = status.as_u16(),
                code = %detail.code,
                "ARM request rejected"
            );
            return Err(SampleError::ArmError {
                status: status.as_u16(),
                code: detail.code,
                message: detail.message,
            });
        }

        Ok(Exchange {
            status,
            headers,
            body: text,
        })
    }
}

fn operation_failed(
    operation: &str,
    status: &OperationStatus,
    error: Option<ErrorDetail>,
) -> SampleError {
    let message = match error {
        Some(detail) if !detail.code.is_empty() => format!("{}: {}", detail.code, detail.message),
        Some(detail) => detail.message,
        None => "no error detail reported".to_string(),
    };
    SampleError::OperationFailed {
        operation: operation.to_string(),
        state: status.to_string(),
        message,
    }
}
