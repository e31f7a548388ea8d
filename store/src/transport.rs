//! Executes the plain-data requests built by `rental-core`.
//!
//! The store only needs `Transport`; `UreqTransport` is the blocking HTTP
//! implementation used in production and in the end-to-end tests. Any
//! non-2xx status comes back as an ordinary `HttpResponse` so the core's
//! parsers decide what it means.
//!
//! Response bodies are read up to `MAX_BODY_BYTES`, well above ureq's
//! 10 MB default, so a whole table fits in one read. A larger body fails
//! with a transport `StoreError`.
//!
//! Query pairs are form-encoded (`+` becomes `%2B`, space becomes `+`),
//! which is how the backend's filters expect phone numbers and names.

use rental_core::{HttpMethod, HttpRequest, HttpResponse, StoreError};

/// Upper bound on a single response body.
pub const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// One HTTP round-trip. Shared across threads by `RentalStore::load_all`.
pub trait Transport: Send + Sync {
    /// Fails only when no response was received.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, StoreError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, StoreError> {
        (**self).execute(request)
    }
}

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a caller-built agent (proxy, timeouts, TLS). It must be built with
    /// `http_status_as_error(false)`.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Full URL with the form-encoded query appended.
pub fn request_url(path: &str, query: &[(String, String)]) -> Result<String, StoreError> {
    if query.is_empty() {
        return Ok(path.to_string());
    }
    let encoded = serde_urlencoded::to_string(query)
        .map_err(|e| StoreError::transport(format!("cannot encode query: {e}")))?;
    Ok(format!("{path}?{encoded}"))
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, req: HttpRequest) -> Result<HttpResponse, StoreError> {
        let url = request_url(&req.path, &req.query)?;
        let body = req.body.unwrap_or_default();
        let result = match req.method {
            HttpMethod::Get => with_headers(self.agent.get(&url), &req.headers).call(),
            HttpMethod::Post => with_headers(self.agent.post(&url), &req.headers).send(body.as_bytes()),
            HttpMethod::Patch => with_headers(self.agent.patch(&url), &req.headers).send(body.as_bytes()),
        };
        let mut response = result.map_err(|e| StoreError::transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(|e| StoreError::transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}
