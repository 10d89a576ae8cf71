//! Client side of the generation API.
//!
//! [`GenerationApi`] is the seam the controllers talk through. [`HttpApi`]
//! implements it over reqwest; requests can be observed and rewritten with
//! [`HttpApi::on_request`], which is how tests stub endpoints without a
//! server.

use crate::error::{Error, Result};
use crate::models::{GenerateResponse, GenerationRequest, ModelsResponse, StorageInfo};
use crate::PageConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

pub const MODELS_PATH: &str = "/api/models";
pub const GENERATE_PATH: &str = "/api/generate";
pub const STORAGE_INFO_PATH: &str = "/api/storage-info";
pub const GALLERY_PATH: &str = "/gallery";

/// Endpoints the page controllers depend on
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// `GET /api/models`
    async fn list_models(&self) -> Result<ModelsResponse>;

    /// `POST /api/generate`. Structured failures come back as `Ok` with
    /// `success == false`; only transport problems are `Err`.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerateResponse>;

    /// `GET /api/storage-info`
    async fn storage_info(&self) -> Result<StorageInfo>;
}

/// Information about an outgoing request
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Monotonic id, unique per client
    pub request_id: String,
    /// Absolute request url
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Request body, if any
    pub body: Option<Vec<u8>>,
    /// Headers
    pub headers: HashMap<String, String>,
}

/// What to do with a request observed by an `on_request` handler
#[derive(Debug, Clone)]
pub enum RequestAction {
    /// Let the request proceed normally
    Continue,

    /// Fail the request as if the network had
    Fail { error_reason: String },

    /// Answer the request without touching the network
    Fulfill {
        /// HTTP status code
        status: u16,
        /// Response headers
        headers: HashMap<String, String>,
        /// Response body bytes
        body: Vec<u8>,
    },
}

impl RequestAction {
    /// Fulfill with a JSON body and status 200
    pub fn json(value: &serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        RequestAction::Fulfill {
            status: 200,
            headers,
            body: value.to_string().into_bytes(),
        }
    }
}

type OnRequestHandler = Arc<dyn Fn(&RequestInfo) -> RequestAction + Send + Sync>;

/// A response as seen by the page: status and body bytes
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// reqwest-backed [`GenerationApi`]
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
    next_id: Arc<AtomicU64>,
    on_request: Arc<RwLock<Option<OnRequestHandler>>>,
}

impl HttpApi {
    pub fn new(config: &PageConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;

        let mut headers = HeaderMap::new();
        for (k, v) in &config.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| Error::ConfigError(format!("header name {}: {}", k, e)))?;
            let value = HeaderValue::from_str(v)
                .map_err(|e| Error::ConfigError(format!("header value for {}: {}", k, e)))?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers);
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder.build().map_err(|e| {
            Error::ConfigError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base,
            next_id: Arc::new(AtomicU64::new(1)),
            on_request: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve a path or url against the base url
    pub fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// Register a handler invoked before every request is sent
    pub fn on_request<F>(&self, cb: F)
    where
        F: Fn(&RequestInfo) -> RequestAction + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.on_request.write() {
            *slot = Some(Arc::new(cb));
        }
    }

    /// Remove a previously registered handler
    pub fn clear_on_request(&self) {
        if let Ok(mut slot) = self.on_request.write() {
            *slot = None;
        }
    }

    /// Send a request through the interception hook. HTTP error statuses are
    /// not errors here; the caller decides what a body means.
    pub async fn send(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<RawResponse> {
        let url = self.resolve(path)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let handler = self.on_request.read().ok().and_then(|h| h.clone());
        if let Some(handler) = handler {
            let mut headers = HashMap::new();
            if body.is_some() {
                headers.insert("Content-Type".to_string(), "application/json".to_string());
            }
            let info = RequestInfo {
                request_id: id.to_string(),
                url: url.to_string(),
                method: method.to_string(),
                body: body.clone(),
                headers,
            };
            match handler(&info) {
                RequestAction::Continue => {}
                RequestAction::Fail { error_reason } => {
                    log::debug!("request {} {} failed by handler: {}", method, url, error_reason);
                    return Err(Error::NetworkError(error_reason));
                }
                RequestAction::Fulfill { status, body, .. } => {
                    log::debug!("request {} {} fulfilled by handler ({})", method, url, status);
                    return Ok(RawResponse { status, body });
                }
            }
        }

        log::debug!("{} {}", method, url);
        let mut req = self.client.request(method, url);
        if let Some(b) = body {
            req = req
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(b);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        Ok(RawResponse {
            status,
            body: bytes.to_vec(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send(Method::GET, path, None).await?;
        decode(path, &resp)
    }

    /// Fetch a page's markup, e.g. the server-rendered gallery
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let resp = self.send(Method::GET, path, None).await?;
        if resp.status >= 400 {
            return Err(Error::NetworkError(format!("GET {} returned {}", path, resp.status)));
        }
        String::from_utf8(resp.body)
            .map_err(|e| Error::InvalidResponse(format!("{} is not UTF-8: {}", path, e)))
    }

    /// Fetch raw bytes, e.g. an image to save
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self.send(Method::GET, path, None).await?;
        if resp.status >= 400 {
            return Err(Error::NetworkError(format!("GET {} returned {}", path, resp.status)));
        }
        Ok(resp.body)
    }
}

fn decode<T: DeserializeOwned>(path: &str, resp: &RawResponse) -> Result<T> {
    serde_json::from_slice(&resp.body).map_err(|e| {
        Error::InvalidResponse(format!("{} ({}): {}", path, resp.status, e))
    })
}

#[async_trait]
impl GenerationApi for HttpApi {
    async fn list_models(&self) -> Result<ModelsResponse> {
        self.get_json(MODELS_PATH).await
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerateResponse> {
        let body = serde_json::to_vec(request)
            .map_err(|e| Error::Other(format!("Failed to encode request: {}", e)))?;
        let resp = self.send(Method::POST, GENERATE_PATH, Some(body)).await?;
        decode(GENERATE_PATH, &resp)
    }

    async fn storage_info(&self) -> Result<StorageInfo> {
        self.get_json(STORAGE_INFO_PATH).await
    }
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi").field("base", &self.base.as_str()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api() -> HttpApi {
        HttpApi::new(&PageConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn fulfilled_models_request_decodes() {
        let api = api();
        api.on_request(|req| {
            assert_eq!(req.method, "GET");
            assert!(req.url.ends_with("/api/models"));
            RequestAction::json(&json!({"data": [{"id": "img3", "tier": "free"}]}))
        });
        let models = api.list_models().await.unwrap();
        assert_eq!(models.data.len(), 1);
        assert_eq!(models.data[0].id, "img3");
    }

    #[tokio::test]
    async fn generate_posts_json_body() {
        let api = api();
        api.on_request(|req| {
            assert_eq!(req.method, "POST");
            let body: serde_json::Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
            assert_eq!(body["prompt"], "a red fox");
            assert_eq!(body["quality"], "standard");
            RequestAction::json(&json!({"success": true, "images": [], "message": "ok"}))
        });
        let resp = api
            .generate(&GenerationRequest::new("a red fox", "m1"))
            .await
            .unwrap();
        assert!(resp.success);
    }

    #[tokio::test]
    async fn error_status_with_json_body_is_structured() {
        let api = api();
        api.on_request(|_| RequestAction::Fulfill {
            status: 500,
            headers: HashMap::new(),
            body: br#"{"error":"Failed to generate image"}"#.to_vec(),
        });
        let resp = api
            .generate(&GenerationRequest::new("fox", "m1"))
            .await
            .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Failed to generate image"));
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_response() {
        let api = api();
        api.on_request(|_| RequestAction::Fulfill {
            status: 502,
            headers: HashMap::new(),
            body: b"<html>Bad Gateway</html>".to_vec(),
        });
        let err = api.list_models().await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn failed_request_is_network_error() {
        let api = api();
        api.on_request(|_| RequestAction::Fail {
            error_reason: "net::ERR_CONNECTION_REFUSED".into(),
        });
        let err = api.storage_info().await.unwrap_err();
        assert!(matches!(err, Error::NetworkError(_)));
    }

    #[test]
    fn resolve_relative_paths() {
        let api = api();
        assert_eq!(
            api.resolve("/media/1.png").unwrap().as_str(),
            "http://127.0.0.1:9/media/1.png"
        );
    }

    #[test]
    fn bad_base_url_is_config_error() {
        let err = HttpApi::new(&PageConfig {
            base_url: "not a url".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
