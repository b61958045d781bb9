//! Remote API Client
//!
//! Thin GET/POST wrapper around reqwest for the collection API. Every non-2xx
//! response is turned into a `FetchError::Status`; there is no retry policy.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use super::errors::FetchError;

/// Default collection API location
pub const DEFAULT_BASE_URL: &str = "https://efm-student-case-proxy-api.vercel.app/";

/// HTTP client timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a JSON API rooted at `base_url`
#[derive(Clone)]
pub struct ApiClient {
    /// HTTP client for making requests (shared connection pool)
    http_client: Client,
    /// Base URL that relative endpoints are joined onto
    base_url: String,
}

impl ApiClient {
    /// Build a client with its own connection pool and per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self::with_client(http_client, base_url))
    }

    /// Reuse an existing reqwest client (and its pool) for another base URL
    pub fn with_client(http_client: Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the underlying HTTP client
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Resolve an endpoint against the base URL.
    ///
    /// Absolute `http(s)://` URLs are used untouched, so image URLs coming out
    /// of the collection data can go through the same client.
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// GET an endpoint and parse the body as JSON
    pub async fn get(&self, endpoint: &str) -> Result<Value, FetchError> {
        self.get_json(endpoint).await
    }

    /// GET an endpoint and deserialize the body into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, FetchError> {
        let url = self.url(endpoint);
        debug!(url = %url, "Fetching");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|source| {
                error!(endpoint = endpoint, error = %source, "API fetch failed");
                FetchError::Network {
                    url: url.clone(),
                    source,
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            error!(endpoint = endpoint, status = status, "API fetch failed");
            return Err(FetchError::from_status(status, &url));
        }

        response
            .json()
            .await
            .map_err(|source| FetchError::Decode { url, source })
    }

    /// POST a JSON body to an endpoint and parse the JSON answer
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Value, FetchError> {
        let url = self.url(endpoint);
        debug!(url = %url, "Posting");

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| {
                error!(endpoint = endpoint, error = %source, "API POST failed");
                FetchError::Network {
                    url: url.clone(),
                    source,
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            error!(endpoint = endpoint, status = status, "API POST failed");
            return Err(FetchError::from_status(status, &url));
        }

        response
            .json()
            .await
            .map_err(|source| FetchError::Decode { url, source })
    }

    /// Download raw bytes (image content)
    pub async fn get_bytes(&self, endpoint: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url(endpoint);
        debug!(url = %url, "Downloading");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status().as_u16(), &url));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;

        debug!(url = %url, size = bytes.len(), "Downloaded");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = client("https://api.example/");
        assert_eq!(api.url("/overview"), "https://api.example/overview");
        assert_eq!(api.url("detail/7"), "https://api.example/detail/7");

        let api = client("https://api.example");
        assert_eq!(api.url("overview"), "https://api.example/overview");
        assert_eq!(
            api.url("https://img.example/a.jpg"),
            "https://img.example/a.jpg"
        );
    }

    #[tokio::test]
    async fn test_get_parses_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/overview"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "1"}])))
            .mount(&server)
            .await;

        let value = client(&server.uri()).get("/overview").await.unwrap();
        assert_eq!(value, json!([{"id": "1"}]));
    }

    #[tokio::test]
    async fn test_non_success_status_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/detail/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .get("detail/missing")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/overview"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).get("overview").await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items/messages"))
            .and(body_json(json!({"text": "hoi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 3}})))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server.uri())
            .post("items/messages", &json!({"text": "hoi"}))
            .await
            .unwrap();
        assert_eq!(value["data"]["id"], 3);
    }

    #[tokio::test]
    async fn test_get_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let bytes = client("https://unused.example")
            .get_bytes(&format!("{}/img.bin", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_network_failure_is_network_error() {
        let api = client("http://127.0.0.1:9");
        let err = api.get("overview").await.unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
    }
}
