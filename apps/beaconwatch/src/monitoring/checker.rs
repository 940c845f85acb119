//! Reachability probes for the cache and the public HTTP endpoints.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use url::Url;

use super::probe::Check;
use super::types::Verdict;
use crate::sources::CacheClient;

/// Probe pinging the cache
pub struct CacheCheck {
    cache: Arc<dyn CacheClient>,
    timeout: Duration,
}

impl CacheCheck {
    pub fn new(cache: Arc<dyn CacheClient>, timeout: Duration) -> Self {
        Self { cache, timeout }
    }
}

#[async_trait]
impl Check for CacheCheck {
    async fn check(&self) -> Verdict {
        match self.cache.ping(self.timeout).await {
            Ok(()) => Verdict::Ok,
            Err(e) => Verdict::error(e.to_string()),
        }
    }
}

/// Probe requiring a `200 OK` from one endpoint of the public API
pub struct EndpointCheck {
    client: reqwest::Client,
    method: Method,
    url: Url,
    body: Option<serde_json::Value>,
    /// Names the endpoint in diagnostics
    label: &'static str,
}

impl EndpointCheck {
    fn build(
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        label: &'static str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, method, url, body, label })
    }

    /// `GET /api/v1/epoch/latest`
    pub fn latest_epoch(site: &Url, timeout: Duration) -> Result<Self> {
        Self::build(Method::GET, site.join("/api/v1/epoch/latest")?, None, "api epoch / latest", timeout)
    }

    /// `POST /api/v1/app/dashboard` for a fixed set of validators
    pub fn dashboard(site: &Url, validators: &str, timeout: Duration) -> Result<Self> {
        Self::build(
            Method::POST,
            site.join("/api/v1/app/dashboard")?,
            Some(serde_json::json!({ "indicesOrPubkey": validators })),
            "api app",
            timeout,
        )
    }

    /// Verdict for a response status
    fn judge(&self, status: StatusCode) -> Verdict {
        if status == StatusCode::OK {
            Verdict::Ok
        } else {
            Verdict::error(format!(
                "error: {} endpoint returned a non 200 status: {}",
                self.label,
                status.as_u16()
            ))
        }
    }
}

#[async_trait]
impl Check for EndpointCheck {
    async fn check(&self) -> Verdict {
        let mut request = self.client.request(self.method.clone(), self.url.clone());
        if let Some(body) = &self.body {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) => self.judge(response.status()),
            Err(e) => Verdict::error(format!("error: {} request failed: {}", self.label, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use mockito::Matcher;

    struct FakeCache(Option<&'static str>);

    #[async_trait]
    impl CacheClient for FakeCache {
        async fn ping(&self, limit: Duration) -> Result<()> {
            assert_eq!(limit, Duration::from_secs(30));
            match self.0 {
                None => Ok(()),
                Some(message) => bail!("{message}"),
            }
        }
    }

    #[tokio::test]
    async fn test_cache_verdicts() {
        let healthy = CacheCheck::new(Arc::new(FakeCache(None)), Duration::from_secs(30));
        assert_eq!(healthy.check().await, Verdict::Ok);

        let broken = CacheCheck::new(
            Arc::new(FakeCache(Some("dial tcp 10.0.0.5:6379: connection refused"))),
            Duration::from_secs(30),
        );
        assert_eq!(broken.check().await, Verdict::error("dial tcp 10.0.0.5:6379: connection refused"));
    }

    #[tokio::test]
    async fn test_latest_epoch_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/epoch/latest")
            .with_status(200)
            .with_body(r#"{"status":"OK","data":{"epoch":1}}"#)
            .create_async()
            .await;

        let site = Url::parse(&server.url()).unwrap();
        let check = EndpointCheck::latest_epoch(&site, Duration::from_secs(10)).unwrap();
        assert_eq!(check.check().await, Verdict::Ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_latest_epoch_non_200() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/api/v1/epoch/latest").with_status(503).create_async().await;

        let site = Url::parse(&server.url()).unwrap();
        let check = EndpointCheck::latest_epoch(&site, Duration::from_secs(10)).unwrap();
        assert_eq!(
            check.check().await,
            Verdict::error("error: api epoch / latest endpoint returned a non 200 status: 503")
        );
    }

    #[tokio::test]
    async fn test_only_200_counts_as_healthy() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/api/v1/epoch/latest").with_status(204).create_async().await;

        let site = Url::parse(&server.url()).unwrap();
        let check = EndpointCheck::latest_epoch(&site, Duration::from_secs(10)).unwrap();
        assert!(!check.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_dashboard_posts_validators() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/app/dashboard")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({ "indicesOrPubkey": "1,2" })))
            .with_status(200)
            .create_async()
            .await;

        let site = Url::parse(&server.url()).unwrap();
        let check = EndpointCheck::dashboard(&site, "1,2", Duration::from_secs(10)).unwrap();
        assert_eq!(check.check().await, Verdict::Ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dashboard_non_200() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", "/api/v1/app/dashboard").with_status(500).create_async().await;

        let site = Url::parse(&server.url()).unwrap();
        let check = EndpointCheck::dashboard(&site, "1,2", Duration::from_secs(10)).unwrap();
        assert_eq!(
            check.check().await,
            Verdict::error("error: api app endpoint returned a non 200 status: 500")
        );
    }

    #[tokio::test]
    async fn test_unreachable_site_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let site = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        drop(listener);

        let check = EndpointCheck::latest_epoch(&site, Duration::from_secs(10)).unwrap();
        let verdict = check.check().await;
        assert!(verdict.status().starts_with("error: api epoch / latest request failed: "));
    }
}
