use crate::dhis2::analytics::{self, AnalyticsRequest};
use crate::dhis2::cache::ResponseCache;
use crate::dhis2::metadata::{self, PAGE_SIZE};
use crate::dhis2::RemoteDataClient;
use crate::entities::EntityKind;
use crate::model::{BatchLimits, ClientConfig, ExtractionRequest};
use crate::table::Record;
use anyhow::{Context, Result};
use reqwest::Url;

/// HTTP client for a DHIS2 instance's web API.
#[derive(Debug, Clone)]
pub struct Dhis2Client {
    http: reqwest::Client,
    api_url: Url,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    cache: Option<ResponseCache>,
}

impl Dhis2Client {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let base_url = cfg.base_url.trim_end_matches('/').to_string();
        let api_url = Url::parse(&format!("{base_url}/api/"))
            .with_context(|| format!("invalid DHIS2 url {}", cfg.base_url))?;

        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout)
            .build()
            .context("build HTTP client")?;

        let cache = cfg
            .cache_dir
            .as_ref()
            .map(|dir| {
                ResponseCache::new(dir, cfg.cache_max_age, cfg.username.as_deref())
            })
            .transpose()?;

        Ok(Self {
            http,
            api_url,
            base_url,
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            cache,
        })
    }

    /// Full URL for an API endpoint with query parameters.
    pub fn endpoint_url(&self, endpoint: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self
            .api_url
            .join(endpoint)
            .with_context(|| format!("invalid endpoint {endpoint}"))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// GET an endpoint and decode its JSON body, going through the cache when enabled.
    pub async fn get_json(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<serde_json::Value> {
        let url = self.endpoint_url(endpoint, query)?;

        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(url.as_str()) {
                match serde_json::from_str(&body) {
                    Ok(v) => {
                        tracing::debug!("Cache hit for {url}");
                        return Ok(v);
                    }
                    Err(_) => tracing::debug!("Ignoring corrupt cache entry for {url}"),
                }
            }
        }

        let mut req = self.http.get(url.clone());
        if let Some(user) = &self.username {
            req = req.basic_auth(user, self.password.as_deref());
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("request {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("DHIS2 returned {status} for {url}: {}", truncate(&body, 300));
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("read response body from {url}"))?;
        let value = serde_json::from_str(&body)
            .with_context(|| format!("decode JSON response from {url}"))?;

        if let Some(cache) = &self.cache {
            cache.put(url.as_str(), &body);
        }
        Ok(value)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

impl RemoteDataClient for Dhis2Client {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn analytics(
        &self,
        request: &ExtractionRequest,
        limits: &BatchLimits,
    ) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for batch in AnalyticsRequest::batches(request, limits)? {
            let body = self
                .get_json(analytics::ENDPOINT, &batch.query())
                .await
                .context("fetch analytics")?;
            records.extend(analytics::parse_response(&body)?);
        }
        Ok(records)
    }

    async fn metadata(&self, kind: EntityKind) -> Result<Vec<Record>> {
        let spec = metadata::endpoint(kind);
        let mut records = Vec::new();
        let mut page = 1u32;
        loop {
            let body = self
                .get_json(spec.endpoint, &spec.page_query(page, PAGE_SIZE))
                .await
                .with_context(|| format!("fetch {}", spec.endpoint))?;
            let (items, page_count) = metadata::parse_page(&body, spec.collection)?;
            records.extend(items.iter().map(|item| metadata::normalize(kind, item)));
            if page >= page_count {
                break;
            }
            page += 1;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `responses` in order, one per connection, on a local port.
    /// Returns the base URL and the request targets seen so far.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            let mut responses = responses.into_iter();
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&head);
                let target = head.split_whitespace().nth(1).unwrap_or_default();
                log.lock().unwrap().push(target.to_string());

                let (status, body) = responses.next().unwrap_or((404, "{}"));
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(reply.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        (format!("http://{addr}"), seen)
    }

    fn config(base_url: &str) -> ClientConfig {
        ClientConfig {
            base_url: base_url.into(),
            username: Some("admin".into()),
            password: Some("district".into()),
            timeout: Duration::from_secs(5),
            user_agent: "test".into(),
            cache_dir: None,
            cache_max_age: None,
        }
    }

    #[test]
    fn endpoint_urls_tolerate_trailing_slash_and_encode_query() {
        let c = Dhis2Client::new(&config("https://play.dhis2.org/dev/")).unwrap();
        assert_eq!(c.base_url(), "https://play.dhis2.org/dev");
        let url = c
            .endpoint_url(
                "analytics",
                &[("dimension".into(), "dx:a;b".into()), ("dimension".into(), "pe:2021".into())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://play.dhis2.org/dev/api/analytics?dimension=dx%3Aa%3Bb&dimension=pe%3A2021"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(Dhis2Client::new(&config("not a url")).is_err());
    }

    #[tokio::test]
    async fn cached_responses_are_served_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config("http://127.0.0.1:9");
        cfg.cache_dir = Some(dir.path().to_path_buf());
        let c = Dhis2Client::new(&cfg).unwrap();

        let url = c.endpoint_url("system/info", &[]).unwrap();
        ResponseCache::new(dir.path(), None, Some("admin"))
            .unwrap()
            .put(url.as_str(), r#"{"version":"2.40"}"#);

        let v = c.get_json("system/info", &[]).await.unwrap();
        assert_eq!(v["version"], "2.40");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[tokio::test]
    async fn metadata_follows_pager_until_last_page() {
        let (base, seen) = serve(vec![
            (200, r#"{"pager":{"page":1,"pageCount":2},"dataElements":[{"id":"a","name":"A"}]}"#),
            (200, r#"{"pager":{"page":2,"pageCount":2},"dataElements":[{"id":"b","name":"B"}]}"#),
        ])
        .await;
        let c = Dhis2Client::new(&config(&base)).unwrap();

        let records = c.metadata(EntityKind::DataElements).await.unwrap();

        let ids: Vec<_> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("/api/dataElements?"));
        assert!(seen[0].contains("page=1"));
        assert!(seen[1].contains("page=2"));
    }

    #[tokio::test]
    async fn unpaged_metadata_is_a_single_request() {
        let (base, seen) = serve(vec![(
            200,
            r#"{"indicators":[{"id":"i1","name":"Coverage"},{"id":"i2","name":"Rate"}]}"#,
        )])
        .await;
        let c = Dhis2Client::new(&config(&base)).unwrap();

        let records = c.metadata(EntityKind::Indicators).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn error_status_reports_status_and_url() {
        let (base, seen) = serve(vec![(500, r#"{"message":"boom"}"#)]).await;
        let c = Dhis2Client::new(&config(&base)).unwrap();

        let err = c.metadata(EntityKind::DataElements).await.unwrap_err();

        let msg = format!("{err:#}");
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains(&format!("{base}/api/dataElements")), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
