//! Shared HTTP fetcher for the site adapters
//!
//! One `SiteClient` per external site. Each applies, in order:
//! response cache lookup, rate limiting, the request itself with a fixed
//! number of retries on connection errors, an optional random throttle after
//! uncached responses, and storing successful responses in the cache.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{CachedResponse, ResponseCache};
use crate::error::{ImportError, ImportResult};

pub const DEFAULT_USER_AGENT: &str = concat!(
    "ce-import/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/trompamusic/ce-data-import)"
);
/// Some sites refuse obvious bots when scraping html
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/39.0.2171.95 Safari/537.36";
const MAX_CONNECT_RETRIES: u32 = 5;

/// A fetched page
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub body: String,
    pub from_cache: bool,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn error_for_status(self) -> ImportResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ImportError::Status {
                url: self.url,
                status: self.status,
            })
        }
    }

    pub fn json(&self) -> ImportResult<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Builder for [`SiteClient`]
pub struct SiteClientBuilder {
    name: &'static str,
    user_agent: String,
    requests_per_second: Option<u32>,
    throttle_ms: Option<(u64, u64)>,
    cache: Option<ResponseCache>,
    base_url: Option<String>,
}

impl SiteClientBuilder {
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn rate_limit(mut self, requests_per_second: u32) -> Self {
        self.requests_per_second = Some(requests_per_second);
        self
    }

    /// Sleep a random `min..=max` ms after every response not served from cache
    pub fn throttle(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.throttle_ms = Some((min_ms, max_ms.max(min_ms)));
        self
    }

    pub fn cache(mut self, cache: Option<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Send every request to this origin instead, keeping path and query
    pub fn base_url(mut self, base_url: Option<&str>) -> Self {
        self.base_url = base_url.map(str::to_string);
        self
    }

    pub fn build(self) -> ImportResult<SiteClient> {
        let http_client = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        let rate_limiter = self
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|n| RateLimiter::direct(Quota::per_second(n)));

        let base_url = self
            .base_url
            .as_deref()
            .map(|base| {
                reqwest::Url::parse(base)
                    .map_err(|e| ImportError::InvalidInput(format!("Bad base URL {}: {}", base, e)))
            })
            .transpose()?;

        Ok(SiteClient {
            name: self.name,
            http_client,
            rate_limiter,
            throttle_ms: self.throttle_ms,
            cache: self.cache,
            base_url,
        })
    }
}

/// HTTP client for one external site
pub struct SiteClient {
    name: &'static str,
    http_client: reqwest::Client,
    rate_limiter: Option<DefaultDirectRateLimiter>,
    throttle_ms: Option<(u64, u64)>,
    cache: Option<ResponseCache>,
    base_url: Option<reqwest::Url>,
}

impl SiteClient {
    pub fn builder(name: &'static str) -> SiteClientBuilder {
        SiteClientBuilder {
            name,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            requests_per_second: None,
            throttle_ms: None,
            cache: None,
            base_url: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build `url?params` with proper encoding
    pub fn url_with_params(url: &str, params: &[(&str, &str)]) -> ImportResult<String> {
        let parsed = if params.is_empty() {
            reqwest::Url::parse(url)
        } else {
            reqwest::Url::parse_with_params(url, params)
        };
        parsed
            .map(|u| u.to_string())
            .map_err(|e| ImportError::InvalidInput(format!("Bad URL {}: {}", url, e)))
    }

    /// `url` moved onto the base URL, if one is set
    pub fn rebase(&self, url: &str) -> ImportResult<String> {
        let base = match &self.base_url {
            Some(base) => base,
            None => return Ok(url.to_string()),
        };
        let parsed =
            reqwest::Url::parse(url).map_err(|e| ImportError::InvalidInput(format!("Bad URL {}: {}", url, e)))?;

        let mut rebased = base.clone();
        rebased.set_path(&format!("{}{}", base.path().trim_end_matches('/'), parsed.path()));
        rebased.set_query(parsed.query());
        Ok(rebased.to_string())
    }

    /// GET a page (cached), whatever its status
    pub async fn get(&self, url: &str, params: &[(&str, &str)]) -> ImportResult<Fetched> {
        let request_url = self.rebase(&Self::url_with_params(url, params)?)?;

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&request_url).await? {
                debug!(site = self.name, url = %request_url, "Cache hit");
                return Ok(Fetched {
                    url: hit.url,
                    status: hit.status,
                    body: hit.body,
                    from_cache: true,
                });
            }
        }

        let response = self.send(&request_url, None).await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        let fetched = Fetched {
            url: final_url,
            status,
            body,
            from_cache: false,
        };

        if let Some(cache) = &self.cache {
            if fetched.is_success() {
                cache
                    .put(
                        &request_url,
                        &CachedResponse {
                            url: fetched.url.clone(),
                            status,
                            body: fetched.body.clone(),
                            fetched_at: chrono::Utc::now(),
                        },
                    )
                    .await?;
            }
        }

        self.throttle().await;
        Ok(fetched)
    }

    /// GET and fail on a non-success status
    pub async fn get_ok(&self, url: &str, params: &[(&str, &str)]) -> ImportResult<Fetched> {
        self.get(url, params).await?.error_for_status()
    }

    /// GET a JSON document, failing on a non-success status
    pub async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> ImportResult<Value> {
        self.get_ok(url, params).await?.json()
    }

    /// GET raw bytes, uncached, optionally sending a cookie header
    pub async fn download(&self, url: &str, cookie: Option<&str>) -> ImportResult<Vec<u8>> {
        let url = self.rebase(url)?;
        let response = self.send(&url, cookie).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        self.throttle().await;
        Ok(bytes.to_vec())
    }

    async fn send(&self, url: &str, cookie: Option<&str>) -> ImportResult<reqwest::Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        debug!(site = self.name, url, "GET");

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.http_client.get(url);
            if let Some(cookie) = cookie {
                request = request.header(reqwest::header::COOKIE, cookie);
            }

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt <= MAX_CONNECT_RETRIES => {
                    warn!(site = self.name, attempt, url, "Connection failed, retrying: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn throttle(&self) {
        if let Some((min_ms, max_ms)) = self.throttle_ms {
            let wait_ms = rand::thread_rng().gen_range(min_ms..=max_ms);
            debug!(site = self.name, wait_ms, "Throttling");
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_with_params_encodes() {
        let url = SiteClient::url_with_params(
            "https://imslp.org/api.php",
            &[("titles", "A|B C"), ("format", "json")],
        )
        .unwrap();
        assert_eq!(url, "https://imslp.org/api.php?titles=A%7CB+C&format=json");
    }

    #[test]
    fn test_rebase_keeps_path_and_query() {
        let client = SiteClient::builder("imslp")
            .base_url(Some("http://127.0.0.1:8080/mirror/"))
            .build()
            .unwrap();
        assert_eq!(
            client
                .rebase("https://imslp.org/imslpscripts/API.ISCR.php?retformat=json/type=0/id=QQ==")
                .unwrap(),
            "http://127.0.0.1:8080/mirror/imslpscripts/API.ISCR.php?retformat=json/type=0/id=QQ=="
        );

        let direct = SiteClient::builder("imslp").build().unwrap();
        assert_eq!(direct.rebase("https://imslp.org/wiki/A_b").unwrap(), "https://imslp.org/wiki/A_b");

        assert!(SiteClient::builder("cpdl").base_url(Some("not a url")).build().is_err());
    }

    #[test]
    fn test_bad_url_is_invalid_input() {
        let err = SiteClient::url_with_params("not a url", &[]).unwrap_err();
        assert!(matches!(err, ImportError::InvalidInput(_)));
    }

    #[test]
    fn test_error_for_status() {
        let fetched = Fetched {
            url: "https://viaf.org/viaf/0".to_string(),
            status: 404,
            body: String::new(),
            from_cache: false,
        };
        assert!(matches!(
            fetched.error_for_status(),
            Err(ImportError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_cached_response_is_served_without_network() {
        let cache = ResponseCache::in_memory().await.unwrap();
        let request_url = SiteClient::url_with_params("http://127.0.0.1:9/page", &[]).unwrap();
        cache
            .put(
                &request_url,
                &CachedResponse {
                    url: request_url.clone(),
                    status: 200,
                    body: "{\"ok\": true}".to_string(),
                    fetched_at: chrono::Utc::now(),
                },
            )
            .await
            .unwrap();

        let client = SiteClient::builder("test").cache(Some(cache)).build().unwrap();
        let value = client.get_json("http://127.0.0.1:9/page", &[]).await.unwrap();
        assert_eq!(value["ok"], true);
    }
}
