use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER};
use serde_json::Value;
use url::Url;

use crate::error::{GatewayError, Result};
use crate::sanitize::clean;

pub const LISTING_PRESET: &str = "rilisan_terbaru";
pub const LISTING_TAKE_CHAPTER: u32 = 3;
const ACCEPT_JSON: &str = "application/json, text/plain, */*";

/// One page of the upstream series listing, as returned on the wire.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn listing_page(&self, page: u32, page_size: u32) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base: Url,
}

impl UpstreamClient {
    pub fn new(base: Url, referer: &str, timeout: Duration) -> anyhow::Result<Self> {
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("upstream base must be an http/https url: {base}");
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer)
                .with_context(|| format!("invalid upstream referer: {referer:?}"))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("build upstream http client")?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn listing_url(&self, page: u32, page_size: u32) -> Url {
        let mut url = self.endpoint(&["series"]);
        url.query_pairs_mut()
            .append_pair("preset", LISTING_PRESET)
            .append_pair("take", &page_size.to_string())
            .append_pair("takeChapter", &LISTING_TAKE_CHAPTER.to_string())
            .append_pair("page", &page.to_string());
        url
    }

    pub fn series_url(&self, slug: &str) -> Url {
        self.endpoint(&["series", slug])
    }

    pub fn chapters_url(&self, slug: &str) -> Url {
        self.endpoint(&["series", slug, "chapters"])
    }

    pub fn chapter_url(&self, slug: &str, chapter: u32) -> Url {
        self.endpoint(&["series", slug, "chapters", &chapter.to_string()])
    }

    /// GET `url` and decode the body as JSON. Only a 200 counts as success; no retries.
    pub async fn fetch_json(&self, url: &Url) -> Result<Value> {
        let resp = self.client.get(url.clone()).send().await.map_err(|err| {
            tracing::warn!(%url, error = %err, "upstream request failed");
            GatewayError::network(err)
        })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(%url, %status, "upstream returned non-200");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(GatewayError::network)?;
        serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    pub async fn series_detail(&self, slug: &str) -> Result<Value> {
        Ok(clean(self.fetch_json(&self.series_url(slug)).await?))
    }

    pub async fn chapters(&self, slug: &str) -> Result<Value> {
        Ok(clean(self.fetch_json(&self.chapters_url(slug)).await?))
    }

    pub async fn chapter_detail(&self, slug: &str, chapter: u32) -> Result<Value> {
        Ok(clean(self.fetch_json(&self.chapter_url(slug, chapter)).await?))
    }
}

#[async_trait]
impl ListingSource for UpstreamClient {
    async fn listing_page(&self, page: u32, page_size: u32) -> Result<Value> {
        let url = self.listing_url(page, page_size);
        tracing::debug!(%url, page, "fetch listing page");
        self.fetch_json(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> UpstreamClient {
        UpstreamClient::new(
            Url::parse(base).unwrap(),
            "https://v1.komikcast.fit/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn listing_url_carries_fixed_params() {
        let url = client("https://be.example.com").listing_url(3, 20);
        assert_eq!(
            url.as_str(),
            "https://be.example.com/series?preset=rilisan_terbaru&take=20&takeChapter=3&page=3"
        );
    }

    #[test]
    fn endpoints_respect_base_path() {
        let c = client("http://127.0.0.1:9000/api/");
        assert_eq!(
            c.chapter_url("solo-leveling", 12).as_str(),
            "http://127.0.0.1:9000/api/series/solo-leveling/chapters/12"
        );
        assert_eq!(
            c.chapters_url("solo-leveling").as_str(),
            "http://127.0.0.1:9000/api/series/solo-leveling/chapters"
        );
    }

    #[test]
    fn slugs_are_escaped_as_single_segments() {
        let url = client("https://be.example.com").series_url("../admin?x=1");
        assert!(url.path().starts_with("/series/"));
        assert_eq!(url.path_segments().unwrap().count(), 2);
        assert!(url.query().is_none());
    }

    #[test]
    fn rejects_non_http_base() {
        let err = UpstreamClient::new(
            Url::parse("ftp://be.example.com").unwrap(),
            "https://v1.komikcast.fit/",
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(err.to_string().contains("http/https"));
    }
}
