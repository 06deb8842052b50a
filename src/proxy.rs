use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use anyhow::Context as _;
use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use url::{Host, Url};

use crate::error::{GatewayError, Result};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";
pub const CACHE_CONTROL: &str = "public, max-age=86400";
const ACCEPT_IMAGE: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";
const MAX_REDIRECTS: usize = 10;

/// Fetches remote images with browser-like headers so clients never hit the
/// origin's hotlink checks. Every call goes to the network; nothing is cached.
#[derive(Debug, Clone)]
pub struct ImageProxy {
    client: reqwest::Client,
    allow_private: bool,
}

impl ImageProxy {
    pub fn new(timeout: Duration, allow_private: bool) -> anyhow::Result<Self> {
        let redirect = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if !allow_private && is_private_target(attempt.url()) {
                attempt.error("redirect to a private network address")
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .redirect(redirect)
            .build()
            .context("build image proxy http client")?;

        Ok(Self {
            client,
            allow_private,
        })
    }

    /// Parses the `url` query value and applies the scheme and SSRF checks.
    pub fn validate_target(&self, raw: Option<&str>) -> Result<Url> {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(GatewayError::validation("url is required"));
        }

        let url = Url::parse(raw)
            .map_err(|err| GatewayError::validation(format!("invalid url: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::validation(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        if url.host().is_none() {
            return Err(GatewayError::validation("url must include a host"));
        }
        if !self.allow_private && is_private_target(&url) {
            tracing::warn!(%url, "rejected private proxy target");
            return Err(GatewayError::validation("target host is not allowed"));
        }
        Ok(url)
    }

    pub async fn fetch(&self, target: &Url, referer: Option<&str>) -> Result<ProxiedImage> {
        let referer = match referer.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => r.to_owned(),
            None => default_referer(target),
        };
        let referer = HeaderValue::from_str(&referer)
            .map_err(|_| GatewayError::validation("referer is not a valid header value"))?;

        let resp = self
            .client
            .get(target.clone())
            .header(reqwest::header::ACCEPT, ACCEPT_IMAGE)
            .header(reqwest::header::REFERER, referer)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(url = %target, error = %err, "image fetch failed");
                GatewayError::network(err)
            })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(url = %target, %status, "image host returned non-200");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_owned();

        Ok(ProxiedImage {
            content_type,
            response: resp,
        })
    }
}

/// A successful upstream image response whose body has not been read yet.
pub struct ProxiedImage {
    pub content_type: String,
    response: reqwest::Response,
}

impl IntoResponse for ProxiedImage {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        let body = Body::from_stream(self.response.bytes_stream());

        let mut resp = Response::new(body);
        *resp.status_mut() = StatusCode::OK;
        resp.headers_mut().insert(header::CONTENT_TYPE, content_type);
        resp.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL),
        );
        resp
    }
}

/// The target's own origin, which is what image hosts usually expect.
pub fn default_referer(target: &Url) -> String {
    format!("{}/", target.origin().ascii_serialization())
}

pub fn is_private_target(url: &Url) -> bool {
    match url.host() {
        None => true,
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost"
                || domain.ends_with(".localhost")
                || domain.ends_with(".local")
                || domain.ends_with(".internal")
        }
        Some(Host::Ipv4(ip)) => is_private_v4(ip),
        Some(Host::Ipv6(ip)) => is_private_v6(ip),
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || a == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (64..128).contains(&b))
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = embedded_v4(ip) {
        return is_private_v4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80
}

/// IPv4 address carried in the low 32 bits of a mapped (`::ffff:0:0/96`),
/// compatible (`::/96`) or NAT64 (`64:ff9b::/96`) address.
fn embedded_v4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4() {
        return Some(v4);
    }
    match ip.segments() {
        [0x64, 0xff9b, 0, 0, 0, 0, hi, lo] => {
            Some(Ipv4Addr::from((u32::from(hi) << 16) | u32::from(lo)))
        }
        _ => None,
    }
}
