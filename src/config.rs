use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::cli::{ServeArgs, UpstreamArgs};
use crate::paginate::PageLimits;
use crate::proxy::ImageProxy;
use crate::upstream::UpstreamClient;

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base: Url,
    pub referer: String,
    pub timeout: Duration,
    pub limits: PageLimits,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    pub upstream: UpstreamConfig,
    pub proxy_timeout: Duration,
    pub public_url: Option<String>,
    pub rewrite_images: bool,
    pub allow_private_proxy_targets: bool,
}

impl UpstreamConfig {
    pub fn from_args(args: &UpstreamArgs) -> anyhow::Result<Self> {
        Self::resolve(args, &process_env)
    }

    fn resolve(args: &UpstreamArgs, env: &dyn Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let base = env("COMICGATE_UPSTREAM_BASE").unwrap_or_else(|| args.upstream_base.clone());
        let base = Url::parse(base.trim()).with_context(|| format!("parse upstream base {base:?}"))?;
        let referer =
            env("COMICGATE_UPSTREAM_REFERER").unwrap_or_else(|| args.upstream_referer.clone());
        let timeout_secs = parse_env(env, "COMICGATE_UPSTREAM_TIMEOUT_SECS")
            .filter(|v: &u64| *v > 0)
            .unwrap_or(args.upstream_timeout_secs);
        anyhow::ensure!(timeout_secs > 0, "upstream timeout must be at least 1 second");
        let page_ceiling =
            parse_env(env, "COMICGATE_PAGE_CEILING").unwrap_or(args.page_ceiling);
        let limits = PageLimits::new(args.page_size, page_ceiling)?;

        Ok(Self {
            base,
            referer,
            timeout: Duration::from_secs(timeout_secs),
            limits,
        })
    }

    pub fn build_client(&self) -> anyhow::Result<UpstreamClient> {
        UpstreamClient::new(self.base.clone(), &self.referer, self.timeout)
    }
}

impl GatewayConfig {
    pub fn from_args(args: &ServeArgs) -> anyhow::Result<Self> {
        Self::resolve(args, &process_env)
    }

    fn resolve(args: &ServeArgs, env: &dyn Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let upstream = UpstreamConfig::resolve(&args.upstream, env)?;
        let proxy_timeout_secs = parse_env(env, "COMICGATE_PROXY_TIMEOUT_SECS")
            .filter(|v: &u64| *v > 0)
            .unwrap_or(args.proxy_timeout_secs);
        anyhow::ensure!(proxy_timeout_secs > 0, "proxy timeout must be at least 1 second");

        let public_url = env("COMICGATE_PUBLIC_URL").or_else(|| args.public_url.clone());
        if let Some(public_url) = &public_url {
            let parsed = Url::parse(public_url)
                .with_context(|| format!("parse public url {public_url:?}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("public url must be http/https: {public_url}");
            }
        }

        Ok(Self {
            addr: args.addr,
            upstream,
            proxy_timeout: Duration::from_secs(proxy_timeout_secs),
            public_url: public_url.map(|u| u.trim_end_matches('/').to_owned()),
            rewrite_images: !args.no_rewrite_images,
            allow_private_proxy_targets: args.allow_private_proxy_targets,
        })
    }

    pub fn build_proxy(&self) -> anyhow::Result<ImageProxy> {
        ImageProxy::new(self.proxy_timeout, self.allow_private_proxy_targets)
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = env(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
