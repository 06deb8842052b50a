use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::paginate::{DEFAULT_PAGE_CEILING, DEFAULT_PAGE_SIZE, DEFAULT_TAKE};

pub const DEFAULT_UPSTREAM_BASE: &str = "https://be.komikcast.cc";
pub const DEFAULT_UPSTREAM_REFERER: &str = "https://v1.komikcast.fit/";

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP gateway.
    Serve(ServeArgs),
    /// Fetch one page of the series listing and print the envelope as JSON.
    Series(SeriesArgs),
}

#[derive(Debug, Clone, Args)]
pub struct UpstreamArgs {
    /// Upstream catalog API base URL.
    #[arg(long = "upstream", default_value = DEFAULT_UPSTREAM_BASE)]
    pub upstream_base: String,

    /// Referer header sent to the upstream.
    #[arg(long, default_value = DEFAULT_UPSTREAM_REFERER)]
    pub upstream_referer: String,

    /// Per-request timeout for upstream calls.
    #[arg(long, default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    /// Items per upstream listing page.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Highest upstream page a single request may fetch.
    #[arg(long, default_value_t = DEFAULT_PAGE_CEILING)]
    pub page_ceiling: u32,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    #[command(flatten)]
    pub upstream: UpstreamArgs,

    /// Timeout for image proxy fetches.
    #[arg(long, default_value_t = 30)]
    pub proxy_timeout_secs: u64,

    /// Public base URL used in rewritten image links (default: request Host).
    #[arg(long)]
    pub public_url: Option<String>,

    /// Return upstream image URLs untouched.
    #[arg(long)]
    pub no_rewrite_images: bool,

    /// Let the image proxy reach loopback/private addresses (local testing only).
    #[arg(long)]
    pub allow_private_proxy_targets: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SeriesArgs {
    #[command(flatten)]
    pub upstream: UpstreamArgs,

    /// Absolute index of the first item.
    #[arg(long, conflicts_with = "cursor")]
    pub offset: Option<u64>,

    /// Slug of the last item already seen (cursor mode).
    #[arg(long)]
    pub cursor: Option<String>,

    #[arg(long, default_value_t = DEFAULT_TAKE)]
    pub take: u32,
}
