use anyhow::Context as _;

/// Default filter for the long-running gateway.
pub const SERVE_FILTER: &str = "info,hyper_util=warn,reqwest=warn";
/// Default filter for one-shot commands whose stdout is the product.
pub const ONESHOT_FILTER: &str = "warn";

/// Logs go to stderr. `RUST_LOG` wins over `default_filter` when set.
pub fn init(default_filter: &str) -> anyhow::Result<()> {
    let filter = match std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => {
            tracing_subscriber::EnvFilter::try_new(directives.trim())
                .context("parse RUST_LOG directives")?
        }
        _ => tracing_subscriber::EnvFilter::try_new(default_filter)
            .with_context(|| format!("build default log filter {default_filter:?}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
