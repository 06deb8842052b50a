use anyhow::Context as _;
use serde_json::Value;

use crate::cli::SeriesArgs;
use crate::config::UpstreamConfig;
use crate::paginate;

/// Runs one pagination request against the upstream and returns the envelope.
pub async fn fetch(args: &SeriesArgs) -> anyhow::Result<Value> {
    let config = UpstreamConfig::from_args(&args.upstream)?;
    let client = config.build_client()?;

    let value = match &args.cursor {
        Some(cursor) => {
            let page =
                paginate::cursor::paginate(&client, config.limits, Some(cursor), args.take).await?;
            serde_json::to_value(page)?
        }
        None => {
            let offset = args.offset.unwrap_or(0);
            let page =
                paginate::offset::paginate(&client, config.limits, offset, args.take).await?;
            serde_json::to_value(page)?
        }
    };
    Ok(value)
}

pub async fn run(args: SeriesArgs) -> anyhow::Result<()> {
    let value = fetch(&args).await?;
    let out = serde_json::to_string_pretty(&value).context("encode envelope")?;
    println!("{out}");
    Ok(())
}
