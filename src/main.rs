use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = comicgate::cli::Cli::parse();

    match cli.command {
        comicgate::cli::Command::Serve(args) => {
            comicgate::logging::init(comicgate::logging::SERVE_FILTER).context("init logging")?;
            tracing::debug!(?args, "parsed cli");
            let config = comicgate::config::GatewayConfig::from_args(&args).context("config")?;
            comicgate::server::serve(config).await.context("serve")?;
        }
        comicgate::cli::Command::Series(args) => {
            comicgate::logging::init(comicgate::logging::ONESHOT_FILTER)
                .context("init logging")?;
            tracing::debug!(?args, "parsed cli");
            comicgate::series::run(args).await.context("series")?;
        }
    }

    Ok(())
}
