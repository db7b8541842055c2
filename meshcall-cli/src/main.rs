use clap::Parser;
mod modes;

use meshcall_cli::cli_args::{Mode, Opt};
use modes::ice_servers::ice_servers;
use modes::join::join;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .finish()
        .try_init()?;

    let opt = Opt::parse();

    match opt.mode {
        Mode::Join(j) => join(j).await?,
        Mode::IceServers(api) => ice_servers(api).await?,
    };

    Ok(())
}
