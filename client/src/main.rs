use anyhow::Context as _;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chatlink_client::commands::{Command, Context};
use chatlink_client::events::Event;
use chatlink_client::{ClientBuilder, ClientConfig};

/// Connect to the chat gateway and answer `ping`.
#[derive(Parser, Debug)]
#[command(name = "chatlink", version, about)]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "chatlink.toml")]
    config: String,

    /// Credential token; overrides the config file and CHATLINK_TOKEN.
    #[arg(short, long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::load(&args.config)?;
    if let Some(token) = args.token {
        config.client.token = token;
    }

    let client = ClientBuilder::new(config)
        .on("ready", |_| async {
            info!("ready");
            Ok(())
        })
        .on("command_error", |event| async move {
            if let Event::CommandError { context, error } = event {
                warn!(command = %context.invoked_with, %error, "command failed");
            }
            Ok(())
        })
        .commands(|c| {
            c.command(
                Command::new("ping", |ctx: Context| async move {
                    ctx.reply("Pong!").await?;
                    Ok(())
                })
                .description("Check that the bot is alive"),
            )
        })
        .build()
        .context("failed to build client")?;

    info!("Chatlink client starting");
    client.run().await.context("client stopped with an error")?;
    Ok(())
}
