use anyhow::{bail, Result};
use clap::Parser;
use teamhub_api::{
    config,
    discord::{client::DiscordClient, commands},
};
use tracing::info;

/// Register the bot's slash commands with Discord.
#[derive(Debug, Parser)]
#[command(name = "register-commands", version)]
struct Cli {
    /// Register in a single guild (instant) instead of globally (can take an hour)
    #[arg(long, env = "APP__DISCORD_GUILD_ID")]
    guild_id: Option<String>,

    /// Print the command payload without calling Discord
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    if cli.dry_run {
        println!("{}", serde_json::to_string_pretty(&commands::definitions())?);
        return Ok(());
    }

    let Some(client) = DiscordClient::from_config(&cfg)? else {
        bail!("APP__DISCORD_APPLICATION_ID is not configured");
    };
    if cfg.discord_bot_token.is_none() {
        bail!("APP__DISCORD_BOT_TOKEN is required to register commands");
    }

    let guild_id = cli.guild_id.or_else(|| cfg.discord_guild_id.clone());
    let registered = commands::register(&client, guild_id.as_deref()).await?;
    for command in &registered {
        info!(
            name = command["name"].as_str().unwrap_or_default(),
            id = command["id"].as_str().unwrap_or_default(),
            "Command registered"
        );
    }
    Ok(())
}
