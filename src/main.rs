use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use freshet::app::AppContext;
use freshet::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut ctx = AppContext::new(cli.data)?;

    match cli.command {
        Commands::Add {
            url,
            interval,
            username,
            password,
        } => {
            commands::add_feed(&mut ctx, &url, interval, username, password).await?;
        }
        Commands::Remove { url } => {
            commands::remove_feed(&mut ctx, &url)?;
        }
        Commands::Enable { url } => {
            commands::set_feed_enabled(&mut ctx, &url, true)?;
        }
        Commands::Disable { url } => {
            commands::set_feed_enabled(&mut ctx, &url, false)?;
        }
        Commands::List { items } => {
            if items {
                commands::list_items(&ctx)?;
            } else {
                commands::list_feeds(&ctx)?;
            }
        }
        Commands::Update { force } => {
            commands::update_feeds(&mut ctx, force).await?;
        }
        Commands::Filter { action } => {
            commands::filter_command(&mut ctx, action)?;
        }
        Commands::Read { item } => {
            commands::read_item(&mut ctx, &item)?;
        }
        Commands::Open { item } => {
            commands::open_item(&mut ctx, &item)?;
        }
        Commands::Purge { max_age } => {
            commands::purge(&mut ctx, max_age)?;
        }
        Commands::Watch { tick } => {
            commands::watch(&mut ctx, tick).await?;
        }
    }

    Ok(())
}
