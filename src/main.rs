use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

mod admin;
mod config;
mod download;
mod handlers;
mod stats;
#[cfg(test)]
mod testing;
mod types;

use config::Config;
use download::{purge_stale_jobs, DownloadAgent, InstaloaderScraper};
use handlers::command::Command;
use stats::StatsStore;
use types::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    log::info!("Starting insta_video_bot");

    let config = Config::from_env()?;
    log::debug!(
        "Stats file: {:?}, download dir: {:?}, admins: {}",
        config.stats_file,
        config.download_dir,
        config.admins.len()
    );

    let stats = Arc::new(StatsStore::load(&config.stats_file).await);
    let writer = stats.spawn_writer();
    let loaded = stats.snapshot();
    log::info!(
        "Loaded stats from {:?}: {} users, {} downloads",
        stats.path(),
        loaded.total_users,
        loaded.total_downloads
    );

    let purged = purge_stale_jobs(&config.download_dir)
        .await
        .with_context(|| format!("Cannot prepare download dir {:?}", config.download_dir))?;
    if purged > 0 {
        log::info!("Removed {} stale downloads", purged);
    }

    let agent = DownloadAgent::new(
        Arc::new(InstaloaderScraper::new(&config.instaloader_bin)),
        &config.download_dir,
    );
    log::debug!("Download jobs go to {:?}", agent.download_dir());

    let state = Arc::new(AppState {
        stats: stats.clone(),
        admins: config.admins,
        agent,
        broadcast_delay: config.broadcast_delay,
    });

    let bot = Bot::new(config.token);

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let command_tree = dptree::filter(|msg: Message| {
        msg.text().map(|text| text.starts_with('/')).unwrap_or(false)
    })
    .endpoint(handlers::command::receive_command);

    let link_tree = dptree::filter(|msg: Message| msg.text().is_some())
        .endpoint(handlers::download::receive_link);

    let tree = Update::filter_message()
        .branch(command_tree)
        .branch(link_tree);

    log::debug!("Starting dispatcher");

    Dispatcher::builder(bot, tree)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher stopped, flushing stats");
    stats.shutdown(writer).await;

    Ok(())
}
