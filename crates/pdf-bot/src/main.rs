mod config;
mod handlers;
mod logger;
mod telegram;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, MISSING_TOKEN};
use handlers::Handler;
use logger::AppLogger;
use pdf_bot_runtime::{Dispatcher, Rasterizer, SessionStore, UnavailableRasterizer};
use pdf_ops::PdfiumRasterizer;
use std::sync::Arc;
use std::time::Duration;
use telegram::BotApi;

/// Warnings and errors kept for the shutdown summary
const PROBLEM_TAIL: usize = 100;

/// Pause after a failed `getUpdates` call
const POLL_BACKOFF: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    let Some(token) = config.token() else {
        eprintln!("{MISSING_TOKEN}");
        std::process::exit(1);
    };

    let logger = AppLogger::new(PROBLEM_TAIL, config.log_level);
    logger.clone().init()?;

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.work_dir.display()))?;

    let store = Arc::new(SessionStore::new(config.limits()));
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        &config.work_dir,
        build_rasterizer(&config),
    ));
    let api = Arc::new(BotApi::new(token));
    let handler = Arc::new(Handler::new(api.clone(), dispatcher));

    log::info!(
        "Bot is running (work dir {}, up to {} files per user)",
        config.work_dir.display(),
        config.max_files
    );

    tokio::select! {
        _ = poll_updates(api, handler, Duration::from_secs(config.poll_timeout)) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
            log::info!("Shutting down");
        }
    }

    let cleared = store.clear_all().await;
    log::info!("Removed {} staged files", cleared);

    let problems = logger.problems();
    if !problems.is_empty() {
        log::info!("{} warnings or errors logged recently", problems.len());
        if let Some(last) = problems.last() {
            log::info!("Last problem at {}: {}", last.timestamp.format("%H:%M:%S"), last.message);
        }
    }

    Ok(())
}

/// Pdfium when it can be bound, otherwise a stand-in that reports why
fn build_rasterizer(config: &Config) -> Arc<dyn Rasterizer> {
    let pdfium = PdfiumRasterizer::new(config.pdfium_dir.clone(), config.render_width);
    match pdfium.check_binding() {
        Ok(()) => {
            log::info!("Pdfium bound, rendering at {} px", config.render_width);
            Arc::new(pdfium)
        }
        Err(e) => {
            log::warn!("Pdfium unavailable, PDF to Images is disabled: {}", e);
            Arc::new(UnavailableRasterizer::new(e.to_string()))
        }
    }
}

/// Long-poll forever, handling each update on its own task
async fn poll_updates(api: Arc<BotApi>, handler: Arc<Handler<BotApi>>, timeout: Duration) {
    let mut offset: i64 = 0;

    loop {
        let updates = match api.get_updates(offset, timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                log::warn!("Telegram poll error: {:#}", e);
                tokio::time::sleep(POLL_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let handler = handler.clone();
            tokio::spawn(async move { handler.handle_update(update).await });
        }
    }
}
