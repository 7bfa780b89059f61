use clap::Parser;
use log::LevelFilter;
use pdf_bot_runtime::SessionLimits;
use pdf_ops::DEFAULT_RENDER_WIDTH;
use std::path::PathBuf;

/// Message printed when the bot token is missing
pub const MISSING_TOKEN: &str = "ERROR: TELEGRAM_BOT_TOKEN not found in environment variables.";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pdfbot",
    about = "Telegram bot that merges, splits, compresses and converts PDFs",
    version
)]
pub struct Config {
    /// Bot API token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory for uploaded and generated files
    #[arg(long, env = "PDFBOT_WORK_DIR", default_value = "temp")]
    pub work_dir: PathBuf,

    /// Maximum number of files a user can stage at once
    #[arg(long, env = "PDFBOT_MAX_FILES", default_value_t = 20)]
    pub max_files: usize,

    /// Maximum size of a single upload in MiB
    #[arg(long, env = "PDFBOT_MAX_FILE_MB", default_value_t = 20)]
    pub max_file_mb: u64,

    /// Long-poll timeout in seconds
    #[arg(long, env = "PDFBOT_POLL_TIMEOUT", default_value_t = 30)]
    pub poll_timeout: u64,

    /// Width in pixels of rendered page images
    #[arg(long, env = "PDFBOT_RENDER_WIDTH", default_value_t = DEFAULT_RENDER_WIDTH)]
    pub render_width: i32,

    /// Directory containing the Pdfium shared library
    #[arg(long, env = "PDFIUM_DIR")]
    pub pdfium_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "PDFBOT_LOG", default_value = "info")]
    pub log_level: LevelFilter,
}

impl Config {
    /// The bot token, if one was given and is not blank
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            max_files: self.max_files,
            max_file_bytes: self.max_file_mb.saturating_mul(1024 * 1024),
        }
    }
}
