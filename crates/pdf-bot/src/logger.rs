use chrono::{DateTime, Local};
use log::{Level, LevelFilter, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Logger writing timestamped lines to stderr.
///
/// Warnings and errors are also kept in a bounded in-memory tail so the
/// shutdown summary can report recent problems.
#[derive(Clone)]
pub struct AppLogger {
    problems: Arc<Mutex<VecDeque<LogEntry>>>,
    max_entries: usize,
    level: LevelFilter,
}

impl AppLogger {
    pub fn new(max_entries: usize, level: LevelFilter) -> Self {
        Self {
            problems: Arc::new(Mutex::new(VecDeque::with_capacity(max_entries))),
            max_entries,
            level,
        }
    }

    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }

    /// Recent warnings and errors, oldest first
    pub fn problems(&self) -> Vec<LogEntry> {
        self.problems
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn push(&self, entry: LogEntry) {
        let mut problems = self.problems.lock().unwrap_or_else(PoisonError::into_inner);
        problems.push_back(entry);

        // Keep only the most recent entries
        while problems.len() > self.max_entries {
            problems.pop_front();
        }
    }
}

/// Our own crates log at the configured level; dependencies are capped at info
fn is_own_target(target: &str) -> bool {
    target.starts_with("pdf")
}

fn format_line(entry: &LogEntry) -> String {
    format!(
        "{} {:<5} [{}] {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        entry.level,
        entry.target,
        entry.message
    )
}

impl log::Log for AppLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let limit = if is_own_target(metadata.target()) {
            self.level
        } else {
            self.level.min(LevelFilter::Info)
        };
        metadata.level() <= limit
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = LogEntry {
            timestamp: Local::now(),
            level: record.level(),
            target: record.target().to_string(),
            message: format!("{}", record.args()),
        };
        eprintln!("{}", format_line(&entry));

        if entry.level <= Level::Warn {
            self.push(entry);
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    fn record_at(logger: &AppLogger, level: Level, target: &str, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target(target)
                .args(format_args!("{}", message))
                .build(),
        );
    }

    #[test]
    fn test_keeps_only_recent_problems() {
        let logger = AppLogger::new(2, LevelFilter::Info);
        record_at(&logger, Level::Warn, "pdfbot", "one");
        record_at(&logger, Level::Info, "pdfbot", "not a problem");
        record_at(&logger, Level::Error, "pdfbot", "two");
        record_at(&logger, Level::Warn, "pdfbot", "three");

        let messages: Vec<_> = logger.problems().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }

    #[test]
    fn test_dependencies_capped_at_info() {
        let logger = AppLogger::new(10, LevelFilter::Trace);
        let own = Metadata::builder()
            .level(Level::Debug)
            .target("pdf_bot_runtime::dispatch")
            .build();
        let dep = Metadata::builder()
            .level(Level::Debug)
            .target("reqwest::connect")
            .build();
        let dep_info = Metadata::builder()
            .level(Level::Info)
            .target("reqwest::connect")
            .build();

        assert!(logger.enabled(&own));
        assert!(!logger.enabled(&dep));
        assert!(logger.enabled(&dep_info));
    }

    #[test]
    fn test_respects_configured_level() {
        let logger = AppLogger::new(10, LevelFilter::Warn);
        let info = Metadata::builder()
            .level(Level::Info)
            .target("pdfbot")
            .build();
        assert!(!logger.enabled(&info));
    }
}
