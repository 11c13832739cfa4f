//! Logging Module
//!
//! Structured logging utilities built on the `tracing` crate.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Verbose logging config for debugging
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            ansi_colors: true,
        }
    }

    /// Quiet logging config (errors only)
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            include_target: false,
            ansi_colors: true,
        }
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Parse from a string, defaulting to Info
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Initialize logging with the given configuration
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level.to_tracing_level())
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Per-epoch progress logger for training runs
pub struct TrainingLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_start: std::time::Instant,
    training_start: std::time::Instant,
}

impl TrainingLogger {
    /// Create a new training logger
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: std::time::Instant::now(),
            training_start: std::time::Instant::now(),
        }
    }

    /// Log start of an epoch
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = std::time::Instant::now();

        tracing::info!("Epoch {}/{} started", epoch + 1, self.total_epochs);
    }

    /// Log end of a monitored epoch with metrics
    pub fn end_epoch(&self, train_acc: f64, test_acc: f64, train_loss: f64, lr: f64) {
        let epoch_time = self.epoch_start.elapsed();

        tracing::info!(
            "Epoch {}/{} done in {:.1}s | loss: {:.4} | train acc: {:.1}% | test acc: {:.1}% | lr: {:.6}",
            self.epoch + 1,
            self.total_epochs,
            epoch_time.as_secs_f64(),
            train_loss,
            train_acc * 100.0,
            test_acc * 100.0,
            lr
        );
    }

    /// Log per-class accuracies after an evaluation pass
    pub fn log_class_accuracies(&self, class_names: &[&str], accuracies: &[f64]) {
        for (name, acc) in class_names.iter().zip(accuracies.iter()) {
            tracing::info!("Accuracy of {:>8}: {:.1}%", name, acc * 100.0);
        }
    }

    /// Log training completion
    pub fn log_complete(&self, final_test_acc: f64) {
        let total_time = self.training_start.elapsed();

        tracing::info!(
            "Training complete! {} epochs in {:.1}s | test accuracy: {:.2}%",
            self.total_epochs,
            total_time.as_secs_f64(),
            final_test_acc * 100.0
        );
    }
}
