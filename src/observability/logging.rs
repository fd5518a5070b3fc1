//! 结构化日志
//!
//! 控制台输出加可选的滚动文件输出，格式由 `logging.structured` 决定。

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::config::config::LoggingConfig;
use crate::error::{AppError, Result};

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

fn rotation(name: &str) -> Rotation {
    match name {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn filter(config: &LoggingConfig) -> EnvFilter {
    let level = if config.level.is_empty() { "info" } else { &config.level };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// 初始化日志
///
/// 返回的 guard 必须在进程生命周期内持有，否则文件日志会丢失。
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console: BoxedLayer = if config.structured {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_line_number(true).boxed()
    };
    layers.push(console);

    let guard = match &config.log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(rotation(&config.rotation))
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| AppError::Config(format!("log directory {}: {}", dir.display(), e)))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file: BoxedLayer = if config.structured {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            };
            layers.push(file);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter(config))
        .try_init()
        .map_err(|e| AppError::Config(format!("tracing subscriber: {}", e)))?;

    Ok(guard)
}
