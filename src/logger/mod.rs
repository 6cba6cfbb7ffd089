use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{AppError, Result};
use crate::hub::config::LoggingConfig;

/// 日志文件名前缀
pub const LOG_FILE_PREFIX: &str = "smarthouse.log";

/// 构建日志过滤器，`RUST_LOG` 优先
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| AppError::Config(format!("日志级别无效 '{}': {}", config.level, e)))
}

/// 初始化日志系统
///
/// 配置了 `log_dir` 时额外写入按天滚动的日志文件，返回的 guard 需要保持到进程退出。
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;
    let console = fmt::layer().with_target(false);

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);

            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .try_init()
                .map_err(|e| AppError::Config(format!("日志系统初始化失败: {}", e)))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()
                .map_err(|e| AppError::Config(format!("日志系统初始化失败: {}", e)))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "smarthouse_rs=loud[".to_string(),
            log_dir: None,
        };
        assert!(matches!(build_filter(&config), Err(AppError::Config(_))));
    }

    #[test]
    fn test_default_level_parses() {
        assert!(build_filter(&LoggingConfig::default()).is_ok());
    }
}
