use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::hub::connector::RetryConfig;

/// 设备相关配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// 轮询任务每轮之间的让出间隔（毫秒）
    pub poll_tick_ms: u64,

    /// 每个设备保留的历史数据条数
    pub metrics_capacity: usize,

    /// 允许的最大轮询间隔（秒）
    pub max_update_time: i64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            poll_tick_ms: 50,
            metrics_capacity: 100,
            max_update_time: 7 * 24 * 60 * 60,
        }
    }
}

impl DeviceConfig {
    pub fn poll_tick(&self) -> Duration {
        Duration::from_millis(self.poll_tick_ms.max(1))
    }
}

/// 设备池配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 单个成员的超时时间（毫秒），不设置则无限等待
    pub member_timeout_ms: Option<u64>,
}

impl PoolConfig {
    pub fn member_timeout(&self) -> Option<Duration> {
        self.member_timeout_ms.map(Duration::from_millis)
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别过滤
    pub level: String,

    /// 日志文件目录，不设置则只输出到终端
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "smarthouse_rs=debug,info".to_string(),
            log_dir: None,
        }
    }
}

/// 完整的服务配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub device: DeviceConfig,
    pub connector: RetryConfig,
    pub pool: PoolConfig,
    pub logging: LoggingConfig,
}

impl HubConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: HubConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载，文件不存在时使用默认配置，并使用环境变量覆盖
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = if path.as_ref().exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        if let Ok(level) = std::env::var("SMARTHOUSE_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(dir) = std::env::var("SMARTHOUSE_LOG_DIR") {
            config.logging.log_dir = Some(dir);
        }

        Ok(config)
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.connector.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "connector.max_attempts 必须大于 0".to_string(),
            ));
        }
        if self.device.metrics_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "device.metrics_capacity 必须大于 0".to_string(),
            ));
        }
        if self.device.max_update_time < 0 {
            return Err(ConfigError::ValidationError(
                "device.max_update_time 不能为负数".to_string(),
            ));
        }
        Ok(())
    }
}

/// 配置错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO 错误: {0}")]
    IoError(String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("序列化错误: {0}")]
    SerializeError(String),

    #[error("验证错误: {0}")]
    ValidationError(String),
}
