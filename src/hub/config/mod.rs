mod hub_config;

pub use hub_config::{ConfigError, DeviceConfig, HubConfig, LoggingConfig, PoolConfig};
