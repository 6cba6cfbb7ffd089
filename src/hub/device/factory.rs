//! 设备工厂：设备类型标签 -> 构造函数

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::base::{BaseDevice, HOST_KEY, PORT_KEY, UPDATE_TIME_KEY, parse_update_time};
use super::kinds::{DeviceKind, RgbLampKind, StandardKind};
use crate::error::{AppError, Result};
use crate::hub::config::DeviceConfig;
use crate::hub::connector::{EndpointConnector, RetryConfig, SimulatedEndpoint};
use crate::hub::core::state::DeviceType;
use crate::hub::core::status::Properties;
use crate::hub::core::traits::Connector;

pub const DEVICE_TYPE_KEY: &str = "device_type";
pub const DEVICE_PROPERTIES_KEY: &str = "device_properties";

/// 从属性集合解析出的设备参数
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSpec {
    pub host: String,
    pub port: u16,
    pub update_time: i64,
}

impl DeviceSpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            update_time: 0,
        }
    }

    pub fn with_update_time(mut self, seconds: i64) -> Self {
        self.update_time = seconds;
        self
    }

    /// 解析 `host`、`port`、可选的 `update_time`
    pub fn from_properties(properties: &Properties, max_update_time: i64) -> Result<Self> {
        let host = properties
            .get(HOST_KEY)
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::InvalidProperties(format!("{} is required", HOST_KEY)))?;

        let port = properties
            .get(PORT_KEY)
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| AppError::InvalidProperties(format!("{} must be a number in 0..=65535", PORT_KEY)))?;

        let update_time = match properties.get(UPDATE_TIME_KEY) {
            None | Some(Value::Null) => 0,
            Some(value) => parse_update_time(value, max_update_time)?,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            update_time,
        })
    }
}

/// 根据设备类型和参数创建连接器
pub type ConnectorBuilder = Arc<dyn Fn(DeviceType, &DeviceSpec) -> Arc<dyn Connector> + Send + Sync>;

type KindBuilder = fn(DeviceType) -> Arc<dyn DeviceKind>;

/// 设备工厂
pub struct DeviceFactory {
    kinds: HashMap<DeviceType, KindBuilder>,
    connectors: ConnectorBuilder,
    config: DeviceConfig,
}

impl DeviceFactory {
    /// 创建工厂，默认每个设备连接一个模拟端点
    pub fn new(config: DeviceConfig, retry: RetryConfig) -> Self {
        let connectors: ConnectorBuilder = Arc::new(move |device_type, spec: &DeviceSpec| {
            let endpoint = Arc::new(SimulatedEndpoint::new(device_type));
            Arc::new(EndpointConnector::new(spec.host.clone(), spec.port, endpoint, retry.clone()))
                as Arc<dyn Connector>
        });

        let standard: KindBuilder = |t| Arc::new(StandardKind::new(t)) as Arc<dyn DeviceKind>;
        let rgb: KindBuilder = |_| Arc::new(RgbLampKind) as Arc<dyn DeviceKind>;

        let mut kinds: HashMap<DeviceType, KindBuilder> = HashMap::new();
        kinds.insert(DeviceType::Lamp, standard);
        kinds.insert(DeviceType::Window, standard);
        kinds.insert(DeviceType::Door, standard);
        kinds.insert(DeviceType::RgbLamp, rgb);

        Self {
            kinds,
            connectors,
            config,
        }
    }

    /// 替换连接器构造方式（真实硬件或测试）
    pub fn with_connector_builder(mut self, builder: ConnectorBuilder) -> Self {
        self.connectors = builder;
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// 按类型创建设备
    pub fn create(&self, device_type: DeviceType, properties: &Properties) -> Result<BaseDevice> {
        let builder = self
            .kinds
            .get(&device_type)
            .ok_or_else(|| AppError::UnsupportedType(device_type.to_string()))?;

        let spec = DeviceSpec::from_properties(properties, self.config.max_update_time)?;
        let connector = (self.connectors)(device_type, &spec);

        info!(device_type = %device_type, host = %spec.host, port = spec.port, "创建设备");
        Ok(BaseDevice::new(spec, builder(device_type), connector, self.config.clone()))
    }

    /// 解析 `{"device_type": ..., "device_properties": {...}}` 形式的请求并创建设备
    pub fn create_from_request(&self, request: &Properties) -> Result<BaseDevice> {
        let type_name = request
            .get(DEVICE_TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::InvalidProperties(format!("{} field is missed", DEVICE_TYPE_KEY)))?;
        let device_type = type_name
            .parse::<DeviceType>()
            .map_err(|_| AppError::UnsupportedType(type_name.to_string()))?;

        let properties = request
            .get(DEVICE_PROPERTIES_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::InvalidProperties(format!("{} field is required", DEVICE_PROPERTIES_KEY)))?;

        self.create(device_type, properties)
    }
}

impl Default for DeviceFactory {
    fn default() -> Self {
        Self::new(DeviceConfig::default(), RetryConfig::default())
    }
}
