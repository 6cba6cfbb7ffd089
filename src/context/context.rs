use std::sync::Arc;

use crate::error::Result;
use crate::hub::config::HubConfig;
use crate::hub::core::state::DeviceType;
use crate::hub::core::status::{Properties, Response};
use crate::hub::core::traits::DeviceRegistry;
use crate::hub::device::DeviceFactory;
use crate::hub::pool::DevicePool;
use crate::hub::registry::{ID_KEY, RuntimeDeviceRegistry};

/// Context trait，定义获取注册表和工厂的接口
pub trait IContext: Send + Sync {
    fn get_registry(&self) -> Arc<dyn DeviceRegistry>;
    fn get_factory(&self) -> &DeviceFactory;
    fn get_config(&self) -> &HubConfig;
}

/// 进程级 Context，启动时创建一次，按引用传给各组件
pub struct Context {
    registry: Arc<RuntimeDeviceRegistry>,
    factory: DeviceFactory,
    config: HubConfig,
}

impl Context {
    /// 创建新的 Context 实例
    pub fn new(config: HubConfig) -> Self {
        let factory = DeviceFactory::new(config.device.clone(), config.connector.clone());
        Self {
            registry: Arc::new(RuntimeDeviceRegistry::new()),
            factory,
            config,
        }
    }

    /// 使用自定义工厂（例如接入真实硬件的连接器）
    pub fn with_factory(config: HubConfig, factory: DeviceFactory) -> Self {
        Self {
            registry: Arc::new(RuntimeDeviceRegistry::new()),
            factory,
            config,
        }
    }

    /// 创建设备并注册，返回注册结果（带 id）
    pub async fn create_device(&self, request: &Properties) -> Response {
        match self.factory.create_from_request(request) {
            Ok(device) => self.registry.add_device(Arc::new(device)).await,
            Err(e) => e.into(),
        }
    }

    /// 用已注册设备组成设备池，并把设备池本身也注册进去
    pub async fn create_pool(&self, ids: &[String], device_type: DeviceType) -> Result<(String, Arc<DevicePool>)> {
        let registry: Arc<dyn DeviceRegistry> = self.registry.clone();
        let pool = Arc::new(
            DevicePool::from_registry(ids, device_type, registry)
                .await?
                .with_config(self.config.pool.clone()),
        );

        let response = self.registry.add_device(pool.clone()).await;
        let id = response.get_str(ID_KEY).unwrap_or_default().to_string();
        Ok((id, pool))
    }

    /// 释放所有设备
    pub async fn shutdown(&self) {
        self.registry.release_all().await;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl IContext for Context {
    fn get_registry(&self) -> Arc<dyn DeviceRegistry> {
        self.registry.clone()
    }

    fn get_factory(&self) -> &DeviceFactory {
        &self.factory
    }

    fn get_config(&self) -> &HubConfig {
        &self.config
    }
}
