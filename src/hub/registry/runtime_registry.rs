use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::hub::core::status::{Response, StatusCode};
use crate::hub::core::traits::{Device, DeviceRegistry};

pub const ID_KEY: &str = "id";

/// 内存中的设备注册表
///
/// id 形如 `device-N`，N 由实例内的计数器分配；列表保持插入顺序。
pub struct RuntimeDeviceRegistry {
    devices: RwLock<Vec<(String, Arc<dyn Device>)>>,
    next_id: AtomicU64,
}

impl RuntimeDeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    /// 释放所有设备（进程退出前调用）
    pub async fn release_all(&self) {
        let devices: Vec<_> = self.devices.write().await.drain(..).collect();
        for (id, device) in devices {
            device.release().await;
            debug!(device = %id, "设备已释放");
        }
    }
}

impl Default for RuntimeDeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceRegistry for RuntimeDeviceRegistry {
    async fn add_device(&self, device: Arc<dyn Device>) -> Response {
        let id = format!("device-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let device_type = device.device_type();
        self.devices.write().await.push((id.clone(), device));

        info!(device = %id, device_type = %device_type, "设备已注册");
        Response::ok(StatusCode::Created).with(ID_KEY, id)
    }

    async fn get_device(&self, id: &str) -> Option<Arc<dyn Device>> {
        self.devices
            .read()
            .await
            .iter()
            .find(|(device_id, _)| device_id == id)
            .map(|(_, device)| Arc::clone(device))
    }

    async fn delete_device(&self, id: &str) -> Response {
        let removed = {
            let mut devices = self.devices.write().await;
            devices
                .iter()
                .position(|(device_id, _)| device_id == id)
                .map(|index| devices.remove(index))
        };

        match removed {
            Some((_, device)) => {
                device.release().await;
                info!(device = %id, "设备已删除");
                Response::ok(StatusCode::NoContent)
            }
            None => Response::failed(StatusCode::NotFound, format!("Device {} not found", id)),
        }
    }

    async fn list_devices(&self) -> Vec<(String, Arc<dyn Device>)> {
        self.devices.read().await.clone()
    }
}
