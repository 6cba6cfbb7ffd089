use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::state::{ConnectionState, DeviceType};
use super::status::{Properties, Response};

/// 底层传输，可能返回错误；重试和状态语义由 [`Connector`] 负责
#[async_trait]
pub trait Transport: Send + Sync {
    /// 握手
    async fn handshake(&self) -> Result<Response, TransportError>;

    /// 结束会话
    async fn farewell(&self) -> Result<Response, TransportError>;

    /// 发送一条命令并等待回复
    async fn exchange(&self, command: &Properties) -> Result<Response, TransportError>;

    /// 取出一条设备主动推送的消息（非阻塞）
    async fn poll_inbound(&self) -> Option<Response>;

    /// 是否有待处理的推送消息
    async fn has_inbound(&self) -> bool;
}

/// 传输层错误
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("临时传输错误: {0}")]
    Transient(String),

    #[error("设备拒绝请求: {0}")]
    Rejected(String),

    #[error("连接已关闭")]
    Closed,
}

impl TransportError {
    /// 是否值得重试
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }
}

/// 点对点连接器，连接单个设备端点
#[async_trait]
pub trait Connector: Send + Sync {
    fn host(&self) -> &str;

    fn port(&self) -> u16;

    /// 建立会话；握手被拒绝时返回 UNAVAILABLE
    async fn connect(&self) -> Response;

    /// 断开会话
    async fn disconnect(&self) -> Response;

    /// 发送命令，临时错误会有限次重试
    async fn send_message(&self, command: Properties) -> Response;

    /// 非阻塞地取一条推送消息；未连接或没有消息时返回 None
    async fn get_message(&self) -> Option<Response>;

    async fn has_message(&self) -> bool;

    async fn is_connected(&self) -> bool;
}

/// 设备能力接口，单个设备和设备池都实现它
#[async_trait]
pub trait Device: Send + Sync {
    async fn connect(&self) -> Response;

    async fn disconnect(&self) -> Response;

    async fn power_off(&self) -> Response;

    async fn reboot(&self) -> Response;

    async fn execute(&self, command: Properties) -> Response;

    async fn get_data(&self) -> Response;

    async fn get_status(&self) -> Response;

    async fn update(&self, properties: Properties) -> Response;

    /// 历史数据（JSON 数组元素）
    async fn get_metrics(&self) -> Vec<Value>;

    async fn to_json(&self) -> Value;

    async fn get_state(&self) -> ConnectionState;

    fn device_type(&self) -> DeviceType;

    /// 从注册表移除前释放资源（取消轮询任务）
    async fn release(&self) {}

    /// 是否是设备组合（设备池不能作为另一个设备池的成员）
    fn is_pool(&self) -> bool {
        false
    }
}

/// 设备注册表（外部协作者）
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// 添加设备，成功时负载中带 `id`
    async fn add_device(&self, device: Arc<dyn Device>) -> Response;

    async fn get_device(&self, id: &str) -> Option<Arc<dyn Device>>;

    async fn delete_device(&self, id: &str) -> Response;

    /// 按插入顺序列出所有设备
    async fn list_devices(&self) -> Vec<(String, Arc<dyn Device>)>;
}
