use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::retry::RetryConfig;
use crate::hub::core::state::ConnectionState;
use crate::hub::core::status::{Properties, Response};
use crate::hub::core::traits::{Connector, Transport};

pub const STATUS_KEY: &str = "status";

/// 基于 [`Transport`] 的连接器
///
/// 只维护一个已连接标志；设备状态机在 `BaseDevice` 中。
pub struct EndpointConnector<T: Transport> {
    host: String,
    port: u16,
    transport: Arc<T>,
    retry: RetryConfig,
    connected: AtomicBool,
}

impl<T: Transport> EndpointConnector<T> {
    pub fn new(host: impl Into<String>, port: u16, transport: Arc<T>, retry: RetryConfig) -> Self {
        Self {
            host: host.into(),
            port,
            transport,
            retry,
            connected: AtomicBool::new(false),
        }
    }

    /// 底层传输
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    fn disconnected_response() -> Response {
        Response::unavailable("Device is disconnected")
            .with(STATUS_KEY, ConnectionState::Disconnected.to_string())
    }
}

#[async_trait]
impl<T: Transport + 'static> Connector for EndpointConnector<T> {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn connect(&self) -> Response {
        match self.transport.handshake().await {
            Ok(response) if response.is_ok() => {
                self.connected.store(true, Ordering::SeqCst);
                info!(host = %self.host, port = self.port, "连接器已连接");
                response
            }
            Ok(response) => {
                warn!(host = %self.host, port = self.port, "握手被拒绝: {:?}", response.message);
                let message = response
                    .message
                    .clone()
                    .unwrap_or_else(|| "Device rejected handshake".to_string());
                Response::unavailable(message).merge(response.payload)
            }
            Err(e) => {
                warn!(host = %self.host, port = self.port, "握手失败: {}", e);
                Response::unavailable(e.to_string())
            }
        }
    }

    async fn disconnect(&self) -> Response {
        let result = self.transport.farewell().await;
        self.connected.store(false, Ordering::SeqCst);

        match result {
            Ok(response) if response.is_ok() => {
                info!(host = %self.host, port = self.port, "连接器已断开");
                response
            }
            Ok(response) => {
                let message = response
                    .message
                    .clone()
                    .unwrap_or_else(|| "Device is already disconnected".to_string());
                Response::unavailable(message).merge(response.payload)
            }
            Err(e) => Response::unavailable(e.to_string()),
        }
    }

    async fn send_message(&self, command: Properties) -> Response {
        if !self.connected.load(Ordering::SeqCst) {
            debug!(host = %self.host, port = self.port, "未连接，跳过发送");
            return Self::disconnected_response();
        }

        let transport = Arc::clone(&self.transport);
        let result = self
            .retry
            .execute(|| {
                let transport = Arc::clone(&transport);
                let command = command.clone();
                async move { transport.exchange(&command).await }
            })
            .await;

        match result {
            Ok(response) => response,
            Err(e) => {
                warn!(host = %self.host, port = self.port, "发送失败，放弃: {}", e);
                Response::unavailable(e.to_string())
            }
        }
    }

    async fn get_message(&self) -> Option<Response> {
        if !self.connected.load(Ordering::SeqCst) {
            return None;
        }
        self.transport.poll_inbound().await
    }

    async fn has_message(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.transport.has_inbound().await
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
