use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::factory::{DEVICE_TYPE_KEY, DeviceSpec};
use super::kinds::DeviceKind;
use super::polling;
use super::runtime::{DeviceRuntime, action_command};
use crate::error::AppError;
use crate::hub::config::DeviceConfig;
use crate::hub::connector::{ACTION_KEY, STATUS_KEY};
use crate::hub::core::state::{ConnectionState, DeviceAction, DeviceType};
use crate::hub::core::status::{Properties, Response, StatusCode};
use crate::hub::core::traits::{Connector, Device};

pub const HOST_KEY: &str = "host";
pub const PORT_KEY: &str = "port";
pub const UPDATE_TIME_KEY: &str = "update_time";

/// 校验轮询间隔：整数秒，范围 `0..=max_update_time`
pub(crate) fn parse_update_time(value: &Value, max_update_time: i64) -> Result<i64, AppError> {
    let seconds = value
        .as_i64()
        .ok_or_else(|| AppError::InvalidProperties(format!("{} must be an integer", UPDATE_TIME_KEY)))?;

    if !(0..=max_update_time).contains(&seconds) {
        return Err(AppError::InvalidProperties(format!(
            "{} must be in 0..={} seconds, got {}",
            UPDATE_TIME_KEY, max_update_time, seconds
        )));
    }
    Ok(seconds)
}

/// 单个设备：一个连接器、一个状态机、一个后台轮询任务
pub struct BaseDevice {
    host: String,
    port: u16,
    kind: Arc<dyn DeviceKind>,
    runtime: DeviceRuntime,
    config: DeviceConfig,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl BaseDevice {
    pub fn new(
        spec: DeviceSpec,
        kind: Arc<dyn DeviceKind>,
        connector: Arc<dyn Connector>,
        config: DeviceConfig,
    ) -> Self {
        let runtime = DeviceRuntime::new(connector, spec.update_time, config.metrics_capacity);
        Self {
            host: spec.host,
            port: spec.port,
            kind,
            runtime,
            config,
            poll_task: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn update_time(&self) -> i64 {
        self.runtime.update_time().await
    }

    /// 取消旧的轮询任务并启动新的
    async fn restart_polling(&self) {
        let mut task = self.poll_task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
            let _ = previous.await;
            debug!(host = %self.host, port = self.port, "旧轮询任务已取消");
        }

        self.runtime.reset_poll_timer().await;
        *task = Some(tokio::spawn(polling::poll_device(
            self.runtime.clone(),
            self.config.poll_tick(),
        )));
    }

    async fn cancel_polling(&self) {
        if let Some(task) = self.poll_task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }
    }

    async fn connect_locked(&self) -> Response {
        let response = self.runtime.connector.connect().await;
        if response.is_ok() {
            self.runtime.set_state(ConnectionState::Connected).await;
            self.restart_polling().await;
            info!(host = %self.host, port = self.port, "设备已连接");
        } else {
            warn!(host = %self.host, port = self.port, "设备连接失败: {:?}", response.message);
        }
        response
    }

    async fn disconnect_locked(&self) -> Response {
        let response = self.runtime.connector.disconnect().await;
        if response.is_ok() {
            self.runtime.set_state(ConnectionState::Disconnected).await;
            info!(host = %self.host, port = self.port, "设备已断开");
        } else {
            warn!(host = %self.host, port = self.port, "设备断开失败: {:?}", response.message);
            self.runtime.set_state(ConnectionState::Error).await;
        }
        response
    }

    async fn send_action_locked(&self, action: DeviceAction) -> Response {
        self.runtime.connector.send_message(action_command(action)).await
    }
}

#[async_trait]
impl Device for BaseDevice {
    async fn connect(&self) -> Response {
        let _ops = self.runtime.lock_ops().await;
        self.connect_locked().await
    }

    async fn disconnect(&self) -> Response {
        let _ops = self.runtime.lock_ops().await;
        self.disconnect_locked().await
    }

    async fn power_off(&self) -> Response {
        let _ops = self.runtime.lock_ops().await;

        let response = self.send_action_locked(DeviceAction::PowerOff).await;
        if !response.is_ok() {
            return response;
        }

        let response = self.disconnect_locked().await;
        if response.is_ok() {
            self.runtime.set_state(ConnectionState::SwitchedOff).await;
        }
        response
    }

    async fn reboot(&self) -> Response {
        let _ops = self.runtime.lock_ops().await;

        let response = self.send_action_locked(DeviceAction::Reboot).await;
        if !response.is_ok() {
            return response;
        }

        let response = self.disconnect_locked().await;
        if !response.is_ok() {
            return response;
        }
        self.connect_locked().await
    }

    async fn execute(&self, command: Properties) -> Response {
        let validation = self.kind.validate_command(&command);
        if !validation.is_ok() {
            return validation;
        }

        let _ops = self.runtime.lock_ops().await;
        self.runtime.connector.send_message(command).await
    }

    async fn get_data(&self) -> Response {
        let _ops = self.runtime.lock_ops().await;
        self.runtime.fetch_data().await
    }

    async fn get_status(&self) -> Response {
        let _ops = self.runtime.lock_ops().await;
        let mut response = self.send_action_locked(DeviceAction::GetStatus).await;
        response.remove(ACTION_KEY);
        response
    }

    async fn update(&self, properties: Properties) -> Response {
        let Some(value) = properties.get(UPDATE_TIME_KEY) else {
            return Response::failed(
                StatusCode::BadRequest,
                format!("{} field is required", UPDATE_TIME_KEY),
            );
        };

        match parse_update_time(value, self.config.max_update_time) {
            Ok(seconds) => {
                let _ops = self.runtime.lock_ops().await;
                self.runtime.set_update_time(seconds).await;
                debug!(host = %self.host, port = self.port, "轮询间隔更新为 {} 秒", seconds);
                Response::success().with(UPDATE_TIME_KEY, seconds)
            }
            Err(e) => e.into(),
        }
    }

    async fn get_metrics(&self) -> Vec<Value> {
        self.runtime.metrics_json().await
    }

    async fn to_json(&self) -> Value {
        json!({
            HOST_KEY: self.host,
            PORT_KEY: self.port,
            UPDATE_TIME_KEY: self.runtime.update_time().await,
            STATUS_KEY: self.runtime.state().await.to_string(),
            DEVICE_TYPE_KEY: self.kind.device_type().to_string(),
        })
    }

    async fn get_state(&self) -> ConnectionState {
        self.runtime.state().await
    }

    fn device_type(&self) -> DeviceType {
        self.kind.device_type()
    }

    async fn release(&self) {
        self.cancel_polling().await;
        debug!(host = %self.host, port = self.port, "设备资源已释放");
    }
}

impl Drop for BaseDevice {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::connector::testing::ScriptedTransport;
    use crate::hub::connector::{EndpointConnector, RetryConfig};
    use crate::hub::core::traits::TransportError;
    use crate::hub::device::kinds::{RgbLampKind, StandardKind};
    use std::time::Duration;

    fn scripted_with(kind: Arc<dyn DeviceKind>, update_time: i64) -> (BaseDevice, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        let connector = Arc::new(EndpointConnector::new(
            "h",
            80,
            Arc::clone(&transport),
            RetryConfig::default(),
        ));
        let device = BaseDevice::new(
            DeviceSpec::new("h", 80).with_update_time(update_time),
            kind,
            connector,
            DeviceConfig::default(),
        );
        (device, transport)
    }

    fn scripted(update_time: i64) -> (BaseDevice, Arc<ScriptedTransport>) {
        scripted_with(Arc::new(StandardKind::new(DeviceType::Lamp)), update_time)
    }

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_connect_disconnect_lifecycle() {
        let (device, _) = scripted(0);
        assert_eq!(device.get_state().await, ConnectionState::Disconnected);

        let response = device.connect().await;
        assert!(response.is_ok());
        assert_eq!(device.get_state().await, ConnectionState::Connected);

        let response = device.disconnect().await;
        assert!(response.is_ok());
        assert_eq!(device.get_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_state() {
        let (device, transport) = scripted(0);
        transport.reject_handshake();

        let response = device.connect().await;
        assert!(!response.is_ok());
        assert_eq!(response.code, StatusCode::Unavailable);
        assert_eq!(device.get_state().await, ConnectionState::Disconnected);
        assert!(device.poll_task.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_disconnect_sets_error() {
        let (device, _) = scripted(0);

        let response = device.disconnect().await;
        assert!(!response.is_ok());
        assert_eq!(device.get_state().await, ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_metrics_keep_latest_hundred() {
        let (device, _) = scripted(0);
        device.connect().await;

        for _ in 0..130 {
            assert!(device.get_data().await.is_ok());
        }

        let metrics = device.get_metrics().await;
        assert_eq!(metrics.len(), 100);
        assert_eq!(metrics[0]["data"]["sample"], 30);
        assert_eq!(metrics[99]["data"]["sample"], 129);
        assert!(metrics[0].get("internal_status").is_none());
        assert!(metrics[0].get("action").is_none());
    }

    #[tokio::test]
    async fn test_get_data_failure_sets_error() {
        let (device, transport) = scripted(0);
        device.connect().await;
        transport.fail_always(TransportError::Transient("timeout".to_string()));

        let response = device.get_data().await;
        assert_eq!(response.code, StatusCode::Unavailable);
        assert_eq!(device.get_state().await, ConnectionState::Error);
        assert_eq!(device.get_metrics().await.len(), 1);
    }

    #[tokio::test]
    async fn test_get_data_on_dropped_link_sets_disconnected() {
        let (device, _) = scripted(0);
        device.connect().await;
        device.runtime.connector.disconnect().await;

        let response = device.get_data().await;
        assert_eq!(response.get_str(STATUS_KEY), Some("disconnected"));
        assert_eq!(device.get_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_get_data_error_reply_sets_error() {
        let (device, transport) = scripted(0);
        device.connect().await;
        transport.reply_to_data(
            Response::failed(StatusCode::Error, "sensor fault").with(STATUS_KEY, "error"),
        );

        let response = device.get_data().await;
        assert_eq!(response.code, StatusCode::Error);
        assert_eq!(device.get_state().await, ConnectionState::Error);

        let metrics = device.get_metrics().await;
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0]["message"], "sensor fault");
    }

    #[tokio::test]
    async fn test_get_data_disconnected_reply_sets_disconnected() {
        let (device, transport) = scripted(0);
        device.connect().await;
        transport.reply_to_data(
            Response::unavailable("link lost").with(STATUS_KEY, "disconnected"),
        );

        device.get_data().await;
        assert_eq!(device.get_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_power_off_switches_off() {
        let (device, _) = scripted(0);
        device.connect().await;

        let response = device.power_off().await;
        assert!(response.is_ok());
        assert_eq!(device.get_state().await, ConnectionState::SwitchedOff);
    }

    #[tokio::test]
    async fn test_power_off_on_disconnected_device() {
        let (device, _) = scripted(0);

        let response = device.power_off().await;
        assert_eq!(response.code, StatusCode::Unavailable);
        assert_eq!(device.get_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reboot_reconnects() {
        let (device, transport) = scripted(0);
        device.connect().await;

        let response = device.reboot().await;
        assert!(response.is_ok());
        assert_eq!(device.get_state().await, ConnectionState::Connected);
        assert_eq!(transport.exchange_count(), 1);
    }

    #[tokio::test]
    async fn test_reboot_propagates_send_failure() {
        let (device, transport) = scripted(0);
        device.connect().await;
        transport.fail_always(TransportError::Rejected("busy".to_string()));

        let response = device.reboot().await;
        assert!(!response.is_ok());
        assert_eq!(device.get_state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_execute_validates_before_sending() {
        let (device, transport) = scripted_with(Arc::new(RgbLampKind), 0);
        device.connect().await;

        let rejected = device.execute(props(json!({ "color": "nope" }))).await;
        assert_eq!(rejected.code, StatusCode::BadRequest);
        assert_eq!(transport.exchange_count(), 0);

        let accepted = device.execute(props(json!({ "color": "00FF00" }))).await;
        assert!(accepted.is_ok());
        assert_eq!(transport.exchange_count(), 1);
    }

    #[tokio::test]
    async fn test_update_poll_interval() {
        let (device, _) = scripted(0);

        let response = device.update(props(json!({ "update_time": 30 }))).await;
        assert!(response.is_ok());
        assert_eq!(response.get(UPDATE_TIME_KEY), Some(&json!(30)));
        assert_eq!(device.update_time().await, 30);

        let missing = device.update(Properties::new()).await;
        assert_eq!(missing.code, StatusCode::BadRequest);

        let negative = device.update(props(json!({ "update_time": -5 }))).await;
        assert_eq!(negative.code, StatusCode::BadRequest);

        let too_long = device.update(props(json!({ "update_time": 604801 }))).await;
        assert_eq!(too_long.code, StatusCode::BadRequest);
        assert_eq!(device.update_time().await, 30);
    }

    #[tokio::test]
    async fn test_to_json_fields() {
        let (device, _) = scripted(7);
        let value = device.to_json().await;

        assert_eq!(value["host"], "h");
        assert_eq!(value["port"], 80);
        assert_eq!(value["update_time"], 7);
        assert_eq!(value["status"], "disconnected");
        assert_eq!(value["device_type"], "lamp");
    }

    #[tokio::test]
    async fn test_periodic_polling_records_metrics() {
        let (device, _) = scripted(1);
        device.connect().await;

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(device.get_metrics().await.len() >= 2);
        assert_eq!(device.get_state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_zero_interval_disables_polling() {
        let (device, transport) = scripted(0);
        device.connect().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(device.get_metrics().await.is_empty());
        assert_eq!(transport.exchange_count(), 0);
    }

    #[tokio::test]
    async fn test_pushed_data_is_recorded() {
        let (device, transport) = scripted(0);
        transport.push_inbound(
            Response::success()
                .with("action", "data")
                .with("data", json!({ "state": "on" })),
        );
        device.connect().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        let metrics = device.get_metrics().await;
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0]["data"]["state"], "on");
        assert_eq!(device.get_state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_pushed_error_stops_polling() {
        let (device, transport) = scripted(0);
        transport.push_inbound(Response::failed(StatusCode::Error, "sensor fault"));
        device.connect().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(device.get_state().await, ConnectionState::Error);
        let task = device.poll_task.lock().await;
        assert!(task.as_ref().is_some_and(|t| t.is_finished()));
    }

    #[tokio::test]
    async fn test_loop_exits_when_link_drops() {
        let (device, _) = scripted(0);
        device.connect().await;
        device.runtime.connector.disconnect().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(device.get_state().await, ConnectionState::Disconnected);
        let task = device.poll_task.lock().await;
        assert!(task.as_ref().is_some_and(|t| t.is_finished()));
    }

    #[tokio::test]
    async fn test_reconnect_replaces_polling_loop() {
        let (device, _) = scripted(0);
        device.connect().await;
        let first = device
            .poll_task
            .lock()
            .await
            .as_ref()
            .map(|t| t.abort_handle())
            .unwrap();

        device.connect().await;
        assert!(first.is_finished());

        let task = device.poll_task.lock().await;
        assert!(task.as_ref().is_some_and(|t| !t.is_finished()));
    }

    #[tokio::test]
    async fn test_release_cancels_polling() {
        let (device, _) = scripted(0);
        device.connect().await;

        device.release().await;
        assert!(device.poll_task.lock().await.is_none());
    }
}
