use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

use super::metrics::{Metric, MetricsHistory};
use crate::hub::connector::{ACTION_KEY, STATUS_KEY};
use crate::hub::core::state::{ConnectionState, DeviceAction};
use crate::hub::core::status::{Properties, Response};
use crate::hub::core::traits::Connector;

/// 设备运行时状态，轮询任务和外部调用共享
///
/// 所有会修改状态或历史数据的路径都先持有 `ops` 锁，
/// 同一设备上的操作因此按顺序执行。
#[derive(Clone)]
pub(crate) struct DeviceRuntime {
    pub connector: Arc<dyn Connector>,
    state: Arc<RwLock<ConnectionState>>,
    metrics: Arc<RwLock<MetricsHistory>>,
    update_time: Arc<RwLock<i64>>,
    last_poll: Arc<Mutex<Option<Instant>>>,
    ops: Arc<Mutex<()>>,
}

impl DeviceRuntime {
    pub fn new(connector: Arc<dyn Connector>, update_time: i64, metrics_capacity: usize) -> Self {
        Self {
            connector,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            metrics: Arc::new(RwLock::new(MetricsHistory::new(metrics_capacity))),
            update_time: Arc::new(RwLock::new(update_time)),
            last_poll: Arc::new(Mutex::new(None)),
            ops: Arc::new(Mutex::new(())),
        }
    }

    /// 获取操作锁
    pub async fn lock_ops(&self) -> MutexGuard<'_, ()> {
        self.ops.lock().await
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().await;
        if *state != next {
            debug!(
                host = %self.connector.host(),
                port = self.connector.port(),
                "状态变化: {} -> {}",
                *state,
                next
            );
            *state = next;
        }
    }

    pub async fn update_time(&self) -> i64 {
        *self.update_time.read().await
    }

    pub async fn set_update_time(&self, seconds: i64) {
        *self.update_time.write().await = seconds;
    }

    /// 记录一条历史数据
    pub async fn record_metric(&self, response: &Response) {
        self.metrics.write().await.push(Metric::from_response(response));
    }

    pub async fn metrics_json(&self) -> Vec<Value> {
        self.metrics.read().await.to_json()
    }

    /// 是否到了下一次定时拉取
    pub async fn poll_due(&self) -> bool {
        let interval = self.update_time().await;
        if interval <= 0 {
            return false;
        }
        match *self.last_poll.lock().await {
            None => true,
            Some(at) => at.elapsed() >= Duration::from_secs(interval as u64),
        }
    }

    pub async fn mark_polled(&self) {
        *self.last_poll.lock().await = Some(Instant::now());
    }

    /// 新的轮询任务启动后立即拉取一次
    pub async fn reset_poll_timer(&self) {
        *self.last_poll.lock().await = None;
    }

    /// 拉取数据快照；失败时进入 ERROR，回复明确表示已断开时进入 DISCONNECTED
    ///
    /// 调用方需持有操作锁。
    pub async fn fetch_data(&self) -> Response {
        let mut response = self.connector.send_message(action_command(DeviceAction::GetData)).await;
        response.remove(ACTION_KEY);

        if !response.is_ok() {
            let signalled = response
                .get_str(STATUS_KEY)
                .and_then(|s| s.parse::<ConnectionState>().ok());
            let next = match signalled {
                Some(ConnectionState::Disconnected) => ConnectionState::Disconnected,
                _ => ConnectionState::Error,
            };
            warn!(host = %self.connector.host(), "拉取数据失败: {:?}", response.message);
            self.set_state(next).await;
        }

        self.record_metric(&response).await;
        response
    }

    /// 处理一条设备推送消息
    ///
    /// 调用方需持有操作锁。
    pub async fn handle_message(&self, message: Response) {
        if !message.is_ok() {
            warn!(host = %self.connector.host(), "设备推送错误: {:?}", message.message);
            self.set_state(ConnectionState::Error).await;
            return;
        }

        self.set_state(ConnectionState::Connected).await;
        let action = message
            .get_str(ACTION_KEY)
            .and_then(|a| a.parse::<DeviceAction>().ok());
        if action.is_some_and(|a| a.carries_data()) {
            self.record_metric(&message).await;
        }
    }
}

/// 构造只带 `action` 字段的命令
pub(crate) fn action_command(action: DeviceAction) -> Properties {
    let mut command = Properties::new();
    command.insert(ACTION_KEY.to_string(), Value::String(action.as_str().to_string()));
    command
}
