use std::time::Duration;
use tracing::{debug, info};

use super::runtime::DeviceRuntime;
use crate::hub::core::state::ConnectionState;

/// 设备后台轮询任务
///
/// 状态离开 CONNECTED 后退出。每轮依次：检查连接、取一条推送消息、
/// 到期时拉取数据，然后让出 `tick`。
pub(crate) async fn poll_device(runtime: DeviceRuntime, tick: Duration) {
    let host = runtime.connector.host().to_string();
    let port = runtime.connector.port();
    info!(host = %host, port, "轮询任务启动");

    loop {
        {
            let _ops = runtime.lock_ops().await;

            if runtime.state().await.stops_polling() {
                break;
            }

            if !runtime.connector.is_connected().await {
                runtime.set_state(ConnectionState::Disconnected).await;
                break;
            }

            if let Some(message) = runtime.connector.get_message().await {
                runtime.handle_message(message).await;
            }

            if runtime.poll_due().await {
                runtime.fetch_data().await;
                runtime.mark_polled().await;
            }

            if runtime.state().await.stops_polling() {
                break;
            }
        }

        tokio::time::sleep(tick).await;
    }

    debug!(host = %host, port, "轮询任务退出: {}", runtime.state().await);
}
