use anyhow::Context as _;
use serde_json::json;
use tracing::{error, info};

use smarthouse_rs::context::{Context, IContext};
use smarthouse_rs::hub::{Device, DeviceRegistry, DeviceType, HubConfig};
use smarthouse_rs::logger::init_logging;

const CONFIG_PATH: &str = "config/hub.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = HubConfig::load_or_default(CONFIG_PATH).context("加载配置失败")?;

    // guard 必须活到进程退出
    let _guard = init_logging(&config.logging)?;

    info!("启动 smarthouse 设备服务...");

    let ctx = Context::new(config);

    let mut ids = Vec::new();
    for port in [8001u16, 8002] {
        let request = json!({
            "device_type": DeviceType::Door.as_str(),
            "device_properties": { "host": "localhost", "port": port, "update_time": 5 }
        });
        let Some(request) = request.as_object() else {
            continue;
        };

        let response = ctx.create_device(request).await;
        match response.get_str("id") {
            Some(id) if response.is_ok() => ids.push(id.to_string()),
            _ => error!("创建设备失败: {:?}", response.message),
        }
    }

    let (pool_id, pool) = ctx.create_pool(&ids, DeviceType::Door).await?;
    info!(pool = %pool_id, "设备池已创建: {}", pool.to_json().await);

    let response = pool.connect().await;
    info!("设备池连接结果: {}", response.to_json());

    for (id, device) in ctx.get_registry().list_devices().await {
        info!(device = %id, "{}", device.to_json().await);
    }

    tokio::signal::ctrl_c().await.context("等待退出信号失败")?;
    info!("收到退出信号，释放设备...");

    ctx.shutdown().await;
    Ok(())
}
