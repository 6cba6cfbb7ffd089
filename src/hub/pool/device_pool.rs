//! 设备池实现
//!
//! 同类型设备的组合，对外提供和单个设备相同的接口：
//! 操作并发分发给所有成员，等待全部完成后汇总。

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::hub::config::PoolConfig;
use crate::hub::core::state::{ConnectionState, DeviceType};
use crate::hub::core::status::{Properties, Response, StatusCode};
use crate::hub::core::traits::{Device, DeviceRegistry};
use crate::hub::device::{DEVICE_TYPE_KEY, UPDATE_TIME_KEY};
use crate::hub::registry::ID_KEY;

pub const RESPONSES_KEY: &str = "responses";
pub const METRICS_KEY: &str = "metrics";
pub const DEVICES_KEY: &str = "devices";
pub const ADD_KEY: &str = "add";
pub const REMOVE_KEY: &str = "remove";

type Member = (String, Arc<dyn Device>);

/// 设备池
pub struct DevicePool {
    /// 成员类型
    device_type: DeviceType,

    /// 有序的成员列表
    members: RwLock<Vec<Member>>,

    /// 添加成员时用于解析 id
    registry: Arc<dyn DeviceRegistry>,

    /// 配置
    config: PoolConfig,
}

impl DevicePool {
    /// 创建设备池，任一成员类型不一致时失败
    pub fn new(
        members: Vec<Member>,
        device_type: DeviceType,
        registry: Arc<dyn DeviceRegistry>,
    ) -> Result<Self> {
        if let Some((id, _)) = members.iter().find(|(_, d)| d.is_pool()) {
            warn!(device = %id, "设备池成员不能是设备池");
            return Err(AppError::NestedPool(id.clone()));
        }
        if let Some((id, device)) = members.iter().find(|(_, d)| d.device_type() != device_type) {
            warn!(device = %id, "设备池成员类型不一致");
            return Err(AppError::TypeMismatch {
                expected: device_type,
                found: device.device_type(),
            });
        }

        Ok(Self {
            device_type,
            members: RwLock::new(members),
            registry,
            config: PoolConfig::default(),
        })
    }

    /// 从注册表按 id 解析成员并创建设备池
    pub async fn from_registry(
        ids: &[String],
        device_type: DeviceType,
        registry: Arc<dyn DeviceRegistry>,
    ) -> Result<Self> {
        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            let device = registry
                .get_device(id)
                .await
                .ok_or_else(|| AppError::DeviceNotFound(id.clone()))?;
            members.push((id.clone(), device));
        }
        Self::new(members, device_type, registry)
    }

    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// 当前成员 id（按顺序）
    pub async fn member_ids(&self) -> Vec<String> {
        self.members.read().await.iter().map(|(id, _)| id.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    async fn snapshot(&self) -> Vec<Member> {
        self.members.read().await.clone()
    }

    async fn run_member<Fut>(timeout: Option<Duration>, id: &str, operation: Fut) -> Response
    where
        Fut: Future<Output = Response>,
    {
        match timeout {
            None => operation.await,
            Some(limit) => match tokio::time::timeout(limit, operation).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(device = %id, "设备池成员超时: {:?}", limit);
                    Response::unavailable(format!("Device {} did not respond in time", id))
                }
            },
        }
    }

    /// 把同一操作并发分发给所有成员，结果按成员顺序带上 id
    async fn fan_out<F, Fut>(&self, operation: &str, f: F) -> Response
    where
        F: Fn(Arc<dyn Device>) -> Fut,
        Fut: Future<Output = Response>,
    {
        let members = self.snapshot().await;
        let timeout = self.config.member_timeout();
        debug!(operation, members = members.len(), "设备池分发操作");

        let results = join_all(members.iter().map(|(id, device)| {
            let fut = f(Arc::clone(device));
            async move { (id.as_str(), Self::run_member(timeout, id, fut).await) }
        }))
        .await;

        let all_ok = results.iter().all(|(_, response)| response.is_ok());
        let entries: Vec<Value> = results
            .into_iter()
            .map(|(id, response)| {
                let mut entry = response.into_entry();
                entry.insert(ID_KEY.to_string(), Value::String(id.to_string()));
                Value::Object(entry)
            })
            .collect();

        let aggregate = if all_ok {
            Response::success()
        } else {
            warn!(operation, "设备池部分成员失败");
            Response::failed(StatusCode::Error, "One or more devices failed")
        };
        aggregate.with(RESPONSES_KEY, entries)
    }

    fn parse_ids(properties: &Properties, key: &str) -> std::result::Result<Vec<String>, Response> {
        match properties.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| {
                    value.as_str().map(str::to_string).ok_or_else(|| {
                        Response::failed(StatusCode::BadRequest, format!("{} must contain device ids", key))
                    })
                })
                .collect(),
            Some(_) => Err(Response::failed(
                StatusCode::BadRequest,
                format!("{} must be a list of device ids", key),
            )),
        }
    }

    /// 校验并执行成员增删；任一校验失败时成员列表不变
    async fn edit_membership(&self, properties: &Properties) -> Response {
        let to_add = match Self::parse_ids(properties, ADD_KEY) {
            Ok(ids) => ids,
            Err(response) => return response,
        };
        let to_remove = match Self::parse_ids(properties, REMOVE_KEY) {
            Ok(ids) => ids,
            Err(response) => return response,
        };

        let mut members = self.members.write().await;

        let mut resolved = Vec::with_capacity(to_add.len());
        for id in &to_add {
            let Some(device) = self.registry.get_device(id).await else {
                return AppError::DeviceNotFound(id.clone()).into();
            };
            if device.is_pool() {
                warn!(device = %id, "拒绝把设备池加入设备池");
                return AppError::NestedPool(id.clone()).into();
            }
            if device.device_type() != self.device_type {
                return AppError::TypeMismatch {
                    expected: self.device_type,
                    found: device.device_type(),
                }
                .into();
            }
            resolved.push((id.clone(), device));
        }

        for id in &to_remove {
            if !members.iter().any(|(member_id, _)| member_id == id) {
                return Response::failed(
                    StatusCode::UnprocessableEntity,
                    format!("Device {} is not a member of the pool", id),
                );
            }
        }

        members.retain(|(id, _)| !to_remove.contains(id));
        members.extend(resolved);

        if !to_add.is_empty() || !to_remove.is_empty() {
            info!(added = ?to_add, removed = ?to_remove, "设备池成员已更新");
        }

        let ids: Vec<String> = members.iter().map(|(id, _)| id.clone()).collect();
        Response::success().with(DEVICES_KEY, ids)
    }
}

#[async_trait]
impl Device for DevicePool {
    async fn connect(&self) -> Response {
        self.fan_out("connect", |device| async move { device.connect().await })
            .await
    }

    async fn disconnect(&self) -> Response {
        self.fan_out("disconnect", |device| async move { device.disconnect().await })
            .await
    }

    async fn power_off(&self) -> Response {
        self.fan_out("power_off", |device| async move { device.power_off().await })
            .await
    }

    async fn reboot(&self) -> Response {
        self.fan_out("reboot", |device| async move { device.reboot().await })
            .await
    }

    async fn execute(&self, command: Properties) -> Response {
        self.fan_out("execute", |device| {
            let command = command.clone();
            async move { device.execute(command).await }
        })
        .await
    }

    async fn get_data(&self) -> Response {
        self.fan_out("get_data", |device| async move { device.get_data().await })
            .await
    }

    async fn get_status(&self) -> Response {
        self.fan_out("get_status", |device| async move { device.get_status().await })
            .await
    }

    /// 顺序：空请求拒绝 -> 广播轮询间隔 -> 校验 add -> 校验 remove -> 删除 -> 添加
    ///
    /// 广播先于成员校验执行，成员校验失败时已广播的间隔不会回滚。
    async fn update(&self, properties: Properties) -> Response {
        if properties.is_empty() {
            return Response::failed(StatusCode::BadRequest, "Empty update request");
        }

        let mut broadcast = None;
        if let Some(value) = properties.get(UPDATE_TIME_KEY) {
            let mut command = Properties::new();
            command.insert(UPDATE_TIME_KEY.to_string(), value.clone());
            let aggregate = self
                .fan_out("update", |device| {
                    let command = command.clone();
                    async move { device.update(command).await }
                })
                .await;
            if !aggregate.is_ok() {
                return aggregate;
            }
            broadcast = aggregate.get(RESPONSES_KEY).cloned();
        }

        let response = self.edit_membership(&properties).await;
        match broadcast {
            Some(entries) if response.is_ok() => response.with(RESPONSES_KEY, entries),
            _ => response,
        }
    }

    async fn get_metrics(&self) -> Vec<Value> {
        let members = self.snapshot().await;
        join_all(members.iter().map(|(id, device)| async move {
            json!({ ID_KEY: id, METRICS_KEY: device.get_metrics().await })
        }))
        .await
    }

    async fn to_json(&self) -> Value {
        json!({
            DEVICES_KEY: self.member_ids().await,
            DEVICE_TYPE_KEY: self.device_type.to_string(),
        })
    }

    async fn get_state(&self) -> ConnectionState {
        ConnectionState::Connected
    }

    fn device_type(&self) -> DeviceType {
        self.device_type
    }

    fn is_pool(&self) -> bool {
        true
    }
}
