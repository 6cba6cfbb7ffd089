//! 模拟设备端点
//!
//! 没有真实硬件时，每个设备连接一个模拟端点。端点维护开关状态，
//! RGB 灯额外维护颜色，颜色变化时会主动推送一条 `data` 消息。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::debug;

use crate::hub::core::state::{DeviceAction, DeviceType};
use crate::hub::core::status::{Properties, Response, StatusCode};
use crate::hub::core::traits::{Transport, TransportError};

pub const ACTION_KEY: &str = "action";
pub const STATE_KEY: &str = "state";
pub const DATA_KEY: &str = "data";
pub const COLOR_KEY: &str = "color";

/// 模拟端点的开关状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    fn parse(value: &Value) -> Option<Self> {
        match value.as_str()?.to_ascii_lowercase().as_str() {
            "on" => Some(PowerState::On),
            "off" => Some(PowerState::Off),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        }
    }
}

struct EndpointState {
    online: bool,
    session: bool,
    power: PowerState,
    color: Option<String>,
    inbox: VecDeque<Response>,
}

/// 模拟设备端点
pub struct SimulatedEndpoint {
    device_type: DeviceType,
    state: Mutex<EndpointState>,
}

impl SimulatedEndpoint {
    pub fn new(device_type: DeviceType) -> Self {
        let color = match device_type {
            DeviceType::RgbLamp => Some("FFFFFF".to_string()),
            _ => None,
        };

        Self {
            device_type,
            state: Mutex::new(EndpointState {
                online: true,
                session: false,
                power: PowerState::Off,
                color,
                inbox: VecDeque::new(),
            }),
        }
    }

    /// 设置端点是否在线；离线时拒绝握手
    pub async fn set_online(&self, online: bool) {
        self.state.lock().await.online = online;
    }

    /// 模拟设备主动推送消息
    pub async fn push(&self, message: Response) {
        self.state.lock().await.inbox.push_back(message);
    }

    pub async fn power(&self) -> PowerState {
        self.state.lock().await.power
    }

    pub async fn color(&self) -> Option<String> {
        self.state.lock().await.color.clone()
    }

    fn snapshot(state: &EndpointState) -> Value {
        let mut data = json!({ STATE_KEY: state.power.as_str() });
        if let Some(color) = &state.color {
            data[COLOR_KEY] = Value::String(color.clone());
        }
        data
    }

    fn respond(&self, state: &mut EndpointState, command: &Properties) -> Response {
        if self.device_type == DeviceType::RgbLamp {
            if let Some(color) = command.get(COLOR_KEY) {
                let Some(color) = color.as_str() else {
                    return Response::failed(StatusCode::BadRequest, "invalid color type");
                };
                state.color = Some(color.to_string());
                let pushed = Response::success()
                    .with(ACTION_KEY, DeviceAction::Data.as_str())
                    .with(DATA_KEY, Self::snapshot(state));
                state.inbox.push_back(pushed);
            }
        }

        let action = command
            .get(ACTION_KEY)
            .and_then(Value::as_str)
            .and_then(|a| a.parse::<DeviceAction>().ok());
        let power = command.get(STATE_KEY).and_then(PowerState::parse);

        if let Some(power) = power {
            state.power = power;
            let mut response = Response::success().with(STATE_KEY, power.as_str());
            if let Some(color) = &state.color {
                response = response.with(COLOR_KEY, color.clone());
            }
            return response;
        }

        match action {
            Some(DeviceAction::GetData) => Response::success()
                .with(ACTION_KEY, DeviceAction::GetData.as_str())
                .with(DATA_KEY, Self::snapshot(state)),
            Some(DeviceAction::GetStatus) => Response::success()
                .with(ACTION_KEY, DeviceAction::GetStatus.as_str())
                .with(STATE_KEY, state.power.as_str()),
            Some(DeviceAction::PowerOff) => {
                state.power = PowerState::Off;
                Response::success().with(ACTION_KEY, DeviceAction::PowerOff.as_str())
            }
            Some(action) => Response::success().with(ACTION_KEY, action.as_str()),
            None if command.contains_key(COLOR_KEY) && state.color.is_some() => {
                Response::success().with(COLOR_KEY, state.color.clone().unwrap_or_default())
            }
            None => Response::failed(StatusCode::UnprocessableEntity, "Invalid request"),
        }
    }
}

#[async_trait]
impl Transport for SimulatedEndpoint {
    async fn handshake(&self) -> Result<Response, TransportError> {
        let mut state = self.state.lock().await;
        if !state.online {
            return Ok(Response::failed(StatusCode::Unavailable, "Device rejected handshake"));
        }
        state.session = true;
        Ok(Response::success().with(ACTION_KEY, "connected"))
    }

    async fn farewell(&self) -> Result<Response, TransportError> {
        let mut state = self.state.lock().await;
        if !state.session {
            return Ok(Response::failed(StatusCode::Unavailable, "Device is already disconnected"));
        }
        state.session = false;
        Ok(Response::success().with(ACTION_KEY, "disconnected"))
    }

    async fn exchange(&self, command: &Properties) -> Result<Response, TransportError> {
        let mut state = self.state.lock().await;
        if !state.session {
            return Err(TransportError::Closed);
        }
        let response = self.respond(&mut state, command);
        debug!(device_type = %self.device_type, "模拟端点回复: {:?}", response);
        Ok(response)
    }

    async fn poll_inbound(&self) -> Option<Response> {
        self.state.lock().await.inbox.pop_front()
    }

    async fn has_inbound(&self) -> bool {
        !self.state.lock().await.inbox.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_exchange_requires_session() {
        let endpoint = SimulatedEndpoint::new(DeviceType::Door);

        let result = endpoint.exchange(&command(json!({ "action": "get_data" }))).await;
        assert_eq!(result, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn test_state_change_and_data() {
        let endpoint = SimulatedEndpoint::new(DeviceType::Window);
        endpoint.handshake().await.unwrap();

        let response = endpoint.exchange(&command(json!({ "state": "ON" }))).await.unwrap();
        assert!(response.is_ok());
        assert_eq!(endpoint.power().await, PowerState::On);

        let data = endpoint.exchange(&command(json!({ "action": "get_data" }))).await.unwrap();
        assert_eq!(data.get(DATA_KEY).unwrap()[STATE_KEY], "on");
    }

    #[tokio::test]
    async fn test_color_change_pushes_message() {
        let endpoint = SimulatedEndpoint::new(DeviceType::RgbLamp);
        endpoint.handshake().await.unwrap();

        let response = endpoint
            .exchange(&command(json!({ "color": "00FF00", "state": "on" })))
            .await
            .unwrap();
        assert_eq!(response.get_str(COLOR_KEY), Some("00FF00"));
        assert!(endpoint.has_inbound().await);

        let pushed = endpoint.poll_inbound().await.unwrap();
        assert_eq!(pushed.get_str(ACTION_KEY), Some("data"));
        assert_eq!(pushed.get(DATA_KEY).unwrap()[COLOR_KEY], "00FF00");
    }

    #[tokio::test]
    async fn test_unknown_command_rejected() {
        let endpoint = SimulatedEndpoint::new(DeviceType::Door);
        endpoint.handshake().await.unwrap();

        let response = endpoint.exchange(&command(json!({ "foo": 1 }))).await.unwrap();
        assert_eq!(response.code, StatusCode::UnprocessableEntity);
    }

    #[tokio::test]
    async fn test_offline_rejects_handshake_and_double_farewell_fails() {
        let endpoint = SimulatedEndpoint::new(DeviceType::Lamp);
        endpoint.set_online(false).await;
        assert!(!endpoint.handshake().await.unwrap().is_ok());

        endpoint.set_online(true).await;
        assert!(endpoint.handshake().await.unwrap().is_ok());
        assert!(endpoint.farewell().await.unwrap().is_ok());
        assert!(!endpoint.farewell().await.unwrap().is_ok());
    }
}
