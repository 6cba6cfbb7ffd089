//! 统一的结果封装
//!
//! 组件之间只通过 [`Response`] 传递结果，预期内的失败不会以错误的形式抛出。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON 属性集合（命令、设备属性、响应负载）
pub type Properties = Map<String, Value>;

pub const INTERNAL_STATUS_KEY: &str = "internal_status";
pub const EXTERNAL_STATUS_KEY: &str = "rest_status";
pub const MESSAGE_KEY: &str = "message";

/// 内部状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternalStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAIL")]
    Failed,
}

impl InternalStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, InternalStatus::Ok)
    }
}

/// 外部状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum StatusCode {
    Success,
    Created,
    NoContent,
    BadRequest,
    Unauthorised,
    Forbidden,
    NotFound,
    UnprocessableEntity,
    Error,
    Unavailable,
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Success => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorised => 401,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::UnprocessableEntity => 422,
            StatusCode::Error => 500,
            StatusCode::Unavailable => 503,
        }
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.as_u16()
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, String> {
        let code = match value {
            200 => StatusCode::Success,
            201 => StatusCode::Created,
            204 => StatusCode::NoContent,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorised,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            422 => StatusCode::UnprocessableEntity,
            500 => StatusCode::Error,
            503 => StatusCode::Unavailable,
            other => return Err(format!("未知状态码: {}", other)),
        };
        Ok(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// 结果封装：内部状态 + 外部状态码 + 可选消息 + 操作相关的负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "internal_status")]
    pub status: InternalStatus,

    #[serde(rename = "rest_status")]
    pub code: StatusCode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub payload: Properties,
}

impl Response {
    /// 成功结果
    pub fn ok(code: StatusCode) -> Self {
        Self {
            status: InternalStatus::Ok,
            code,
            message: None,
            payload: Properties::new(),
        }
    }

    /// 成功结果（200）
    pub fn success() -> Self {
        Self::ok(StatusCode::Success)
    }

    /// 失败结果
    pub fn failed(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: InternalStatus::Failed,
            code,
            message: Some(message.into()),
            payload: Properties::new(),
        }
    }

    /// 设备不可用
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::failed(StatusCode::Unavailable, message)
    }

    /// 追加负载字段
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// 合并负载
    pub fn merge(mut self, other: Properties) -> Self {
        self.payload.extend(other);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.payload.remove(key)
    }

    /// 去掉内部/外部状态字段，只保留消息和负载
    pub fn into_entry(self) -> Properties {
        let mut entry = self.payload;
        if let Some(message) = self.message {
            entry.insert(MESSAGE_KEY.to_string(), Value::String(message));
        }
        entry
    }

    /// 序列化为扁平 JSON
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_serialization() {
        let response = Response::success().with("update_time", 5);
        let value = response.to_json();

        assert_eq!(value["internal_status"], "OK");
        assert_eq!(value["rest_status"], 200);
        assert_eq!(value["update_time"], 5);
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_deserialize_failed() {
        let value = json!({
            "internal_status": "FAIL",
            "rest_status": 503,
            "message": "Device is disconnected",
            "status": "disconnected"
        });
        let response: Response = serde_json::from_value(value).unwrap();

        assert!(!response.is_ok());
        assert_eq!(response.code, StatusCode::Unavailable);
        assert_eq!(response.get_str("status"), Some("disconnected"));
    }

    #[test]
    fn test_into_entry_strips_status() {
        let entry = Response::failed(StatusCode::Unavailable, "down")
            .with("id", "first")
            .into_entry();

        assert!(!entry.contains_key(INTERNAL_STATUS_KEY));
        assert!(!entry.contains_key(EXTERNAL_STATUS_KEY));
        assert_eq!(entry["message"], "down");
        assert_eq!(entry["id"], "first");
    }

    #[test]
    fn test_response_json_round_trip() {
        let original = Response::failed(StatusCode::UnprocessableEntity, "Device device-9 not found")
            .with("devices", json!(["device-1"]));

        let restored: Response = serde_json::from_value(original.to_json()).unwrap();
        assert_eq!(restored, original);

        let value = Response::ok(StatusCode::Created).with("id", "device-1").to_json();
        let created: Response = serde_json::from_value(value).unwrap();
        assert_eq!(created.code, StatusCode::Created);
        assert!(created.is_ok());
        assert!(created.message.is_none());
    }

    #[test]
    fn test_unknown_status_code() {
        assert!(StatusCode::try_from(418).is_err());
        assert_eq!(StatusCode::try_from(422), Ok(StatusCode::UnprocessableEntity));
    }
}
