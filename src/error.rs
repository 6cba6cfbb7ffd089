use thiserror::Error;

use crate::hub::core::status::{Response, StatusCode};
use crate::hub::core::state::DeviceType;

/// 应用程序统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 设备未找到
    #[error("设备未找到: {0}")]
    DeviceNotFound(String),

    /// 设备属性无效
    #[error("设备属性无效: {0}")]
    InvalidProperties(String),

    /// 不支持的设备类型
    #[error("不支持的设备类型: {0}")]
    UnsupportedType(String),

    /// 设备池成员类型不一致
    #[error("类型 {expected} 与 {found} 不一致，设备池只能包含 {expected}")]
    TypeMismatch {
        expected: DeviceType,
        found: DeviceType,
    },

    /// 设备池不能包含设备池
    #[error("设备 {0} 是设备池，不能作为设备池成员")]
    NestedPool(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON 错误
    #[error("JSON 错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// AppError 的 Result 类型别名
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// 将错误转换为状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DeviceNotFound(_) => StatusCode::UnprocessableEntity,
            AppError::InvalidProperties(_) => StatusCode::BadRequest,
            AppError::UnsupportedType(_) => StatusCode::BadRequest,
            AppError::TypeMismatch { .. } => StatusCode::UnprocessableEntity,
            AppError::NestedPool(_) => StatusCode::UnprocessableEntity,
            AppError::Config(_) => StatusCode::Error,
            AppError::IoError(_) => StatusCode::Error,
            AppError::JsonError(_) => StatusCode::BadRequest,
        }
    }
}

impl From<AppError> for Response {
    fn from(err: AppError) -> Self {
        Response::failed(err.status_code(), err.to_string())
    }
}
