//! 错误定义模块

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::validation::ValidationErrors;

/// 无法得到任何具体错误信息时展示给用户的兜底文案
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// 会话在请求期间失效时的文案
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please sign in again";

/// 看板客户端统一错误类型
#[derive(Error, Debug)]
pub enum HospitalError {
    /// 请求未收到任何响应（后端未启动、DNS失败、连接被拒绝）
    #[error("Cannot connect to backend server at {0}. Please ensure your backend is running and CORS is configured properly.")]
    NetworkUnreachable(String),

    /// 响应状态为0或预检请求失败
    #[error("CORS error: the backend does not allow requests from {0}")]
    CorsRejected(String),

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Request failed with status code {status}")]
    Http { status: u16, body: Option<Value> },

    /// 注册时角色不在 admin/doctor/nurse 之内，请求不会发出
    #[error("Invalid role specified: {0}")]
    InvalidRole(String),

    /// 客户端表单校验失败，永远不会发往服务器
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state transition: from {from} on {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误分类，供上层按类型处理而不必解析文案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NetworkUnreachable,
    CorsRejected,
    Timeout,
    Unauthorized,
    Http(u16),
    InvalidRole,
    Validation,
    Decode,
    InvalidState,
    NotFound,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NetworkUnreachable => write!(f, "network_unreachable"),
            ErrorKind::CorsRejected => write!(f, "cors_rejected"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::Http(status) => write!(f, "http_{}", status),
            ErrorKind::InvalidRole => write!(f, "invalid_role"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Decode => write!(f, "decode"),
            ErrorKind::InvalidState => write!(f, "invalid_state"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

impl HospitalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HospitalError::NetworkUnreachable(_) => ErrorKind::NetworkUnreachable,
            HospitalError::CorsRejected(_) => ErrorKind::CorsRejected,
            HospitalError::Timeout(_) => ErrorKind::Timeout,
            HospitalError::Http { status: 401, .. } => ErrorKind::Unauthorized,
            HospitalError::Http { status: 404, .. } | HospitalError::NotFound(_) => {
                ErrorKind::NotFound
            }
            HospitalError::Http { status, .. } => ErrorKind::Http(*status),
            HospitalError::InvalidRole(_) => ErrorKind::InvalidRole,
            HospitalError::Validation(_) => ErrorKind::Validation,
            HospitalError::Decode(_) | HospitalError::Serialization(_) => ErrorKind::Decode,
            HospitalError::InvalidStateTransition { .. } => ErrorKind::InvalidState,
            HospitalError::Config(_) | HospitalError::Internal(_) => ErrorKind::Other,
        }
    }

    /// 服务器返回的错误体（仅HTTP错误）
    pub fn server_payload(&self) -> Option<&Value> {
        match self {
            HospitalError::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// 归一化后的用户可见文案
    pub fn user_message(&self) -> String {
        let transport = self.to_string();
        normalize_error_message(self.server_payload(), Some(transport.as_str()))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    /// 请求发出后会话已失效，结果作废
    pub fn session_expired() -> Self {
        HospitalError::Http {
            status: 401,
            body: Some(serde_json::json!({ "message": SESSION_EXPIRED_MESSAGE })),
        }
    }
}

/// 按 `payload.message ?? payload.error ?? transport ?? 默认文案` 的顺序归一化错误信息
pub fn normalize_error_message(server_payload: Option<&Value>, transport: Option<&str>) -> String {
    let from_payload = server_payload.and_then(|payload| {
        ["message", "error"].iter().find_map(|field| {
            payload
                .get(*field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
    });

    from_payload
        .or_else(|| {
            transport
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string())
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, HospitalError>;
