//! # HospiTrack 客户端
//!
//! 与看板后端通信的全部内容：
//! - 会话上下文与401处理
//! - HTTP适配器（认证头注入、失败分类、超时）
//! - 按实体划分的领域接口

pub mod api;
pub mod http;
pub mod request;
pub mod session;

pub use http::{classify_status, ApiClient, ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use request::{ApiRequest, QueryParams};
pub use session::{Session, SessionSnapshot, UnauthorizedHandler};
