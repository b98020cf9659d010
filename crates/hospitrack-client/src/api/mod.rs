//! 领域接口
//!
//! 每个实体一个命名空间，函数只构造 [`ApiRequest`](crate::ApiRequest)，不做任何I/O。
//! 路径统一使用结尾斜杠的REST风格。

pub mod alerts;
pub mod auth;
pub mod beds;
pub mod dashboard;
pub mod opd;
pub mod patients;
pub mod staff;
pub mod transfers;

use hospitrack_core::EntityId;

pub(crate) fn item_path(collection: &str, id: EntityId) -> String {
    format!("/{}/{}/", collection, id)
}

pub(crate) fn action_path(collection: &str, id: EntityId, action: &str) -> String {
    format!("/{}/{}/{}/", collection, id, action)
}
