//! 会话上下文
//!
//! 显式的会话对象，在构造时交给HTTP客户端，取代浏览器端的全局存储。
//! 每次登录/登出都会推进会话代数，数据层据此丢弃旧会话发出的请求结果。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use hospitrack_core::{EntityId, LoginResponse, UserRole};
use tracing::{debug, info};

/// 会话内容快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub role: Option<UserRole>,
    pub username: Option<String>,
    pub user_id: Option<EntityId>,
}

/// 会话存储
#[derive(Debug, Default)]
pub struct Session {
    state: RwLock<SessionSnapshot>,
    generation: AtomicU64,
}

/// 收到401时的回调，由界面层决定如何引导用户重新登录
pub trait UnauthorizedHandler: Send + Sync {
    fn on_unauthorized(&self);
}

impl<F> UnauthorizedHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_unauthorized(&self) {
        self()
    }
}

impl Session {
    /// 创建匿名会话
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用已有令牌创建会话
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.write().access_token = Some(token.into());
        session
    }

    pub fn token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub fn role(&self) -> Option<UserRole> {
        self.read().role
    }

    pub fn username(&self) -> Option<String> {
        self.read().username.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().access_token.is_some()
    }

    /// 当前会话代数
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// 保存登录结果并开启新的会话代数
    pub fn sign_in(&self, login: &LoginResponse) {
        let mut state = self.write();
        *state = SessionSnapshot {
            access_token: Some(login.access.clone()),
            refresh_token: Some(login.refresh.clone()),
            role: Some(login.user.role),
            username: Some(login.user.display_name().to_string()),
            user_id: Some(login.user.id),
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(role = %login.user.role, generation, "Session signed in");
    }

    /// 刷新访问令牌，不改变会话代数
    pub fn update_access_token(&self, token: impl Into<String>) {
        self.write().access_token = Some(token.into());
        debug!("Access token refreshed");
    }

    /// 主动登出
    pub fn clear(&self) {
        let mut state = self.write();
        *state = SessionSnapshot::default();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, "Session cleared");
    }

    /// 因401失效：仅当会话仍处于请求发出时的代数才清空，返回是否由本次调用清空。
    /// 并发的多个401只有第一个会触发回调。
    pub fn expire(&self, observed_generation: u64) -> bool {
        let mut state = self.write();
        if self
            .generation
            .compare_exchange(
                observed_generation,
                observed_generation + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return false;
        }
        *state = SessionSnapshot::default();
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionSnapshot> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionSnapshot> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
