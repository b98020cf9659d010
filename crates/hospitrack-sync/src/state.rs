//! 数据获取状态

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hospitrack_client::Session;
use hospitrack_core::{ErrorKind, HospitalError, SESSION_EXPIRED_MESSAGE};

/// 装箱的异步结果
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 请求阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Loading => write!(f, "loading"),
            Phase::Success => write!(f, "success"),
            Phase::Error => write!(f, "error"),
        }
    }
}

/// 对外暴露的错误：归一化后的文案与类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 会话在请求期间失效
    pub fn session_expired() -> Self {
        Self::new(ErrorKind::Unauthorized, SESSION_EXPIRED_MESSAGE)
    }
}

impl From<&HospitalError> for FetchError {
    fn from(error: &HospitalError) -> Self {
        Self::new(error.kind(), error.user_message())
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// 请求进行期间会话发生的变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Unchanged,
    /// 期间有新的登录，旧结果作废但不算失效
    SignedIn,
    /// 期间被登出或401失效
    Expired,
}

/// 请求发出时记录的会话代数
#[derive(Debug, Clone)]
pub struct SessionStamp {
    session: Arc<Session>,
    generation: u64,
}

impl SessionStamp {
    pub fn observe(session: &Arc<Session>) -> Self {
        Self {
            session: session.clone(),
            generation: session.generation(),
        }
    }

    pub fn change(&self) -> SessionChange {
        if self.session.generation() == self.generation {
            SessionChange::Unchanged
        } else if self.session.is_authenticated() {
            SessionChange::SignedIn
        } else {
            SessionChange::Expired
        }
    }
}

/// 单次请求类原语（Query / Mutation）发布的状态快照
#[derive(Debug)]
pub struct FetchState<T> {
    pub phase: Phase,
    pub data: Option<Arc<T>>,
    pub error: Option<FetchError>,
}

impl<T> FetchState<T> {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            data: None,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn is_success(&self) -> bool {
        self.phase == Phase::Success
    }

    pub fn is_error(&self) -> bool {
        self.phase == Phase::Error
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub(crate) fn begin(&mut self) {
        self.phase = Phase::Loading;
        self.error = None;
    }

    pub(crate) fn succeed(&mut self, data: Arc<T>) {
        self.phase = Phase::Success;
        self.data = Some(data);
        self.error = None;
    }

    /// 失败时保留上一次成功的数据
    pub(crate) fn fail(&mut self, error: FetchError) {
        self.phase = Phase::Error;
        self.error = Some(error);
    }
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> Clone for FetchState<T> {
    fn clone(&self) -> Self {
        Self {
            phase: self.phase,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_keeps_previous_data() {
        let mut state = FetchState::idle();
        state.begin();
        state.succeed(Arc::new(vec![1, 2, 3]));
        assert!(state.is_success());

        state.begin();
        state.fail(FetchError::from(&HospitalError::Http { status: 500, body: None }));
        assert!(state.is_error());
        assert_eq!(state.data(), Some(&vec![1, 2, 3]));
        assert_eq!(state.error_message(), Some("Request failed with status code 500"));
    }

    #[test]
    fn test_session_stamp_distinguishes_sign_in_from_expiry() {
        let session = Arc::new(Session::with_token("t"));
        let stamp = SessionStamp::observe(&session);
        assert_eq!(stamp.change(), SessionChange::Unchanged);

        assert!(session.expire(session.generation()));
        assert_eq!(stamp.change(), SessionChange::Expired);

        session.update_access_token("fresh");
        assert_eq!(stamp.change(), SessionChange::SignedIn);
    }
}
