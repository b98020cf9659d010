//! # HospiTrack 同步层
//!
//! 在客户端与界面之间维护服务器实体的本地视图，包括：
//! - 查询、变更、轮询与分页四类数据获取原语
//! - 写时复制的实体缓存与乐观更新
//! - 告警、转床、床位与门诊预约的生命周期状态机
//! - 组合以上能力的看板同步引擎

pub mod cache;
pub mod engine;
pub mod mutation;
pub mod paginated;
pub mod polling;
pub mod query;
pub mod reducers;
pub mod state;
pub mod state_machine;

// 重新导出主要类型
pub use cache::{CollectionCache, Optimistic};
pub use engine::{DashboardEngine, DashboardOverview};
pub use mutation::{Mutation, MutationCallbacks};
pub use paginated::{PageState, PaginatedQuery};
pub use polling::{ManualScheduler, RealTimeQuery, Scheduler, Ticker, TokioScheduler};
pub use query::Query;
pub use reducers::{AlertAction, BedAction, PatientAction, Reducible, TransferAction};
pub use state::{BoxFuture, FetchError, FetchState, Phase, SessionChange, SessionStamp};
pub use state_machine::{
    AlertEvent, AppointmentEvent, BedEvent, StateMachine, TransferEvent, ALERT_LIFECYCLE, APPOINTMENT_LIFECYCLE,
    BED_LIFECYCLE, TRANSFER_LIFECYCLE,
};
