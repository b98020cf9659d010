//! 生命周期状态机
//!
//! 告警、转床申请、床位与门诊预约的状态转换表。
//! 乐观更新在修改缓存之前先经过这里的校验。

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::LazyLock;

use hospitrack_core::{AlertStatus, AppointmentStatus, BedStatus, HospitalError, Result, TransferStatus};
use serde::{Deserialize, Serialize};

/// 告警事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AlertEvent {
    Acknowledge,
    Resolve,
}

/// 转床申请事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransferEvent {
    Approve,
    Reject,
}

/// 床位事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BedEvent {
    Assign,
    /// 患者离床，床位进入清洁
    Release,
    /// 直接腾空，不经过清洁
    Vacate,
    MarkCleaning,
    MarkCleaned,
    StartMaintenance,
    EndMaintenance,
}

impl BedEvent {
    /// 把 "设置为某状态" 的请求翻译为事件。
    /// 占用必须通过分配患者完成，因此目标为 Occupied 时返回 None；
    /// 占用中的床位转入清洁视为患者离床。
    pub fn from_target(from: BedStatus, target: BedStatus) -> Option<BedEvent> {
        match (from, target) {
            (_, BedStatus::Occupied) => None,
            (BedStatus::Occupied, BedStatus::Available) => Some(BedEvent::Vacate),
            (BedStatus::Occupied, BedStatus::Cleaning) => Some(BedEvent::Release),
            (BedStatus::Cleaning, BedStatus::Available) => Some(BedEvent::MarkCleaned),
            (BedStatus::Maintenance, BedStatus::Available) => Some(BedEvent::EndMaintenance),
            (_, BedStatus::Cleaning) => Some(BedEvent::MarkCleaning),
            (_, BedStatus::Maintenance) => Some(BedEvent::StartMaintenance),
            (BedStatus::Available, BedStatus::Available) => None,
        }
    }
}

/// 门诊预约事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentEvent {
    Cancel,
}

/// 通用状态机
#[derive(Debug)]
pub struct StateMachine<S, E> {
    transitions: HashMap<(S, E), S>,
}

pub type AlertStateMachine = StateMachine<AlertStatus, AlertEvent>;
pub type TransferStateMachine = StateMachine<TransferStatus, TransferEvent>;
pub type BedStateMachine = StateMachine<BedStatus, BedEvent>;
pub type AppointmentStateMachine = StateMachine<AppointmentStatus, AppointmentEvent>;

/// 共享实例，转换表在进程内只构建一次
pub static ALERT_LIFECYCLE: LazyLock<AlertStateMachine> = LazyLock::new(AlertStateMachine::alerts);
pub static TRANSFER_LIFECYCLE: LazyLock<TransferStateMachine> = LazyLock::new(TransferStateMachine::transfers);
pub static BED_LIFECYCLE: LazyLock<BedStateMachine> = LazyLock::new(BedStateMachine::beds);
pub static APPOINTMENT_LIFECYCLE: LazyLock<AppointmentStateMachine> = LazyLock::new(AppointmentStateMachine::appointments);

impl<S, E> StateMachine<S, E>
where
    S: Copy + Eq + Hash + Debug,
    E: Copy + Eq + Hash + Debug,
{
    pub fn from_rules(rules: impl IntoIterator<Item = (S, E, S)>) -> Self {
        let transitions = rules
            .into_iter()
            .map(|(from, event, to)| ((from, event), to))
            .collect();
        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: S, event: E) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: S, event: E) -> Result<S> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(HospitalError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 当前状态下所有可用事件
    pub fn possible_events(&self, current: S) -> Vec<E> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current)
            .map(|(_, event)| *event)
            .collect()
    }

    /// 终止状态：没有任何出边
    pub fn is_terminal(&self, state: S) -> bool {
        !self.transitions.keys().any(|(from, _)| *from == state)
    }
}

impl AlertStateMachine {
    /// 单向：Open → Acknowledged → Resolved，未确认的告警可直接解决
    pub fn alerts() -> Self {
        Self::from_rules([
            (AlertStatus::Open, AlertEvent::Acknowledge, AlertStatus::Acknowledged),
            (AlertStatus::Open, AlertEvent::Resolve, AlertStatus::Resolved),
            (AlertStatus::Acknowledged, AlertEvent::Resolve, AlertStatus::Resolved),
        ])
    }
}

impl TransferStateMachine {
    /// 只有待审批的申请可以批准或驳回
    pub fn transfers() -> Self {
        Self::from_rules([
            (TransferStatus::Pending, TransferEvent::Approve, TransferStatus::Approved),
            (TransferStatus::Pending, TransferEvent::Reject, TransferStatus::Rejected),
        ])
    }
}

impl BedStateMachine {
    pub fn beds() -> Self {
        use BedEvent::*;
        use BedStatus::*;

        Self::from_rules([
            (Available, Assign, Occupied),
            (Occupied, Release, Cleaning),
            (Occupied, Vacate, Available),
            (Available, MarkCleaning, Cleaning),
            (Cleaning, MarkCleaned, Available),
            (Available, StartMaintenance, Maintenance),
            (Cleaning, StartMaintenance, Maintenance),
            (Maintenance, EndMaintenance, Available),
        ])
    }
}

impl AppointmentStateMachine {
    pub fn appointments() -> Self {
        Self::from_rules([(AppointmentStatus::Scheduled, AppointmentEvent::Cancel, AppointmentStatus::Cancelled)])
    }
}
