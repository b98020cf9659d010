//! 实体归约器
//!
//! 每个动作把一个集合映射为新的集合，原集合不被修改。
//! 生命周期相关的动作先经过状态机校验，非法转换直接报错，缓存保持原样。

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use hospitrack_core::{
    Alert, AlertStatus, Bed, BedStatus, Entity, EntityId, HospitalError, Patient, PatientStatus, Result,
    Transfer, VitalSigns,
};

use crate::state_machine::{AlertEvent, BedEvent, TransferEvent, ALERT_LIFECYCLE, BED_LIFECYCLE, TRANSFER_LIFECYCLE};

/// 可归约的实体
pub trait Reducible: Entity + Clone + Send + Sync + 'static {
    type Action: Debug + Send;

    /// 实体名称，用于错误信息与日志
    const KIND: &'static str;

    fn reduce(items: &[Self], action: &Self::Action) -> Result<Vec<Self>>;
}

/// 替换指定ID的实体；找不到时返回 NotFound
pub fn update_one<T, F>(items: &[T], kind: &str, id: EntityId, update: F) -> Result<Vec<T>>
where
    T: Entity + Clone,
    F: FnOnce(&T) -> Result<T>,
{
    let index = items
        .iter()
        .position(|item| item.id() == id)
        .ok_or_else(|| HospitalError::NotFound(format!("{} {}", kind, id)))?;

    let replacement = update(&items[index])?;
    let mut next = items.to_vec();
    next[index] = replacement;
    Ok(next)
}

/// 插入或替换；新实体放在最前
pub fn upsert<T: Entity + Clone>(items: &[T], entity: T) -> Vec<T> {
    match items.iter().position(|item| item.id() == entity.id()) {
        Some(index) => {
            let mut next = items.to_vec();
            next[index] = entity;
            next
        }
        None => {
            let mut next = Vec::with_capacity(items.len() + 1);
            next.push(entity);
            next.extend_from_slice(items);
            next
        }
    }
}

/// 床位动作
#[derive(Debug, Clone, PartialEq)]
pub enum BedAction {
    SetStatus { bed_id: EntityId, status: BedStatus },
    Assign { bed_id: EntityId, patient_id: EntityId },
    Release { bed_id: EntityId },
    MarkCleaned { bed_id: EntityId, at: DateTime<Utc> },
}

impl Reducible for Bed {
    type Action = BedAction;
    const KIND: &'static str = "bed";

    fn reduce(items: &[Self], action: &BedAction) -> Result<Vec<Self>> {
        match action {
            BedAction::SetStatus { bed_id, status } => update_one(items, Self::KIND, *bed_id, |bed| {
                let event = BedEvent::from_target(bed.status, *status).ok_or_else(|| {
                    HospitalError::InvalidStateTransition {
                        from: bed.status.to_string(),
                        event: format!("set status {}", status),
                    }
                })?;
                let next = BED_LIFECYCLE.transition(bed.status, event)?;
                Ok(bed.with_status(next))
            }),
            BedAction::Assign { bed_id, patient_id } => update_one(items, Self::KIND, *bed_id, |bed| {
                BED_LIFECYCLE.transition(bed.status, BedEvent::Assign)?;
                Ok(bed.with_patient(*patient_id))
            }),
            BedAction::Release { bed_id } => update_one(items, Self::KIND, *bed_id, |bed| {
                let next = BED_LIFECYCLE.transition(bed.status, BedEvent::Release)?;
                Ok(bed.with_status(next))
            }),
            BedAction::MarkCleaned { bed_id, at } => update_one(items, Self::KIND, *bed_id, |bed| {
                let next = BED_LIFECYCLE.transition(bed.status, BedEvent::MarkCleaned)?;
                let mut cleaned = bed.with_status(next);
                cleaned.last_cleaned = Some(*at);
                Ok(cleaned)
            }),
        }
    }
}

/// 告警动作
#[derive(Debug, Clone, PartialEq)]
pub enum AlertAction {
    Insert(Alert),
    Acknowledge { id: EntityId, by: String, at: DateTime<Utc> },
    Resolve { id: EntityId, by: String, resolution: String, at: DateTime<Utc> },
}

impl Reducible for Alert {
    type Action = AlertAction;
    const KIND: &'static str = "alert";

    fn reduce(items: &[Self], action: &AlertAction) -> Result<Vec<Self>> {
        match action {
            AlertAction::Insert(alert) => {
                alert.check_invariants()?;
                Ok(upsert(items, alert.clone()))
            }
            AlertAction::Acknowledge { id, by, at } => update_one(items, Self::KIND, *id, |alert| {
                ALERT_LIFECYCLE.transition(alert.status(), AlertEvent::Acknowledge)?;
                let mut next = alert.clone();
                next.acknowledged = true;
                next.acknowledged_by = Some(by.clone());
                next.acknowledged_at = Some(*at);
                Ok(next)
            }),
            AlertAction::Resolve { id, by, resolution, at } => update_one(items, Self::KIND, *id, |alert| {
                let from = alert.status();
                ALERT_LIFECYCLE.transition(from, AlertEvent::Resolve)?;
                let mut next = alert.clone();
                // 未确认的告警在解决的同时被同一人确认
                if from == AlertStatus::Open {
                    next.acknowledged = true;
                    next.acknowledged_by = Some(by.clone());
                    next.acknowledged_at = Some(*at);
                }
                next.resolved = true;
                next.resolved_by = Some(by.clone());
                next.resolved_at = Some(*at);
                next.resolution = Some(resolution.clone());
                Ok(next)
            }),
        }
    }
}

/// 患者动作
#[derive(Debug, Clone, PartialEq)]
pub enum PatientAction {
    UpdateNotes { id: EntityId, notes: String, status: Option<PatientStatus> },
    UpdateStatus { id: EntityId, status: PatientStatus },
    UpdateVitals { id: EntityId, vitals: VitalSigns },
    MoveToBed { id: EntityId, bed: Option<String>, ward: Option<String> },
}

impl Reducible for Patient {
    type Action = PatientAction;
    const KIND: &'static str = "patient";

    fn reduce(items: &[Self], action: &PatientAction) -> Result<Vec<Self>> {
        match action {
            PatientAction::UpdateNotes { id, notes, status } => update_one(items, Self::KIND, *id, |patient| {
                let mut next = patient.clone();
                next.last_notes = Some(notes.clone());
                if let Some(status) = status {
                    next.status = *status;
                }
                Ok(next)
            }),
            PatientAction::UpdateStatus { id, status } => update_one(items, Self::KIND, *id, |patient| {
                let mut next = patient.clone();
                next.status = *status;
                Ok(next)
            }),
            PatientAction::UpdateVitals { id, vitals } => update_one(items, Self::KIND, *id, |patient| {
                let mut next = patient.clone();
                let mut merged = next.vital_signs.take().unwrap_or_default();
                if vitals.heart_rate.is_some() {
                    merged.heart_rate = vitals.heart_rate;
                }
                if vitals.blood_pressure.is_some() {
                    merged.blood_pressure = vitals.blood_pressure.clone();
                }
                if vitals.temperature.is_some() {
                    merged.temperature = vitals.temperature;
                }
                if vitals.oxygen_level.is_some() {
                    merged.oxygen_level = vitals.oxygen_level;
                }
                next.vital_signs = Some(merged);
                Ok(next)
            }),
            PatientAction::MoveToBed { id, bed, ward } => update_one(items, Self::KIND, *id, |patient| {
                let mut next = patient.clone();
                next.bed = bed.clone();
                if ward.is_some() {
                    next.ward = ward.clone();
                }
                Ok(next)
            }),
        }
    }
}

/// 转床申请动作
#[derive(Debug, Clone, PartialEq)]
pub enum TransferAction {
    Insert(Transfer),
    Approve { id: EntityId, by: String },
    Reject { id: EntityId, by: String, reason: String },
}

impl Reducible for Transfer {
    type Action = TransferAction;
    const KIND: &'static str = "transfer";

    fn reduce(items: &[Self], action: &TransferAction) -> Result<Vec<Self>> {
        match action {
            TransferAction::Insert(transfer) => Ok(upsert(items, transfer.clone())),
            TransferAction::Approve { id, by } => update_one(items, Self::KIND, *id, |transfer| {
                let mut next = transfer.clone();
                next.status = TRANSFER_LIFECYCLE.transition(transfer.status, TransferEvent::Approve)?;
                next.approved_by = Some(by.clone());
                Ok(next)
            }),
            TransferAction::Reject { id, by, reason } => update_one(items, Self::KIND, *id, |transfer| {
                let mut next = transfer.clone();
                next.status = TRANSFER_LIFECYCLE.transition(transfer.status, TransferEvent::Reject)?;
                next.rejected_by = Some(by.clone());
                next.rejection_reason = Some(reason.clone());
                Ok(next)
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use hospitrack_core::{AlertSeverity, TransferStatus};

    #[test]
    fn test_bed_release_goes_to_cleaning() {
        let beds = vec![bed(1, "101", BedStatus::Occupied, Some(4))];
        let next = Bed::reduce(&beds, &BedAction::Release { bed_id: 1 }).unwrap();

        assert_eq!(next[0].status, BedStatus::Cleaning);
        assert_eq!(next[0].patient_id, None);
        assert!(next.iter().all(Bed::is_consistent));
        // 原集合不变
        assert_eq!(beds[0].status, BedStatus::Occupied);
    }

    #[test]
    fn test_bed_invalid_transitions_rejected() {
        let beds = vec![
            bed(1, "101", BedStatus::Occupied, Some(4)),
            bed(2, "102", BedStatus::Maintenance, None),
        ];

        assert!(Bed::reduce(&beds, &BedAction::Assign { bed_id: 1, patient_id: 9 }).is_err());
        assert!(Bed::reduce(&beds, &BedAction::Assign { bed_id: 2, patient_id: 9 }).is_err());
        assert!(Bed::reduce(&beds, &BedAction::SetStatus { bed_id: 2, status: BedStatus::Occupied }).is_err());
        assert!(matches!(
            Bed::reduce(&beds, &BedAction::Release { bed_id: 99 }),
            Err(HospitalError::NotFound(_))
        ));
    }

    #[test]
    fn test_bed_cleaned_records_time() {
        let at = Utc::now();
        let beds = vec![bed(3, "103", BedStatus::Cleaning, None)];
        let next = Bed::reduce(&beds, &BedAction::MarkCleaned { bed_id: 3, at }).unwrap();
        assert_eq!(next[0].status, BedStatus::Available);
        assert_eq!(next[0].last_cleaned, Some(at));
    }

    #[test]
    fn test_alert_invariants_hold_across_transitions() {
        let at = Utc::now();
        let alerts = vec![alert(1, AlertSeverity::Critical), alert(2, AlertSeverity::High)];

        let acked = Alert::reduce(
            &alerts,
            &AlertAction::Acknowledge { id: 1, by: "Nurse A".to_string(), at },
        )
        .unwrap();
        assert!(acked[0].acknowledged);
        assert_eq!(acked[0].acknowledged_by.as_deref(), Some("Nurse A"));
        assert!(!acked[0].resolved);

        // 不能再次确认
        assert!(Alert::reduce(&acked, &AlertAction::Acknowledge { id: 1, by: "Nurse B".to_string(), at }).is_err());

        let resolved = Alert::reduce(
            &acked,
            &AlertAction::Resolve { id: 1, by: "Dr. Smith".to_string(), resolution: "Stabilised".to_string(), at },
        )
        .unwrap();
        assert_eq!(resolved[0].acknowledged_by.as_deref(), Some("Nurse A"));
        assert_eq!(resolved[0].resolved_by.as_deref(), Some("Dr. Smith"));

        for state in [&alerts, &acked, &resolved] {
            assert!(state.iter().all(|a| a.check_invariants().is_ok()));
        }
    }

    #[test]
    fn test_resolving_open_alert_acknowledges_it() {
        let at = Utc::now();
        let alerts = vec![alert(5, AlertSeverity::Medium)];
        let next = Alert::reduce(
            &alerts,
            &AlertAction::Resolve { id: 5, by: "Dr. Rao".to_string(), resolution: "False alarm".to_string(), at },
        )
        .unwrap();

        assert!(next[0].acknowledged && next[0].resolved);
        assert_eq!(next[0].acknowledged_by.as_deref(), Some("Dr. Rao"));
        assert_eq!(next[0].acknowledged_at, next[0].resolved_at);
        assert!(next[0].check_invariants().is_ok());
    }

    #[test]
    fn test_insert_rejects_inconsistent_alert() {
        let mut bad = alert(9, AlertSeverity::Low);
        bad.resolved = true;
        assert!(Alert::reduce(&[], &AlertAction::Insert(bad)).is_err());

        let inserted = Alert::reduce(&[alert(1, AlertSeverity::Low)], &AlertAction::Insert(alert(9, AlertSeverity::High))).unwrap();
        assert_eq!(inserted.iter().map(|a| a.id).collect::<Vec<_>>(), vec![9, 1]);
    }

    #[test]
    fn test_patient_vitals_merge() {
        let mut patient = patient(4, "Amit Singh", PatientStatus::UnderObservation);
        patient.vital_signs = Some(VitalSigns {
            heart_rate: Some(110),
            blood_pressure: Some("160/100".to_string()),
            temperature: Some(100.2),
            oxygen_level: Some(92),
        });

        let next = Patient::reduce(
            &[patient],
            &PatientAction::UpdateVitals { id: 4, vitals: VitalSigns { oxygen_level: Some(97), ..VitalSigns::default() } },
        )
        .unwrap();

        let vitals = next[0].vital_signs.as_ref().unwrap();
        assert_eq!(vitals.oxygen_level, Some(97));
        assert_eq!(vitals.heart_rate, Some(110));
    }

    #[test]
    fn test_transfer_only_pending_can_be_decided() {
        let transfers = vec![transfer(1, TransferStatus::Pending), transfer(2, TransferStatus::Approved)];

        let approved = Transfer::reduce(&transfers, &TransferAction::Approve { id: 1, by: "Admin".to_string() }).unwrap();
        assert_eq!(approved[0].status, TransferStatus::Approved);
        assert_eq!(approved[0].approved_by.as_deref(), Some("Admin"));

        let err = Transfer::reduce(
            &transfers,
            &TransferAction::Reject { id: 2, by: "Admin".to_string(), reason: "Full".to_string() },
        )
        .unwrap_err();
        assert!(matches!(err, HospitalError::InvalidStateTransition { .. }));
    }
}
