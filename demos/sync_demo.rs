//! 同步层演示程序
//!
//! 不依赖后端：用内存数据展示缓存的乐观更新与回滚、生命周期状态机，
//! 以及手动驱动的轮询查询。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hospitrack_core::stats::{self, BedStats};
use hospitrack_core::{Alert, AlertSeverity, AlertStatus, Bed, BedStatus};
use hospitrack_sync::{
    AlertAction, AlertEvent, BedAction, BedEvent, CollectionCache, ManualScheduler, Query, RealTimeQuery,
    ALERT_LIFECYCLE, BED_LIFECYCLE,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🚀 HospiTrack 同步层演示\n");

    // 1. 床位缓存与乐观更新
    let beds = CollectionCache::from_items(sample_beds());
    print_beds("初始床位", &beds.snapshot());

    let pending = beds.optimistic(BedAction::Assign { bed_id: 2, patient_id: 42 })?;
    print_beds("乐观分配 102 → 患者 #42", &beds.snapshot());
    let rolled_back = pending.rollback();
    println!("↩️  服务器拒绝，回滚: {}", rolled_back);
    print_beds("回滚后", &beds.snapshot());

    beds.apply(&BedAction::Release { bed_id: 1 })?;
    print_beds("101 离床", &beds.snapshot());

    // 2. 生命周期状态机
    println!("\n🔁 状态机:");
    let next = BED_LIFECYCLE.transition(BedStatus::Cleaning, BedEvent::MarkCleaned)?;
    println!("   床位 Cleaning + MarkCleaned → {}", next);
    match BED_LIFECYCLE.transition(BedStatus::Maintenance, BedEvent::Assign) {
        Ok(state) => println!("   意外的转换: {}", state),
        Err(e) => println!("   维修中的床位不能分配: {}", e),
    }
    println!(
        "   告警 Open 可用事件: {:?}",
        ALERT_LIFECYCLE.possible_events(AlertStatus::Open)
    );
    println!(
        "   告警 Resolved 为终态: {}",
        ALERT_LIFECYCLE.is_terminal(AlertStatus::Resolved)
    );
    ALERT_LIFECYCLE.transition(AlertStatus::Open, AlertEvent::Acknowledge)?;

    // 3. 告警确认与解决
    let alerts = CollectionCache::from_items(vec![sample_alert(1, AlertSeverity::Critical)]);
    alerts.apply(&AlertAction::Acknowledge { id: 1, by: "Nurse A".to_string(), at: Utc::now() })?;
    alerts.apply(&AlertAction::Resolve {
        id: 1,
        by: "Dr. Chen".to_string(),
        resolution: "Patient stabilised".to_string(),
        at: Utc::now(),
    })?;
    if let Some(alert) = alerts.get(1) {
        println!(
            "\n🚨 告警 #{}: {:?}，确认人 {}，处理人 {}",
            alert.id,
            alert.status(),
            alert.acknowledged_by.as_deref().unwrap_or("-"),
            alert.resolved_by.as_deref().unwrap_or("-")
        );
    }
    println!("   未解决告警数: {}", stats::active_alert_count(&alerts.snapshot()));

    // 4. 手动驱动的轮询查询
    println!("\n⏱️  轮询查询:");
    let fetches = Arc::new(AtomicU64::new(0));
    let query = {
        let fetches = fetches.clone();
        Query::new("beds", move || {
            let round = fetches.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let mut items = sample_beds();
                if round > 0 {
                    items[2].status = BedStatus::Available;
                }
                Ok(items)
            })
        })
    };
    let scheduler = ManualScheduler::new();
    let realtime = RealTimeQuery::spawn_with(query, Duration::from_secs(30), &scheduler);
    let follower = beds.follow(realtime.subscribe(), |items: &Vec<Bed>| items.clone());

    let mut rx = realtime.subscribe();
    rx.wait_for(|state| state.is_success()).await?;
    scheduler.fire();
    rx.wait_for(|state| state.is_success() && fetches.load(Ordering::SeqCst) >= 2).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("   拉取次数: {}", fetches.load(Ordering::SeqCst));
    print_beds("轮询后的床位", &beds.snapshot());

    realtime.stop().await;
    follower.abort();
    println!("\n✅ 演示完成");
    Ok(())
}

fn sample_beds() -> Vec<Bed> {
    let bed = |id, number: &str, status, patient_id| Bed {
        id,
        number: number.to_string(),
        ward: "ICU".to_string(),
        status,
        patient_id,
        assigned_nurse: None,
        last_cleaned: None,
        emergency_alert: None,
    };
    vec![
        bed(1, "101", BedStatus::Occupied, Some(7)),
        bed(2, "102", BedStatus::Available, None),
        bed(3, "103", BedStatus::Cleaning, None),
        bed(4, "104", BedStatus::Maintenance, None),
    ]
}

fn sample_alert(id: u64, severity: AlertSeverity) -> Alert {
    Alert {
        id,
        severity,
        title: "SpO2 below threshold".to_string(),
        message: "Oxygen saturation 86%".to_string(),
        timestamp: Some(Utc::now()),
        location: None,
        ward: Some("ICU".to_string()),
        bed: Some("101".to_string()),
        patient: Some("Li Wei".to_string()),
        reported_by: Some("Monitor".to_string()),
        acknowledged: false,
        acknowledged_by: None,
        acknowledged_at: None,
        resolved: false,
        resolved_by: None,
        resolved_at: None,
        resolution: None,
    }
}

fn print_beds(title: &str, beds: &[Bed]) {
    let stats = BedStats::from_beds(beds);
    println!("\n🛏️  {} (占用率 {:.0}%):", title, stats.occupancy_rate());
    for bed in beds {
        let patient = bed.patient_id.map(|id| format!("患者 #{}", id)).unwrap_or_default();
        println!("   {} {:<12} {}", bed.number, bed.status.to_string(), patient);
    }
}
