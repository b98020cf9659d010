//! 子命令实现与纯文本输出

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use hospitrack_admin::HospitrackConfig;
use hospitrack_client::{api, ApiClient, QueryParams};
use hospitrack_core::validation::{validate_login, validate_signup};
use hospitrack_core::{
    Alert, AlertSeverity, Bed, BedStatus, EntityId, ErrorKind, LoginRequest, Page, Patient, RegisterRequest, Transfer,
};
use hospitrack_sync::{
    BedEvent, DashboardEngine, DashboardOverview, FetchState, Mutation, MutationCallbacks, PaginatedQuery, Query,
    RealTimeQuery, BED_LIFECYCLE,
};
use tokio::sync::watch;
use tracing::{info, warn};

/// 命令执行上下文
pub struct App {
    pub config: HospitrackConfig,
    pub client: ApiClient,
    pub engine: DashboardEngine,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 登录并输出访问令牌
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// 注册账号（admin / doctor / nurse）
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "nurse")]
        role: String,
    },
    /// 床位列表
    Beds {
        #[arg(long)]
        ward: Option<String>,
        /// 只显示空闲床位
        #[arg(long)]
        available: bool,
    },
    /// 患者列表（逐页加载全部）
    Patients {
        #[arg(long)]
        ward: Option<String>,
    },
    /// 告警列表
    Alerts {
        #[arg(long)]
        ward: Option<String>,
        /// 只显示未解决的告警
        #[arg(long)]
        unresolved: bool,
        #[arg(long)]
        severity: Option<AlertSeverity>,
    },
    /// 确认告警
    Ack {
        id: EntityId,
        #[arg(long)]
        by: String,
    },
    /// 解决告警
    Resolve {
        id: EntityId,
        #[arg(long)]
        by: String,
        #[arg(long)]
        resolution: String,
    },
    /// 修改床位状态
    BedStatus {
        id: EntityId,
        status: BedStatus,
        /// 清洁完成时记录清洁人员
        #[arg(long)]
        cleaned_by: Option<String>,
    },
    /// 为患者分配床位
    Assign { bed: EntityId, patient: EntityId },
    /// 转床申请列表
    Transfers {
        /// 只显示待审批的申请
        #[arg(long)]
        pending: bool,
    },
    /// 批准转床申请
    Approve {
        id: EntityId,
        #[arg(long)]
        by: String,
    },
    /// 驳回转床申请
    Reject {
        id: EntityId,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
    },
    /// 看板统计
    Stats {
        #[arg(long, default_value = "all")]
        ward: String,
    },
    /// 持续轮询并输出看板汇总，Ctrl+C 退出
    Watch {
        #[arg(long, default_value = "all")]
        ward: String,
        /// 统一的轮询间隔（毫秒），默认使用配置中各集合的间隔
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

pub async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => login(app, LoginRequest { email, password }).await,
        Command::Register { name, email, password, role } => {
            register(app, RegisterRequest { name, email, password, role }).await
        }
        Command::Beds { ward, available } => {
            let mut params = ward_params(ward.as_deref(), api::beds::by_ward_params);
            if available {
                params.merge(&api::beds::available_params());
            }
            app.engine.refresh_beds(&params).await.context("Failed to load beds")?;
            print_beds(&app.engine.beds().snapshot());
            Ok(())
        }
        Command::Patients { ward } => patients(app, ward.as_deref()).await,
        Command::Alerts { ward, unresolved, severity } => {
            let mut params = ward_params(ward.as_deref(), api::alerts::by_ward_params);
            if unresolved {
                params.merge(&api::alerts::unresolved_params());
            }
            if let Some(severity) = severity {
                params.merge(&api::alerts::by_severity_params(severity));
            }
            app.engine.refresh_alerts(&params).await.context("Failed to load alerts")?;
            print_alerts(&app.engine.alerts().snapshot());
            Ok(())
        }
        Command::Ack { id, by } => {
            load_alerts(app).await?;
            let alert = app.engine.acknowledge_alert(id, &by).await.context("Failed to acknowledge alert")?;
            println!("告警 #{} 已由 {} 确认", alert.id, by);
            Ok(())
        }
        Command::Resolve { id, by, resolution } => {
            load_alerts(app).await?;
            let alert = app
                .engine
                .resolve_alert(id, &by, &resolution)
                .await
                .context("Failed to resolve alert")?;
            println!("告警 #{} 已解决: {}", alert.id, resolution);
            Ok(())
        }
        Command::BedStatus { id, status, cleaned_by } => bed_status(app, id, status, cleaned_by.as_deref()).await,
        Command::Assign { bed, patient } => {
            let all = QueryParams::new();
            app.engine.refresh_beds(&all).await.context("Failed to load beds")?;
            app.engine.refresh_patients(&all).await.context("Failed to load patients")?;
            let bed = app.engine.assign_bed(bed, patient).await.context("Failed to assign bed")?;
            println!("床位 {} ({}) 已分配给患者 #{}", bed.number, bed.ward, patient);
            Ok(())
        }
        Command::Transfers { pending } => {
            let params = if pending { api::transfers::pending_params() } else { QueryParams::new() };
            app.engine.refresh_transfers(&params).await.context("Failed to load transfers")?;
            print_transfers(&app.engine.transfers().snapshot());
            Ok(())
        }
        Command::Approve { id, by } => {
            load_transfers(app).await?;
            let transfer = app.engine.approve_transfer(id, &by).await.context("Failed to approve transfer")?;
            println!("转床申请 #{} 已批准 ({} → {})", transfer.id, bed_label(&transfer.from_bed), transfer.to_bed);
            Ok(())
        }
        Command::Reject { id, by, reason } => {
            load_transfers(app).await?;
            let transfer = app
                .engine
                .reject_transfer(id, &by, &reason)
                .await
                .context("Failed to reject transfer")?;
            println!("转床申请 #{} 已驳回: {}", transfer.id, reason);
            Ok(())
        }
        Command::Stats { ward } => stats(app, &ward).await,
        Command::Watch { ward, interval_ms } => watch_dashboard(app, &ward, interval_ms.map(Duration::from_millis)).await,
    }
}

async fn login(app: &App, credentials: LoginRequest) -> Result<()> {
    validate_login(&credentials)?;
    let response = app.client.login(&credentials).await.context("Login failed")?;
    println!("已登录: {} ({})", response.user.display_name(), response.user.role);
    println!("export HOSPITRACK_TOKEN={}", response.access);
    Ok(())
}

async fn register(app: &App, request: RegisterRequest) -> Result<()> {
    validate_signup(&request)?;
    let call = api::auth::register(&request)?;
    let email = request.email.clone();

    let mutation = Mutation::new();
    let callbacks = MutationCallbacks::new()
        .on_success(move |_| info!(%email, "Registration accepted"))
        .on_error(|e| warn!(error = %e, "Registration rejected"));
    mutation
        .mutate(|| app.client.execute(&call), callbacks)
        .await
        .context("Registration failed")?;

    println!("{} 账号 {} 注册成功", request.role, request.email);
    Ok(())
}

async fn patients(app: &App, ward: Option<&str>) -> Result<()> {
    let params = ward_params(ward, api::patients::by_ward_params);
    let query = PaginatedQuery::from_endpoint(&app.client, api::patients::list, params);

    query.refresh().await.context("Failed to load patients")?;
    while query.load_more().await.context("Failed to load more patients")? {}

    print_patients(&query.items());
    Ok(())
}

async fn bed_status(app: &App, id: EntityId, target: BedStatus, cleaned_by: Option<&str>) -> Result<()> {
    let current = app
        .client
        .execute(&api::beds::get(id))
        .await
        .with_context(|| format!("Failed to load bed #{}", id))?;
    app.engine.beds().upsert(current.clone());

    let Some(event) = BedEvent::from_target(current.status, target) else {
        bail!("Bed {} is already {} or needs `hospitrack assign` to become occupied", current.number, current.status);
    };
    BED_LIFECYCLE.transition(current.status, event)?;

    let bed = match event {
        BedEvent::MarkCleaned => app.engine.mark_bed_cleaned(id, cleaned_by).await,
        BedEvent::Release => {
            app.engine
                .refresh_patients(&QueryParams::new())
                .await
                .context("Failed to load patients")?;
            app.engine.release_bed(id).await
        }
        _ => app.engine.update_bed_status(id, target).await,
    }
    .context("Failed to update bed status")?;

    println!("床位 {} ({}): {} → {}", bed.number, bed.ward, current.status, bed.status);
    Ok(())
}

async fn stats(app: &App, ward: &str) -> Result<()> {
    let system = app
        .client
        .execute(&api::dashboard::system_stats())
        .await
        .context("Failed to load system stats")?;
    app.engine.refresh_all().await.context("Failed to refresh dashboard")?;

    println!("患者总数: {}", system.total_patients);
    println!("床位: {}/{} 空闲", system.available_beds, system.total_beds);
    println!("在岗人员: {}/{}", system.staff_on_duty, system.total_staff);
    println!("紧急告警: {}", system.emergency_alerts);
    println!();
    print_overview(ward, &app.engine.overview(ward));
    Ok(())
}

async fn watch_dashboard(app: &App, ward: &str, interval: Option<Duration>) -> Result<()> {
    let polling = &app.config.polling;
    let all = QueryParams::new();

    let alerts = RealTimeQuery::spawn(
        Query::from_request(&app.client, api::alerts::unresolved()),
        interval.unwrap_or_else(|| polling.alerts()),
    );
    let beds = RealTimeQuery::spawn(
        Query::from_request(&app.client, api::beds::list(&all)),
        interval.unwrap_or_else(|| polling.beds()),
    );
    let patients = RealTimeQuery::spawn(
        Query::from_request(&app.client, api::patients::list(&all)),
        interval.unwrap_or_else(|| polling.patients()),
    );

    let followers = [
        app.engine.alerts().follow(alerts.subscribe(), |page: &Page<Alert>| page.results.clone()),
        app.engine.beds().follow(beds.subscribe(), |page: &Page<Bed>| page.results.clone()),
        app.engine.patients().follow(patients.subscribe(), |page: &Page<Patient>| page.results.clone()),
    ];

    let mut alert_cache = app.engine.alerts().subscribe();
    let mut bed_cache = app.engine.beds().subscribe();
    let mut patient_cache = app.engine.patients().subscribe();
    let mut alert_state = alerts.subscribe();

    info!(ward, "Watching dashboard, press Ctrl+C to stop");
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            signal = &mut shutdown => break signal.context("Failed to listen for Ctrl+C"),
            Ok(()) = alert_cache.changed() => {}
            Ok(()) = bed_cache.changed() => {}
            Ok(()) = patient_cache.changed() => {}
            Ok(()) = alert_state.changed() => {
                if let Some(kind) = report_error(&mut alert_state) {
                    if kind == ErrorKind::Unauthorized {
                        break Err(anyhow::anyhow!("Session expired, run `hospitrack login` again"));
                    }
                }
                continue;
            }
        }
        print_overview(ward, &app.engine.overview(ward));
    };

    for follower in followers {
        follower.abort();
    }
    alerts.stop().await;
    beds.stop().await;
    patients.stop().await;
    outcome
}

/// 输出查询错误，返回错误类别
fn report_error<T>(rx: &mut watch::Receiver<FetchState<T>>) -> Option<ErrorKind> {
    let state = rx.borrow_and_update();
    let error = state.error.as_ref()?;
    eprintln!("刷新失败: {}", error.message);
    Some(error.kind)
}

fn ward_params(ward: Option<&str>, by_ward: fn(&str) -> QueryParams) -> QueryParams {
    match ward {
        Some(ward) if !ward.eq_ignore_ascii_case("all") => by_ward(ward),
        _ => QueryParams::new(),
    }
}

async fn load_alerts(app: &App) -> Result<()> {
    app.engine
        .refresh_alerts(&QueryParams::new())
        .await
        .context("Failed to load alerts")?;
    Ok(())
}

async fn load_transfers(app: &App) -> Result<()> {
    app.engine
        .refresh_transfers(&QueryParams::new())
        .await
        .context("Failed to load transfers")?;
    Ok(())
}

fn bed_label(bed: &Option<String>) -> &str {
    bed.as_deref().unwrap_or("-")
}

fn print_beds(beds: &[Bed]) {
    println!("{:>5}  {:<8} {:<12} {:<12} {}", "ID", "床号", "病区", "状态", "患者");
    for bed in beds {
        let patient = bed.patient_id.map(|id| format!("#{}", id)).unwrap_or_else(|| "-".to_string());
        println!("{:>5}  {:<8} {:<12} {:<12} {}", bed.id, bed.number, bed.ward, bed.status, patient);
    }
    println!("共 {} 张床位", beds.len());
}

fn print_patients(patients: &[Patient]) {
    println!("{:>5}  {:<20} {:<12} {:<8} {}", "ID", "姓名", "病区", "床号", "状态");
    for patient in patients {
        println!(
            "{:>5}  {:<20} {:<12} {:<8} {}",
            patient.id,
            patient.name,
            patient.ward.as_deref().unwrap_or("-"),
            bed_label(&patient.bed),
            patient.status
        );
    }
    println!("共 {} 名患者", patients.len());
}

fn print_alerts(alerts: &[Alert]) {
    for alert in alerts {
        let state = if alert.resolved {
            "已解决"
        } else if alert.acknowledged {
            "已确认"
        } else {
            "待处理"
        };
        println!(
            "#{:<5} [{:<8}] {:<6} {} ({})",
            alert.id,
            alert.severity,
            state,
            alert.title,
            alert.ward.as_deref().or(alert.location.as_deref()).unwrap_or("-")
        );
    }
    println!("共 {} 条告警", alerts.len());
}

fn print_transfers(transfers: &[Transfer]) {
    for transfer in transfers {
        println!(
            "#{:<5} {:<20} {} → {:<8} {:<9} {}",
            transfer.id,
            transfer.patient_name.as_deref().unwrap_or("-"),
            bed_label(&transfer.from_bed),
            transfer.to_bed,
            transfer.status,
            transfer.reason.as_deref().unwrap_or("")
        );
    }
    println!("共 {} 条转床申请", transfers.len());
}

fn print_overview(ward: &str, overview: &DashboardOverview) {
    let beds = &overview.beds;
    println!("== 病区: {} ==", ward);
    println!(
        "床位 {} 张: 空闲 {} / 占用 {} / 清洁 {} / 维修 {} (占用率 {:.1}%)",
        beds.total,
        beds.available,
        beds.occupied,
        beds.cleaning,
        beds.maintenance,
        beds.occupancy_rate()
    );
    println!(
        "告警: 未解决 {} / 未确认 {}",
        overview.active_alerts, overview.pending_alerts
    );
    println!(
        "危重患者 {} / 待转床 {}",
        overview.critical_patients, overview.pending_transfers
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn test_parse_bed_status() {
        let cli = TestCli::try_parse_from(["hospitrack", "bed-status", "3", "cleaning"]).unwrap();
        match cli.command {
            Command::BedStatus { id, status, cleaned_by } => {
                assert_eq!(id, 3);
                assert_eq!(status, BedStatus::Cleaning);
                assert!(cleaned_by.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(TestCli::try_parse_from(["hospitrack", "bed-status", "3", "broken"]).is_err());
    }

    #[test]
    fn test_parse_alert_filters() {
        let cli =
            TestCli::try_parse_from(["hospitrack", "alerts", "--ward", "ICU", "--unresolved", "--severity", "critical"])
                .unwrap();
        match cli.command {
            Command::Alerts { ward, unresolved, severity } => {
                assert_eq!(ward.as_deref(), Some("ICU"));
                assert!(unresolved);
                assert_eq!(severity, Some(AlertSeverity::Critical));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ward_params_all_means_unfiltered() {
        assert!(ward_params(Some("All"), api::beds::by_ward_params).is_empty());
        assert!(ward_params(None, api::beds::by_ward_params).is_empty());
        assert_eq!(ward_params(Some("ICU"), api::beds::by_ward_params).get("ward"), Some("ICU"));
    }
}
