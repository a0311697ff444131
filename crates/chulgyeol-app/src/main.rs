//! # chulgyeol-app
//!
//! CHULGYEOL 바이너리 진입점.
//! DI 컨테이너 역할, 라이프사이클 관리, 스케줄러 오케스트레이션.

mod lifecycle;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use directories::ProjectDirs;
use chulgyeol_core::config::AppConfig;
use chulgyeol_core::config_manager::ConfigManager;
use chulgyeol_core::error::CoreError;
use chulgyeol_core::ports::event_source::EventSource;
use chulgyeol_core::ports::notifier::AlertNotifier;
use chulgyeol_core::ports::store::{EventStore, SyncLogStore};
use chulgyeol_core::time::today_kst;
use chulgyeol_engine::reconcile::Reconciler;
use chulgyeol_engine::router::AlertRouter;
use chulgyeol_engine::sweeper::ReturnSweeper;
use chulgyeol_notify::WebhookNotifier;
use chulgyeol_storage::sqlite::SqliteStorage;
use chulgyeol_worker::handoff::HandoffPaths;
use chulgyeol_worker::{FileEventSource, WorkerSupervisor};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;
use crate::scheduler::{Scheduler, SchedulerConfig};

/// CHULGYEOL 자습실 출결 동기화 에이전트
///
/// 키오스크 스크래핑 워커를 감독하고, 출입 기록을 재조정해
/// 일일 출석 현황과 웹훅 알림으로 내보낸다.
#[derive(Parser, Debug)]
#[command(name = "chulgyeol")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// DB 파일 경로 (설정 파일보다 우선)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 메인 동기화 틱 간격 (밀리초)
    #[arg(long)]
    tick_interval: Option<u64>,

    /// 워커를 띄우지 않고 핸드오프 파일만 소비 (디버깅용)
    #[arg(long)]
    no_worker: bool,

    /// 오늘 출입 요약과 최근 동기화 로그 출력 후 종료
    #[arg(long)]
    today_summary: bool,
}

/// DB 경로 결정 (CLI 인자 > 설정 파일 > 플랫폼 기본 경로)
fn resolve_db_path(args: &Args, config: &AppConfig) -> PathBuf {
    args.db_path
        .clone()
        .or_else(|| config.storage.db_path.clone())
        .or_else(|| {
            ProjectDirs::from("io", "chulgyeol", "chulgyeol")
                .map(|p| p.data_dir().join("chulgyeol.db"))
        })
        .unwrap_or_else(|| PathBuf::from("./chulgyeol.db"))
}

/// 배너 출력
fn print_banner(no_worker: bool) {
    println!();
    println!("╔══════════════════════════════════════════╗");
    println!("║            C H U L G Y E O L             ║");
    println!("║     자습실 출결 동기화 에이전트             ║");
    if no_worker {
        println!("║     🔌 워커 없음 (핸드오프 파일만 소비)     ║");
    }
    println!("╚══════════════════════════════════════════╝");
    println!();
}

/// 오늘 요약 출력 (운영자 조회)
async fn print_today_summary(storage: &SqliteStorage) -> Result<(), CoreError> {
    let today = today_kst();
    let summary = storage.day_summary(today).await?;

    println!("📅 {} 출입 요약", today.format("%Y-%m-%d"));
    println!("  입장: {}명", summary.entry_count);
    println!("  퇴장: {}명", summary.exit_count);
    println!("  지각: {}명", summary.late_count);
    println!();

    let events = storage.events_on(today, 20).await?;
    if !events.is_empty() {
        println!("최근 출입 기록:");
        for event in events {
            let detail = event
                .detail
                .map(|d| format!("({d})"))
                .unwrap_or_default();
            println!(
                "  {} {} {}{}{}",
                event.record_time.format("%H:%M:%S"),
                event.student_name,
                event.kind,
                detail,
                if event.is_late { " [지각]" } else { "" }
            );
        }
        println!();
    }

    let logs = storage.recent_logs(5).await?;
    if logs.is_empty() {
        println!("동기화 로그 없음");
    } else {
        println!("최근 동기화:");
        for log in logs {
            println!(
                "  {} — 수집 {}건, 신규 {}건 [{}]{}",
                log.sync_time.format("%H:%M:%S"),
                log.records_fetched,
                log.new_records,
                log.status,
                log.errors.map(|e| format!(" ({e})")).unwrap_or_default()
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // tracing 초기화
    let log_filter = format!(
        "chulgyeol={0},chulgyeol_core={0},chulgyeol_engine={0},chulgyeol_storage={0},chulgyeol_notify={0},chulgyeol_worker={0},chulgyeol_app={0}",
        args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    // 설정 로드
    let config_manager = match args.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    }
    .map_err(|e| anyhow!("설정 로드 실패: {e}"))?;
    let mut config = config_manager.get();
    info!("설정 파일: {:?}", config_manager.config_path());

    // CLI 인자로 설정 오버라이드
    if let Some(tick) = args.tick_interval {
        config.sync.tick_interval_ms = tick;
    }

    // ── 어댑터 생성 (DI 와이어링) ──

    // 1. 스토리지 (파일 기반 SQLite)
    let db_path = resolve_db_path(&args, &config);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let storage = Arc::new(
        SqliteStorage::open(&db_path).map_err(|e| anyhow!("저장소 초기화 실패: {e}"))?,
    );
    info!("SQLite 저장소: {}", db_path.display());

    // 요약 모드는 저장소만 필요
    if args.today_summary {
        print_today_summary(&storage)
            .await
            .map_err(|e| anyhow!("요약 조회 실패: {e}"))?;
        return Ok(());
    }

    print_banner(args.no_worker);
    info!("CHULGYEOL 에이전트 시작");

    if config.notify.warning_webhook_url.is_empty() && config.notify.general_webhook_url.is_empty()
    {
        warn!("웹훅 URL이 설정되지 않았습니다 — 알림은 전부 생략됩니다");
    }

    // 2. 웹훅 알림기
    let notifier: Arc<dyn AlertNotifier> = Arc::new(
        WebhookNotifier::new(&config.notify).map_err(|e| anyhow!("알림기 초기화 실패: {e}"))?,
    );

    // 3. 워커 슈퍼바이저 + 핸드오프 이벤트 소스
    let supervisor = Arc::new(WorkerSupervisor::new(config.worker.clone()));
    let source: Arc<dyn EventSource> = Arc::new(FileEventSource::new(HandoffPaths::new(
        config.worker.handoff_dir.clone(),
    )));

    // 4. 재조정 파이프라인 + 라우터 + 스위퍼
    let reconciler = Arc::new(Reconciler::new(
        storage.clone(),
        storage.clone(),
        storage.clone(),
        config.timetable.clone(),
    ));
    let router = Arc::new(AlertRouter::new(
        storage.clone(),
        notifier.clone(),
        config.timetable.late_threshold,
    ));
    let sweeper = Arc::new(ReturnSweeper::new(
        storage.clone(),
        storage.clone(),
        notifier.clone(),
    ));

    // ── 워커 시작 ──
    if !args.no_worker {
        info!(
            "워커 시작: {} {:?}",
            config.worker.command, config.worker.args
        );
        if let Err(e) = supervisor.start().await {
            match e {
                CoreError::SessionExpired => {
                    error!("세션 만료 — 키오스크 포털에 수동 재로그인 후 다시 시작하세요");
                }
                ref other => error!("워커 시작 실패: {other}"),
            }
            return Err(anyhow!("워커 시작 실패"));
        }
    }

    // ── 스케줄러 시작 ──
    let lifecycle = Arc::new(LifecycleManager::new());
    let sched = Scheduler::new(
        SchedulerConfig {
            tick_interval: Duration::from_millis(config.sync.tick_interval_ms),
            sweep_interval: Duration::from_millis(config.sync.sweep_interval_ms),
            morning_alert_time: config.sync.morning_alert_time,
            restart_after_ticks: config.worker.restart_after_ticks,
            no_worker: args.no_worker,
        },
        source,
        reconciler,
        router,
        sweeper,
        storage.clone(),
        storage.clone(),
        supervisor.clone(),
        config.timetable.clone(),
    );

    let shutdown_rx = lifecycle.subscribe();
    let scheduler_task = tokio::spawn(async move {
        sched.run(shutdown_rx).await;
    });

    info!("CHULGYEOL 에이전트 실행 중 (Ctrl+C로 종료)");

    // OS 시그널 대기
    lifecycle.wait_for_signal().await;

    // 진행 중인 틱이 끝나길 기다린 뒤 워커를 내린다
    let _ = scheduler_task.await;
    if !args.no_worker {
        supervisor.stop().await;
    }

    info!("CHULGYEOL 에이전트 종료");
    Ok(())
}
