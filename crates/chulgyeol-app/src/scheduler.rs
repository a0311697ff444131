//! 3-루프 스케줄러.
//!
//! 동기화(3초), 미복귀 스윕(30초), 일일 작업(교시 시작·아침 명단)
//! 오케스트레이션. 각 루프는 tokio 태스크로 돌고 watch 채널로 종료된다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use chulgyeol_core::error::CoreError;
use chulgyeol_core::ports::event_source::EventSource;
use chulgyeol_core::ports::store::{DailyStore, SyncLogStore};
use chulgyeol_core::time::now_kst;
use chulgyeol_core::timetable::Timetable;
use chulgyeol_engine::reconcile::Reconciler;
use chulgyeol_engine::router::AlertRouter;
use chulgyeol_engine::sweeper::ReturnSweeper;
use chulgyeol_worker::WorkerSupervisor;
use tracing::{error, info, warn};

/// 스케줄러 설정
pub struct SchedulerConfig {
    /// 메인 동기화 틱 간격
    pub tick_interval: Duration,
    /// 미복귀 스윕 간격
    pub sweep_interval: Duration,
    /// 강제퇴장 명단 알림 시각
    pub morning_alert_time: NaiveTime,
    /// 성공 틱 N회마다 워커 예방적 재시작 (None = 비활성)
    pub restart_after_ticks: Option<u64>,
    /// 워커 없이 핸드오프 파일만 소비 (디버깅)
    pub no_worker: bool,
}

/// 3-루프 스케줄러
pub struct Scheduler {
    config: SchedulerConfig,
    source: Arc<dyn EventSource>,
    reconciler: Arc<Reconciler>,
    router: Arc<AlertRouter>,
    sweeper: Arc<ReturnSweeper>,
    sync_log: Arc<dyn SyncLogStore>,
    daily: Arc<dyn DailyStore>,
    supervisor: Arc<WorkerSupervisor>,
    timetable: Timetable,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn EventSource>,
        reconciler: Arc<Reconciler>,
        router: Arc<AlertRouter>,
        sweeper: Arc<ReturnSweeper>,
        sync_log: Arc<dyn SyncLogStore>,
        daily: Arc<dyn DailyStore>,
        supervisor: Arc<WorkerSupervisor>,
        timetable: Timetable,
    ) -> Self {
        Self {
            config,
            source,
            reconciler,
            router,
            sweeper,
            sync_log,
            daily,
            supervisor,
            timetable,
        }
    }

    /// 모든 루프 시작. 종료 신호까지 블록한다.
    pub async fn run(&self, mut shutdown_rx: tokio::sync::watch::Receiver<bool>) {
        info!(
            "스케줄러 시작: 동기화={}ms, 스윕={}ms, 아침 알림={}",
            self.config.tick_interval.as_millis(),
            self.config.sweep_interval.as_millis(),
            self.config.morning_alert_time.format("%H:%M"),
        );

        // ============================================================
        // 1. 동기화 루프 (메인 틱)
        // ============================================================
        let source = self.source.clone();
        let reconciler = self.reconciler.clone();
        let router = self.router.clone();
        let sync_log = self.sync_log.clone();
        let supervisor1 = self.supervisor.clone();
        let tick = self.config.tick_interval;
        let restart_after = self.config.restart_after_ticks;
        let no_worker = self.config.no_worker;
        let mut shutdown1 = shutdown_rx.clone();

        let sync_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            let mut successful_ticks: u64 = 0;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // (a) 워커 생존 확인 — 죽었으면 Error 전이 후 루프 중단.
                        // 핫 크래시 루프를 피하려고 자동 재기동은 하지 않는다.
                        if !no_worker && !supervisor1.check_liveness().await {
                            error!("워커 프로세스 종료됨 — 동기화 루프 중단 (수동 재시작 필요)");
                            break;
                        }

                        // (b) 배치 수집 → 재조정 → 알림
                        match source.fetch_batch().await {
                            Ok(batch) => {
                                let (stats, processed) = reconciler.process_batch(batch).await;

                                for item in &processed {
                                    if let Err(e) = router.dispatch(item).await {
                                        warn!("알림 디스패치 실패: {e}");
                                    }
                                }

                                if let Err(e) = sync_log
                                    .log_sync(stats.fetched, stats.new_records, "success", None)
                                    .await
                                {
                                    warn!("동기화 로그 기록 실패: {e}");
                                }

                                if stats.new_records > 0 {
                                    info!(
                                        "동기화 완료: 수집 {}건, 신규 {}건",
                                        stats.fetched, stats.new_records
                                    );
                                }

                                // 예방적 재시작 — 성공 틱 N회마다
                                successful_ticks += 1;
                                if let (Some(n), false) = (restart_after, no_worker) {
                                    if n > 0 && successful_ticks % n == 0 {
                                        if let Err(e) = supervisor1.restart().await {
                                            error!("워커 재시작 실패 — 동기화 루프 중단: {e}");
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(CoreError::SessionExpired) => {
                                // 만료된 세션에 재시도는 무의미 — 수동 개입 표면화
                                error!("세션 만료 — 수동 재로그인 필요, 동기화 중단");
                                let _ = sync_log
                                    .log_sync(0, 0, "error", Some("세션 만료"))
                                    .await;
                                if !no_worker {
                                    supervisor1.stop().await;
                                }
                                break;
                            }
                            Err(e) => {
                                warn!("동기화 오류: {e}");
                                let detail = e.to_string();
                                let _ = sync_log
                                    .log_sync(0, 0, "error", Some(detail.as_str()))
                                    .await;
                            }
                        }
                    }
                    _ = shutdown1.changed() => {
                        info!("동기화 루프 종료");
                        break;
                    }
                }
            }
        });

        // ============================================================
        // 2. 미복귀 스윕 루프
        // ============================================================
        let sweeper2 = self.sweeper.clone();
        let sweep_interval = self.config.sweep_interval;
        let mut shutdown2 = shutdown_rx.clone();

        let sweep_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = sweeper2.sweep_overdue(now_kst()).await {
                            warn!("미복귀 스윕 실패: {e}");
                        }
                    }
                    _ = shutdown2.changed() => {
                        info!("미복귀 스윕 루프 종료");
                        break;
                    }
                }
            }
        });

        // ============================================================
        // 3. 일일 작업 루프 (교시 시작 지각 해제, 아침 강제퇴장 명단)
        // ============================================================
        let sweeper3 = self.sweeper.clone();
        let daily3 = self.daily.clone();
        let mut jobs = DailyJobs::new(self.config.morning_alert_time, now_kst());
        let timetable = self.timetable.clone();
        let mut shutdown3 = shutdown_rx.clone();

        let daily_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = now_kst();
                        let due = jobs.due(now, &timetable);

                        if due.period_started {
                            if let Err(e) = daily3.convert_late_to_studying(now.date_naive()).await {
                                warn!("지각 상태 전환 실패: {e}");
                            }
                        }

                        if let Some(date) = due.morning_roster_for {
                            if let Err(e) = sweeper3.forced_exit_roster(date).await {
                                warn!("강제퇴장 명단 알림 실패: {e}");
                            }
                        }
                    }
                    _ = shutdown3.changed() => {
                        info!("일일 작업 루프 종료");
                        break;
                    }
                }
            }
        });

        // ============================================================
        // 종료 대기 — 진행 중인 틱은 select 단위로 완결된다
        // ============================================================
        let _ = shutdown_rx.changed().await;
        info!("스케줄러 종료 신호 수신");

        let _ = sync_task.await;
        let _ = sweep_task.await;
        let _ = daily_task.await;
    }
}

/// 하루 1회/교시 단위 작업의 발화 시점 추적.
///
/// 30초 틱에서 호출되며, (이전 틱, 이번 틱] 구간에 교시 시작이나
/// 아침 알림 시각이 걸쳤는지 판정한다. 프로세스가 알림 시각 이후에
/// 떠도 그날 명단을 중복 발송하지 않는다.
struct DailyJobs {
    morning_alert_time: NaiveTime,
    morning_sent_on: Option<NaiveDate>,
    last_tick: DateTime<FixedOffset>,
}

/// 이번 틱에 발화할 작업
struct DueJobs {
    /// 강제퇴장 명단 대상 날짜 (어제)
    morning_roster_for: Option<NaiveDate>,
    /// 이번 틱 사이에 교시가 시작됨
    period_started: bool,
}

impl DailyJobs {
    fn new(morning_alert_time: NaiveTime, now: DateTime<FixedOffset>) -> Self {
        // 알림 시각이 이미 지난 채 기동하면 오늘 발화는 건너뛴다
        // (재기동 시 중복 명단 방지)
        let morning_sent_on = if now.time() >= morning_alert_time {
            Some(now.date_naive())
        } else {
            None
        };
        Self {
            morning_alert_time,
            morning_sent_on,
            last_tick: now,
        }
    }

    fn due(&mut self, now: DateTime<FixedOffset>, timetable: &Timetable) -> DueJobs {
        let today = now.date_naive();
        let prev = self.last_tick;
        self.last_tick = now;

        // 자정을 넘겼으면 이전 시각은 00:00으로 본다
        let prev_time = if prev.date_naive() == today {
            prev.time()
        } else {
            NaiveTime::from_hms_opt(0, 0, 0).expect("유효한 시각")
        };

        let morning_roster_for = if self.morning_sent_on != Some(today)
            && prev_time < self.morning_alert_time
            && now.time() >= self.morning_alert_time
        {
            self.morning_sent_on = Some(today);
            today.pred_opt()
        } else {
            None
        };

        let period_started = timetable
            .period_started_between(prev_time, now.time())
            .is_some();

        DueJobs {
            morning_roster_for,
            period_started,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chulgyeol_core::time::at;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn kst(day: u32, h: u32, m: u32) -> DateTime<FixedOffset> {
        at(NaiveDate::from_ymd_opt(2025, 12, day).unwrap(), hm(h, m))
    }

    #[test]
    fn morning_roster_fires_once_on_crossing() {
        let tt = Timetable::default();
        let mut jobs = DailyJobs::new(hm(9, 0), kst(3, 8, 58));

        // 8:59 — 아직
        assert!(jobs.due(kst(3, 8, 59), &tt).morning_roster_for.is_none());

        // 9:00 경계 통과 — 어제 날짜로 발화
        let due = jobs.due(kst(3, 9, 0), &tt);
        assert_eq!(
            due.morning_roster_for,
            Some(NaiveDate::from_ymd_opt(2025, 12, 2).unwrap())
        );

        // 같은 날 재발화 없음
        assert!(jobs.due(kst(3, 9, 1), &tt).morning_roster_for.is_none());
        assert!(jobs.due(kst(3, 15, 0), &tt).morning_roster_for.is_none());

        // 다음날 다시 발화
        let next = jobs.due(kst(4, 9, 0), &tt);
        assert_eq!(
            next.morning_roster_for,
            Some(NaiveDate::from_ymd_opt(2025, 12, 3).unwrap())
        );
    }

    #[test]
    fn startup_after_alert_time_skips_today() {
        let tt = Timetable::default();
        // 14:00에 기동 — 오늘 명단은 이미 보낸 것으로 간주
        let mut jobs = DailyJobs::new(hm(9, 0), kst(3, 14, 0));
        assert!(jobs.due(kst(3, 14, 1), &tt).morning_roster_for.is_none());

        // 다음날 9시에는 발화
        let due = jobs.due(kst(4, 9, 0), &tt);
        assert!(due.morning_roster_for.is_some());
    }

    #[test]
    fn period_start_crossing_detected() {
        let tt = Timetable::default();
        let mut jobs = DailyJobs::new(hm(9, 0), kst(3, 12, 58));

        // 12:59 → 아직 (3교시는 13:00 시작)
        assert!(!jobs.due(kst(3, 12, 59), &tt).period_started);
        // 13:00 경계 통과
        assert!(jobs.due(kst(3, 13, 0), &tt).period_started);
        // 13:01 — 더 이상 아님
        assert!(!jobs.due(kst(3, 13, 1), &tt).period_started);
    }
}
