//! 워커 프로세스 슈퍼바이저.
//!
//! 상태 머신: Stopped → Starting → Running → (Stopping) → Stopped,
//! Error는 Starting/Running에서 도달. 시작 핸드셰이크는 상태 아티팩트를
//! 유한 횟수 폴링하고, 중지는 명령 아티팩트 → 유예 → 강제 종료 순서다.
//! 워커 프로세스를 직접 만지는 것은 이 타입뿐이다.

use std::sync::RwLock;
use std::time::Duration;

use chulgyeol_core::config::WorkerConfig;
use chulgyeol_core::error::CoreError;
use chulgyeol_core::models::worker::{WorkerHealth, WorkerState};
use chulgyeol_core::time::parse_record_time;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::handoff::{read_status, HandoffPaths, WorkerCommand};

/// 워커 슈퍼바이저 — 프로세스 소유 핸들
pub struct WorkerSupervisor {
    config: WorkerConfig,
    paths: HandoffPaths,
    state: RwLock<WorkerState>,
    child: Mutex<Option<Child>>,
}

impl WorkerSupervisor {
    pub fn new(config: WorkerConfig) -> Self {
        let paths = HandoffPaths::new(config.handoff_dir.clone());
        Self {
            config,
            paths,
            state: RwLock::new(WorkerState::Stopped),
            child: Mutex::new(None),
        }
    }

    pub fn paths(&self) -> &HandoffPaths {
        &self.paths
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().expect("상태 잠금 오염 없음")
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write().expect("상태 잠금 오염 없음");
        if *state != next {
            info!("워커 상태 전이: {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// 워커 시작: 프로세스 실행 후 상태 아티팩트가 running이 될 때까지
    /// 유한 횟수 폴링. 타임아웃/에러 신호는 Error로 전이하고 중단한다.
    pub async fn start(&self) -> Result<(), CoreError> {
        match self.state() {
            WorkerState::Stopped | WorkerState::Error => {}
            other => {
                return Err(CoreError::Worker(format!(
                    "시작 불가 상태: {other:?}"
                )))
            }
        }

        self.set_state(WorkerState::Starting);

        tokio::fs::create_dir_all(self.paths.dir()).await?;
        // 이전 실행의 찌꺼기 제거 — 묵은 stop 명령이 새 워커를 바로
        // 죽이는 일이 없어야 한다
        let _ = tokio::fs::remove_file(self.paths.command()).await;
        let _ = tokio::fs::remove_file(self.paths.status()).await;

        let mut command = Command::new(&self.config.command);
        command.args(&self.config.args).kill_on_drop(true);
        if let Some(ref workdir) = self.config.workdir {
            command.current_dir(workdir);
        }

        let child = command.spawn().map_err(|e| {
            self.set_state(WorkerState::Error);
            CoreError::Worker(format!("워커 프로세스 시작 실패: {e}"))
        })?;

        info!("워커 프로세스 시작됨 (PID: {:?})", child.id());
        *self.child.lock().await = Some(child);

        // 핸드셰이크 — 상태 아티팩트 폴링
        let interval = Duration::from_millis(self.config.ready_interval_ms);
        for _ in 0..self.config.ready_attempts {
            tokio::time::sleep(interval).await;

            if !self.is_alive().await {
                self.set_state(WorkerState::Error);
                return Err(CoreError::Worker(
                    "워커 프로세스가 시작 중 종료됨".to_string(),
                ));
            }

            if let Some(status) = read_status(&self.paths).await {
                match WorkerState::from_artifact_str(&status.status) {
                    Some(WorkerState::Running) => {
                        info!("워커 준비 완료");
                        self.set_state(WorkerState::Running);
                        return Ok(());
                    }
                    Some(WorkerState::Error) => {
                        self.set_state(WorkerState::Error);
                        self.kill_child().await;
                        let message =
                            status.message.unwrap_or_else(|| "워커 시작 실패".to_string());
                        if message.contains("세션 만료") {
                            return Err(CoreError::SessionExpired);
                        }
                        return Err(CoreError::Worker(message));
                    }
                    _ => {} // starting — 계속 대기
                }
            }
        }

        self.set_state(WorkerState::Error);
        self.kill_child().await;
        Err(CoreError::Worker("워커 시작 타임아웃".to_string()))
    }

    /// 프로세스 생존 확인
    pub async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        match child.as_mut() {
            Some(c) => matches!(c.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// 메인 루프 틱마다 호출 — 죽은 워커를 발견하면 Error로 전이.
    /// 자동 재시작은 하지 않는다 (느린 외부 사이트 상대로 핫 크래시
    /// 루프를 피한다; 예방적 재시작은 설정으로만).
    pub async fn check_liveness(&self) -> bool {
        let alive = self.is_alive().await;
        if !alive && self.state() == WorkerState::Running {
            warn!("워커 프로세스 종료 감지");
            self.set_state(WorkerState::Error);
        }
        alive
    }

    /// 워커 중지: stop 명령 아티팩트 → 유예 → 강제 종료
    pub async fn stop(&self) {
        if self.state() == WorkerState::Stopped {
            return;
        }
        self.set_state(WorkerState::Stopping);

        // 제어권 핸드오프 — 워커가 명령 파일을 소비하고 스스로 종료
        let command = WorkerCommand::stop();
        match serde_json::to_string(&command) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(self.paths.command(), json).await {
                    warn!("중지 명령 기록 실패: {e}");
                }
            }
            Err(e) => warn!("중지 명령 직렬화 실패: {e}"),
        }

        tokio::time::sleep(Duration::from_millis(self.config.stop_grace_ms)).await;

        if self.is_alive().await {
            warn!("워커가 유예 내 종료되지 않음 — 강제 종료");
            self.kill_child().await;
        } else {
            *self.child.lock().await = None;
        }

        self.set_state(WorkerState::Stopped);
        info!("워커 중지 완료");
    }

    /// 예방적 재시작 (성공 틱 N회마다, 설정 활성 시)
    pub async fn restart(&self) -> Result<(), CoreError> {
        info!("워커 예방적 재시작");
        self.stop().await;
        self.start().await
    }

    /// 운영자 노출용 건강 상태
    pub async fn health(&self) -> WorkerHealth {
        let pid = {
            let child = self.child.lock().await;
            child.as_ref().and_then(Child::id)
        };

        let artifact = read_status(&self.paths).await;
        let (message, last_heartbeat) = match artifact {
            Some(status) => (
                status.message,
                status.timestamp.as_deref().and_then(parse_record_time),
            ),
            None => (None, None),
        };

        WorkerHealth {
            state: self.state(),
            pid,
            message,
            last_heartbeat,
        }
    }

    async fn kill_child(&self) {
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            if let Err(e) = child.kill().await {
                warn!("워커 강제 종료 실패: {e}");
            }
        }
    }
}
