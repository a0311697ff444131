//! CHULGYEOL 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 자체 에러를 `CoreError`로 매핑해 반환한다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 직렬화, 설정, 저장소, 워커 제어 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (저장소 등 예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// 네트워크 에러 (웹훅 전송 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Student", "AttendanceEvent")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 핸드오프 아티팩트 오류 (결과 파일 없음/손상)
    #[error("핸드오프 에러: {0}")]
    Handoff(String),

    /// 키오스크 세션 만료 — 수동 재로그인 필요, 자동 재시도 불가
    #[error("세션 만료 — 수동 재로그인 필요")]
    SessionExpired,

    /// 워커 프로세스 제어 실패 (시작 타임아웃, 비정상 종료)
    #[error("워커 에러: {0}")]
    Worker(String),
}
