//! 원본 이벤트 소스 포트.
//!
//! 구현: `chulgyeol-worker` crate (핸드오프 결과 파일)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::event::RawEvent;

/// 외부 스크래핑 워커가 넘긴 원본 출결 행의 소스.
///
/// 일시적 외부 실패(사이트 미응답 등)는 빈 배치로 나타나며
/// 다음 틱에서 자연히 재시도된다. 세션 만료만 에러로 전파된다.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// 최신 스크래핑 배치 반환
    async fn fetch_batch(&self) -> Result<Vec<RawEvent>, CoreError>;
}
