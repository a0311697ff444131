//! 키오스크 상태 문자열 파서.
//!
//! `외출(점심식사)` → (외출, 점심식사). 강제퇴장 마커는 괄호 안에
//! 있어도 우선한다: `퇴장(강제퇴장)` → (강제퇴장, None).

use chulgyeol_core::models::event::{EventKind, OutingReason};

/// 원본 상태 문자열을 (주 상태, 상세 사유)로 분리.
///
/// 실패하지 않는다 — 파싱 불가능한 텍스트는 전체가 주 상태가 된다.
pub fn parse_status(raw: &str) -> (EventKind, Option<OutingReason>) {
    let raw = raw.trim();

    // 강제퇴장 특수 처리
    if raw.contains("강제퇴장") {
        return (EventKind::ForcedExit, None);
    }

    // `주상태(상세)` 형식
    if let Some(open) = raw.find('(') {
        if raw.ends_with(')') && open > 0 {
            let main = &raw[..open];
            let detail = &raw[open + '('.len_utf8()..raw.len() - ')'.len_utf8()];
            if !detail.is_empty() {
                return (EventKind::parse(main), Some(OutingReason::parse(detail)));
            }
        }
    }

    (EventKind::parse(raw), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_status() {
        assert_eq!(parse_status("입장"), (EventKind::Entry, None));
        assert_eq!(parse_status("재입장"), (EventKind::ReEntry, None));
        assert_eq!(parse_status("퇴장"), (EventKind::Exit, None));
    }

    #[test]
    fn status_with_detail() {
        assert_eq!(
            parse_status("외출(점심식사)"),
            (EventKind::Outing, Some(OutingReason::Lunch))
        );
        assert_eq!(
            parse_status("이동(7층 학원수업)"),
            (EventKind::Transfer, Some(OutingReason::AcademyClass))
        );
    }

    #[test]
    fn forced_exit_marker_wins() {
        assert_eq!(parse_status("강제퇴장"), (EventKind::ForcedExit, None));
        assert_eq!(parse_status("퇴장(강제퇴장)"), (EventKind::ForcedExit, None));
    }

    #[test]
    fn unknown_detail_is_preserved() {
        let (kind, detail) = parse_status("외출(은행 업무)");
        assert_eq!(kind, EventKind::Outing);
        assert_eq!(detail, Some(OutingReason::Other("은행 업무".to_string())));
    }

    #[test]
    fn unparseable_text_is_whole_status() {
        let (kind, detail) = parse_status("시스템 점검");
        assert_eq!(kind, EventKind::Other("시스템 점검".to_string()));
        assert!(detail.is_none());

        // 닫는 괄호 없음 — 전체가 주 상태
        let (kind, detail) = parse_status("외출(점심식사");
        assert_eq!(kind, EventKind::Other("외출(점심식사".to_string()));
        assert!(detail.is_none());

        // 빈 괄호 — 전체가 주 상태
        let (kind, detail) = parse_status("외출()");
        assert_eq!(kind, EventKind::Other("외출()".to_string()));
        assert!(detail.is_none());
    }
}
