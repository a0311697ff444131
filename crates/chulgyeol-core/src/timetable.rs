//! 자습실 고정 시간표.
//!
//! 점심/저녁/쉬는시간 창, 교시, 정규 하원 시각, 지각 기준을 정의한다.
//! 일정 검증기와 예상 복귀 계산기의 입력이며 설정 파일로 덮어쓸 수 있다.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

fn hm(hour: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, min, 0).expect("유효한 시각")
}

/// 시간 창 (시작 ~ 끝, 경계 포함)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// 주어진 시각이 창 안에 있는지 (경계 포함)
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }

    /// 알림 사유 문자열용 라벨 (예: "12:00~13:00")
    pub fn label(&self) -> String {
        format!(
            "{}~{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// 교시
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// 교시 이름 (예: "1교시")
    pub name: String,
    pub window: TimeWindow,
}

/// 자습실 시간표
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timetable {
    /// 점심시간 창
    pub lunch: TimeWindow,
    /// 저녁시간 창
    pub dinner: TimeWindow,
    /// 쉬는시간 창 목록 (각 창의 끝은 다음 교시 시작과 일치)
    pub breaks: Vec<TimeWindow>,
    /// 교시 목록 (지각 해제·예상 복귀 계산용)
    pub periods: Vec<Period>,
    /// 정규 하원 시각
    pub closing: NaiveTime,
    /// 지각 기준 시각 (이후 입장은 지각)
    pub late_threshold: NaiveTime,
}

impl Default for Timetable {
    fn default() -> Self {
        let period = |name: &str, sh, sm, eh, em| Period {
            name: name.to_string(),
            window: TimeWindow::new(hm(sh, sm), hm(eh, em)),
        };
        Self {
            lunch: TimeWindow::new(hm(12, 0), hm(13, 0)),
            dinner: TimeWindow::new(hm(18, 0), hm(19, 0)),
            breaks: vec![
                TimeWindow::new(hm(10, 0), hm(10, 20)),
                TimeWindow::new(hm(15, 0), hm(15, 20)),
                TimeWindow::new(hm(16, 40), hm(16, 50)),
                TimeWindow::new(hm(20, 20), hm(20, 30)),
            ],
            periods: vec![
                period("1교시", 8, 0, 10, 0),
                period("2교시", 10, 20, 12, 0),
                period("3교시", 13, 0, 15, 0),
                period("4교시", 15, 20, 16, 40),
                period("5교시", 16, 50, 18, 0),
                period("6교시", 19, 0, 20, 20),
                period("7교시", 20, 30, 22, 0),
            ],
            closing: hm(22, 0),
            late_threshold: hm(8, 0),
        }
    }
}

impl Timetable {
    /// 주어진 시각을 포함하는 쉬는시간 창
    pub fn containing_break(&self, time: NaiveTime) -> Option<&TimeWindow> {
        self.breaks.iter().find(|w| w.contains(time))
    }

    /// 주어진 시각 이후 가장 가까운 교시 시작 시각 (같은 날 없으면 None)
    pub fn next_period_start(&self, time: NaiveTime) -> Option<NaiveTime> {
        self.periods
            .iter()
            .map(|p| p.window.start)
            .find(|start| *start > time)
    }

    /// 주어진 시각이 속한 교시
    pub fn current_period(&self, time: NaiveTime) -> Option<&Period> {
        self.periods.iter().find(|p| p.window.contains(time))
    }

    /// (prev, now] 구간에 시작된 교시 — 지각→자습중 전환 트리거
    pub fn period_started_between(&self, prev: NaiveTime, now: NaiveTime) -> Option<&Period> {
        self.periods
            .iter()
            .find(|p| prev < p.window.start && p.window.start <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lunch_window_contains_boundaries() {
        let tt = Timetable::default();
        assert!(tt.lunch.contains(hm(12, 0)));
        assert!(tt.lunch.contains(hm(12, 30)));
        assert!(tt.lunch.contains(hm(13, 0)));
        assert!(!tt.lunch.contains(hm(11, 30)));
    }

    #[test]
    fn break_lookup() {
        let tt = Timetable::default();
        assert_eq!(
            tt.containing_break(hm(10, 5)).map(TimeWindow::label),
            Some("10:00~10:20".to_string())
        );
        assert!(tt.containing_break(hm(11, 0)).is_none());
    }

    #[test]
    fn next_period_start_after_lunch() {
        let tt = Timetable::default();
        // 점심(12:15) 이후 다음 교시는 3교시 13:00
        assert_eq!(tt.next_period_start(hm(12, 15)), Some(hm(13, 0)));
        // 마지막 교시 시작 후에는 없음
        assert_eq!(tt.next_period_start(hm(21, 0)), None);
    }

    #[test]
    fn break_end_matches_next_period_start() {
        let tt = Timetable::default();
        for brk in &tt.breaks {
            assert_eq!(tt.next_period_start(brk.start), Some(brk.end));
        }
    }

    #[test]
    fn period_started_between_detects_crossing() {
        let tt = Timetable::default();
        let started = tt.period_started_between(hm(12, 59), hm(13, 0)).unwrap();
        assert_eq!(started.name, "3교시");
        assert!(tt.period_started_between(hm(13, 1), hm(13, 5)).is_none());
    }
}
