//! 다중 타임프레임 정렬 유틸리티.
//!
//! 리플레이에서 미래 데이터 누출(Look-Ahead Bias)을 막기 위해 여러 타임프레임의
//! 캔들을 "마감 시각" 순서로 병합합니다.
//!
//! # 핵심 개념
//!
//! 상위 타임프레임 캔들은 마감된 뒤에만 하위 타임프레임 판단에 반영되어야 합니다.
//!
//! - 1시간봉 10:00 마감, 4시간봉 08:00~12:00 캔들은 12:00 마감
//! - 10:00 시점의 엔트리 판단은 08:00에 마감된 4시간봉까지만 봅니다
//!
//! 마감 시각이 같으면 상위 타임프레임을 먼저 내보내서, 같은 시각에 마감된
//! 엔트리 캔들이 최신 상위 추세를 보게 합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sharp_core::{Candle, Timeframe};
use std::cmp::Reverse;

/// 타임프레임 태그가 붙은 마감 캔들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedCandle {
    pub timeframe: Timeframe,
    pub close_time: DateTime<Utc>,
    pub candle: Candle,
}

impl TimedCandle {
    pub fn new(timeframe: Timeframe, candle: Candle) -> Self {
        Self {
            timeframe,
            close_time: candle.close_time(timeframe),
            candle,
        }
    }
}

/// 타임프레임 정렬 유틸리티.
pub struct TimeframeAligner;

impl TimeframeAligner {
    /// 여러 타임프레임 캔들을 마감 시각 순서로 병합합니다.
    ///
    /// 정렬 키: (마감 시각, 상위 타임프레임 우선, 시작 시각). 입력 순서와 무관하게
    /// 같은 결과를 냅니다.
    pub fn merge<I>(series: I) -> Vec<TimedCandle>
    where
        I: IntoIterator<Item = (Timeframe, Vec<Candle>)>,
    {
        let mut merged: Vec<TimedCandle> = series
            .into_iter()
            .flat_map(|(tf, candles)| candles.into_iter().map(move |c| TimedCandle::new(tf, c)))
            .collect();
        merged.sort_by_key(|t| (t.close_time, Reverse(t.timeframe), t.candle.timestamp));
        merged
    }

    /// 두 시점 사이의 캔들 수. 연속된 캔들이면 1, 누락 구간이 있으면 더 큽니다.
    pub fn count_candles_between(start: DateTime<Utc>, end: DateTime<Utc>, timeframe: Timeframe) -> usize {
        let secs = timeframe.as_secs();
        if secs == 0 {
            return 0;
        }
        (end.signed_duration_since(start).num_seconds() / secs).max(0) as usize
    }
}

// =============================================================================
// 테스트
// =============================================================================
