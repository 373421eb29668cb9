//! 타임프레임 컨텍스트와 멀티 타임프레임 컨플루언스 결과.
//!
//! 각 (심볼, 타임프레임) 파이프라인은 캔들 마감마다 [`TimeframeContext`] 스냅샷을
//! 만들고, 집계기는 이 스냅샷들로부터 [`ConfluenceResult`]를 계산합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Bias, Direction, StructureEvent, TrendState, Zone};
use crate::types::{Price, Timeframe};

/// 멀티 타임프레임 계층에서의 역할.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierRole {
    /// 진입 타임프레임 (시그널이 생성되는 계층)
    Entry,
    /// 확인 타임프레임
    Confirmation,
    /// 추세 타임프레임
    Trend,
}

impl fmt::Display for TierRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierRole::Entry => write!(f, "entry"),
            TierRole::Confirmation => write!(f, "confirmation"),
            TierRole::Trend => write!(f, "trend"),
        }
    }
}

/// 한 타임프레임의 분석 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeContext {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// 내부 추세 상태 (보고 시에는 [`TrendState::reported`] 사용)
    pub trend: TrendState,
    /// 종료되지 않은 존
    pub active_zones: Vec<Zone>,
    /// 최근 구조 이벤트 (오래된 순)
    pub recent_events: Vec<StructureEvent>,
    /// 마지막 종가
    pub last_close: Option<Price>,
    /// 마지막 캔들 시작 시각
    pub last_candle_at: Option<DateTime<Utc>>,
    /// 누적 캔들 수
    pub bar_count: usize,
}

impl TimeframeContext {
    /// 빈 컨텍스트를 생성합니다.
    pub fn empty(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            trend: TrendState::Undefined,
            active_zones: Vec::new(),
            recent_events: Vec::new(),
            last_close: None,
            last_candle_at: None,
            bar_count: 0,
        }
    }

    /// 방향성 바이어스.
    pub fn bias(&self) -> Bias {
        self.trend.bias()
    }

    /// 가장 최근 구조 이벤트.
    pub fn latest_event(&self) -> Option<&StructureEvent> {
        self.recent_events.last()
    }

    /// 마지막 캔들 인덱스 (캔들이 없으면 `None`).
    pub fn last_index(&self) -> Option<usize> {
        self.bar_count.checked_sub(1)
    }
}

/// 후보 방향 대비 타임프레임 정렬 정도.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// 모든 계층이 일치
    Full,
    /// 가중치 과반이 일치
    Partial,
    /// 정렬 없음
    Unaligned,
}

/// 계층 하나의 바이어스 기여.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBias {
    pub role: TierRole,
    pub timeframe: Timeframe,
    pub bias: Bias,
    pub weight: f64,
    /// 데이터가 부족해 중립으로 처리되었는지
    pub insufficient_history: bool,
}

/// 멀티 타임프레임 집계 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceResult {
    /// 정렬을 판단한 후보 방향
    pub candidate: Direction,
    pub biases: Vec<TierBias>,
    pub alignment: Alignment,
    /// 설정된 이산 배수 중 하나
    pub multiplier: f64,
    /// Σ wᵢ·sign(biasᵢ) / Σ wᵢ, 범위 [-1, 1]
    pub weighted_bias: f64,
    /// 정렬 없음으로 후보 시그널이 억제되었는지
    pub suppressed: bool,
    /// 주요 기여 요인 (가중치 순)
    pub dominant_factors: Vec<String>,
}
