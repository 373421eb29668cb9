//! BOS/CHoCH 추세 상태 머신.
//!
//! 상태: `Undefined → {Uptrend, Downtrend}`, 추세 간 전환은 CHoCH로만 일어납니다.
//! - 추세 방향으로 최근 스윙을 종가 돌파: BOS, 상태 유지
//! - 추세 반대 방향으로 최근 스윙을 종가 돌파: CHoCH, 상태 반전
//! - Undefined/Ranging에서의 첫 돌파: BOS, 돌파 방향으로 추세 설정
//!
//! 각 스윙 포인트는 한 번만 돌파로 인정되므로 반전 이후 같은 방향의 종가가 이어져도
//! 추가 CHoCH는 발생하지 않습니다. 상태는 전역이 아니라 [`StructureState`] 값으로
//! 호출자에게 전달되고 반환됩니다.

use serde::{Deserialize, Serialize};
use sharp_core::{
    Candle, Direction, StructureEvent, StructureKind, SwingKind, SwingPoint, Timeframe,
    TrendState, DecimalExt,
};
use tracing::{debug, info};

use crate::config::StructureConfig;
use crate::swing::SwingUpdate;

/// (심볼, 타임프레임)별 구조 분석 상태.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureState {
    pub trend: TrendState,
    /// 가장 최근 스윙 고점
    pub last_high: Option<SwingPoint>,
    /// 가장 최근 스윙 저점
    pub last_low: Option<SwingPoint>,
    /// 이미 돌파된 스윙 고점의 캔들 인덱스
    pub broken_high: Option<usize>,
    /// 이미 돌파된 스윙 저점의 캔들 인덱스
    pub broken_low: Option<usize>,
    /// 마지막으로 발급한 이벤트 id
    pub last_event_id: u64,
    pub last_event: Option<StructureEvent>,
    /// 마지막 돌파 이후 경과한 캔들 수
    pub bars_since_break: usize,
}

/// 구조 분석기. 상태를 보관하지 않는 순수 변환기입니다.
#[derive(Debug, Clone)]
pub struct StructureAnalyzer {
    config: StructureConfig,
    timeframe: Timeframe,
}

impl StructureAnalyzer {
    pub fn new(config: StructureConfig, timeframe: Timeframe) -> Self {
        Self { config, timeframe }
    }

    /// 스윙 시퀀스 변경을 상태에 반영합니다.
    pub fn apply_swing(&self, mut state: StructureState, update: &SwingUpdate) -> StructureState {
        let point = update.point().clone();
        match point.kind {
            SwingKind::High => state.last_high = Some(point),
            SwingKind::Low => state.last_low = Some(point),
        }
        state
    }

    /// 마감된 캔들의 종가로 돌파를 판정합니다.
    pub fn on_close(
        &self,
        mut state: StructureState,
        index: usize,
        candle: &Candle,
    ) -> (StructureState, Option<StructureEvent>) {
        let up = state
            .last_high
            .as_ref()
            .filter(|h| state.broken_high != Some(h.index) && candle.close > h.price)
            .cloned();
        let down = state
            .last_low
            .as_ref()
            .filter(|l| state.broken_low != Some(l.index) && candle.close < l.price)
            .cloned();

        // 스윙 고점이 스윙 저점보다 낮은 드문 경우 캔들 방향으로 하나만 인정
        let (direction, swing) = match (up, down) {
            (Some(high), Some(low)) => {
                if candle.close >= candle.open {
                    (Direction::Up, high)
                } else {
                    (Direction::Down, low)
                }
            }
            (Some(high), None) => (Direction::Up, high),
            (None, Some(low)) => (Direction::Down, low),
            (None, None) => {
                state.bars_since_break += 1;
                self.decay(&mut state);
                return (state, None);
            }
        };

        let kind = match state.trend.direction() {
            Some(current) if current != direction => StructureKind::Choch,
            _ => StructureKind::Bos,
        };

        let strength = self.break_strength(&state, &swing, candle);

        match direction {
            Direction::Up => state.broken_high = Some(swing.index),
            Direction::Down => state.broken_low = Some(swing.index),
        }
        state.trend = TrendState::from_direction(direction);
        state.last_event_id += 1;
        state.bars_since_break = 0;

        let event = StructureEvent {
            id: state.last_event_id,
            kind,
            direction,
            price: swing.price,
            close_price: candle.close,
            swing_index: swing.index,
            timeframe: self.timeframe,
            index,
            timestamp: candle.timestamp,
            strength,
        };

        if kind == StructureKind::Choch {
            info!(
                timeframe = %self.timeframe,
                direction = %direction,
                level = %swing.price,
                close = %candle.close,
                "CHoCH: 추세 전환"
            );
        } else {
            debug!(
                timeframe = %self.timeframe,
                direction = %direction,
                level = %swing.price,
                "BOS"
            );
        }

        state.last_event = Some(event.clone());
        (state, Some(event))
    }

    /// 돌파 폭을 현재 스윙 레인지 대비 비율로 환산합니다.
    fn break_strength(&self, state: &StructureState, swing: &SwingPoint, candle: &Candle) -> f64 {
        let penetration = (candle.close - swing.price).abs().to_f64_lossy();
        let range = match (&state.last_high, &state.last_low) {
            (Some(h), Some(l)) if h.price > l.price => (h.price - l.price).to_f64_lossy(),
            _ => swing.price.to_f64_lossy() * 0.01,
        };
        if range <= 0.0 {
            return 0.0;
        }
        (penetration / range).clamp(0.0, 1.0)
    }

    fn decay(&self, state: &mut StructureState) {
        let limit = self.config.ranging_after_bars;
        if limit == 0 || state.bars_since_break < limit {
            return;
        }
        if state.trend.direction().is_some() {
            debug!(
                timeframe = %self.timeframe,
                bars = state.bars_since_break,
                "돌파 없음: 추세가 RANGING으로 소멸"
            );
            state.trend = TrendState::Ranging;
        }
    }
}
