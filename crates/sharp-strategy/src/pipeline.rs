//! (심볼, 타임프레임)별 분석 파이프라인.
//!
//! 마감된 캔들 하나마다 다음 순서로 동작합니다:
//!
//! 1. 시퀀스 검증 (재전송이면 무시, 잘못된 캔들이면 정지)
//! 2. 스윙 포인트 갱신
//! 3. 종가 기준 BOS/CHoCH 판정
//! 4. 존 생성/상태 전이/정리
//!
//! 파이프라인은 자기 캔들 버퍼와 파생 상태만 소유하며 다른 파이프라인과
//! 가변 상태를 공유하지 않습니다.

use std::collections::VecDeque;

use sharp_analytics::{
    StructureAnalyzer, StructureConfig, StructureState, SwingConfig, SwingPointDetector, SwingRefs,
    ZoneConfig, ZoneDetector, ZoneUpdate,
};
use sharp_core::{
    check_sequence, pipeline_span, Candle, SequenceCheck, SharpError, SharpResult,
    StructureEvent, SwingKind, Timeframe, TimeframeContext,
};
use tracing::{debug, error, info};

use crate::config::PipelineConfig;

/// 한 캔들 처리 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum CandleOutcome {
    /// 새 캔들이 반영됨
    Processed(CycleUpdate),
    /// 직전 캔들과 동일한 재전송. 상태 변화 없음.
    Rerun,
}

/// 새 캔들 반영 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleUpdate {
    /// 캔들의 절대 인덱스
    pub index: usize,
    /// 이번 캔들에서 발생한 구조 이벤트
    pub event: Option<StructureEvent>,
    pub zones: ZoneUpdate,
}

/// 파이프라인 생성에 필요한 설정 묶음.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub swing: SwingConfig,
    pub structure: StructureConfig,
    pub zones: ZoneConfig,
    /// 보관할 캔들 수
    pub buffer_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            swing: SwingConfig::default(),
            structure: StructureConfig::default(),
            zones: ZoneConfig::default(),
            buffer_capacity: PipelineConfig::default().buffer_capacity,
        }
    }
}

/// 단일 타임프레임 파이프라인.
#[derive(Debug, Clone)]
pub struct TimeframePipeline {
    symbol: String,
    timeframe: Timeframe,
    settings: PipelineSettings,
    candles: Vec<Candle>,
    bar_count: usize,
    swings: SwingPointDetector,
    analyzer: StructureAnalyzer,
    state: StructureState,
    zones: ZoneDetector,
    recent_events: VecDeque<StructureEvent>,
    halted: Option<String>,
}

impl TimeframePipeline {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, settings: PipelineSettings) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            candles: Vec::with_capacity(settings.buffer_capacity),
            bar_count: 0,
            swings: SwingPointDetector::new(settings.swing.clone()),
            analyzer: StructureAnalyzer::new(settings.structure.clone(), timeframe),
            state: StructureState::default(),
            zones: ZoneDetector::new(settings.zones.clone()),
            recent_events: VecDeque::with_capacity(settings.structure.recent_events),
            halted: None,
            settings,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// 지금까지 반영한 캔들 수.
    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// 정지 사유.
    pub fn halt_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    pub fn last_candle(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn structure_state(&self) -> &StructureState {
        &self.state
    }

    /// 최근 `n`개 캔들 (오래된 순).
    pub fn window(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    /// 마감된 캔들 하나를 처리합니다.
    ///
    /// 잘못된 캔들은 `Configuration` 에러를 반환하고 파이프라인을 정지시킵니다.
    /// 정지된 파이프라인은 [`reset`](Self::reset) 전까지 `PipelineHalted`를 반환합니다.
    pub fn on_candle(&mut self, candle: Candle) -> SharpResult<CandleOutcome> {
        let span = pipeline_span!("pipeline", self.symbol, self.timeframe);
        let _guard = span.enter();

        if let Some(reason) = &self.halted {
            return Err(SharpError::PipelineHalted {
                symbol: self.symbol.clone(),
                timeframe: self.timeframe,
                reason: reason.clone(),
            });
        }

        match check_sequence(self.candles.last(), &candle) {
            Ok(SequenceCheck::Rerun) => {
                debug!(timestamp = %candle.timestamp, "동일 캔들 재전송: 무시");
                return Ok(CandleOutcome::Rerun);
            }
            Ok(SequenceCheck::Append) => {}
            Err(defect) => return Err(self.halt(defect.to_string())),
        }

        let index = self.bar_count;
        self.push(candle);
        let Some(candle) = self.candles.last().cloned() else {
            return Err(SharpError::Configuration("캔들 버퍼가 비어 있습니다".to_string()));
        };

        if let Some(update) = self.swings.update(index, &candle) {
            let state = std::mem::take(&mut self.state);
            self.state = self.analyzer.apply_swing(state, &update);
        }

        let state = std::mem::take(&mut self.state);
        let (state, event) = self.analyzer.on_close(state, index, &candle);
        self.state = state;

        let refs = SwingRefs {
            last_high: self.swings.last_of(SwingKind::High),
            last_low: self.swings.last_of(SwingKind::Low),
        };
        let zones = match self.zones.on_candle(&self.candles, index, event.as_ref(), refs) {
            Ok(update) => update,
            Err(err) => return Err(self.halt(err.to_string())),
        };

        if let Some(event) = &event {
            if self.recent_events.len() >= self.settings.structure.recent_events {
                self.recent_events.pop_front();
            }
            self.recent_events.push_back(event.clone());
        }

        Ok(CandleOutcome::Processed(CycleUpdate {
            index,
            event,
            zones,
        }))
    }

    /// 현재 분석 스냅샷.
    pub fn context(&self) -> TimeframeContext {
        TimeframeContext {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            trend: self.state.trend,
            active_zones: self.zones.active_zones().cloned().collect(),
            recent_events: self.recent_events.iter().cloned().collect(),
            last_close: self.candles.last().map(|c| c.close),
            last_candle_at: self.candles.last().map(|c| c.timestamp),
            bar_count: self.bar_count,
        }
    }

    /// 정지 상태를 해제합니다. 누적된 데이터와 파생 상태는 유지됩니다.
    pub fn reset(&mut self) {
        if let Some(reason) = self.halted.take() {
            info!(
                symbol = %self.symbol,
                timeframe = %self.timeframe,
                reason = %reason,
                "파이프라인 정지 해제"
            );
        }
    }

    fn halt(&mut self, reason: String) -> SharpError {
        error!(
            symbol = %self.symbol,
            timeframe = %self.timeframe,
            reason = %reason,
            "잘못된 캔들 시퀀스: 파이프라인 정지"
        );
        self.halted = Some(reason.clone());
        SharpError::Configuration(reason)
    }

    fn push(&mut self, candle: Candle) {
        self.candles.push(candle);
        self.bar_count += 1;

        // 용량의 2배가 되면 한 번에 잘라내 분할 상환 O(1) 유지
        let capacity = self.settings.buffer_capacity.max(1);
        if self.candles.len() >= capacity * 2 {
            let excess = self.candles.len() - capacity;
            self.candles.drain(..excess);
        }
    }
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sharp_core::{StructureKind, TrendState};

    // ========================================================================
    // 테스트 헬퍼 함수
    // ========================================================================

    fn candle(i: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i),
            open,
            high,
            low,
            close,
            dec!(100),
        )
    }

    /// 종가 기준 단순 캔들 (시가 = 직전 종가 근사).
    fn bar(i: i64, close: i64) -> Candle {
        let close = Decimal::from(close);
        candle(i, close - dec!(2), close + dec!(5), close - dec!(5), close)
    }

    fn pipeline() -> TimeframePipeline {
        TimeframePipeline::new(
            "BTCUSDT",
            Timeframe::H1,
            PipelineSettings {
                buffer_capacity: 50,
                ..Default::default()
            },
        )
    }

    fn feed(p: &mut TimeframePipeline, closes: &[i64]) -> Vec<StructureEvent> {
        let start = p.bar_count() as i64;
        closes
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| match p.on_candle(bar(start + i as i64, c)).unwrap() {
                CandleOutcome::Processed(update) => update.event,
                CandleOutcome::Rerun => None,
            })
            .collect()
    }

    // ========================================================================
    // 구조
    // ========================================================================

    #[test]
    fn test_break_above_swing_high_is_bos() {
        let mut p = pipeline();
        // 스윙 고점 110 (인덱스 2) 확정 후 120 종가로 돌파
        let events = feed(&mut p, &[100, 105, 110, 104, 102, 106, 120]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StructureKind::Bos);
        assert_eq!(p.context().trend, TrendState::Uptrend);
        assert_eq!(p.context().recent_events.len(), 1);
    }

    #[test]
    fn test_reversal_is_choch() {
        let mut p = pipeline();
        feed(&mut p, &[100, 105, 110, 104, 102, 106, 120]);
        // 스윙 저점 102 (인덱스 4) 아래로 종가
        let events = feed(&mut p, &[125, 118, 112, 90]);

        assert!(events.iter().any(|e| e.kind == StructureKind::Choch));
        assert_eq!(p.context().trend, TrendState::Downtrend);
    }

    // ========================================================================
    // 시퀀스 검증
    // ========================================================================

    #[test]
    fn test_rerun_is_noop() {
        let mut p = pipeline();
        let c = bar(0, 100);
        assert!(matches!(p.on_candle(c.clone()).unwrap(), CandleOutcome::Processed(_)));
        assert_eq!(p.on_candle(c).unwrap(), CandleOutcome::Rerun);
        assert_eq!(p.bar_count(), 1);
    }

    #[test]
    fn test_regression_halts_pipeline() {
        let mut p = pipeline();
        p.on_candle(bar(5, 100)).unwrap();

        let err = p.on_candle(bar(4, 101)).unwrap_err();
        assert!(matches!(err, SharpError::Configuration(_)));
        assert!(err.is_fatal());
        assert!(p.is_halted());

        let err = p.on_candle(bar(6, 101)).unwrap_err();
        assert!(matches!(err, SharpError::PipelineHalted { .. }));
        assert_eq!(p.bar_count(), 1);

        p.reset();
        assert!(!p.is_halted());
        assert!(p.on_candle(bar(6, 101)).is_ok());
        assert_eq!(p.bar_count(), 2);
    }

    #[test]
    fn test_high_below_low_halts() {
        let mut p = pipeline();
        let bad = candle(0, dec!(100), dec!(90), dec!(95), dec!(92));
        assert!(matches!(p.on_candle(bad), Err(SharpError::Configuration(_))));
        assert!(p.is_halted());
        assert!(p.last_candle().is_none());
    }

    #[test]
    fn test_conflicting_duplicate_halts() {
        let mut p = pipeline();
        p.on_candle(bar(0, 100)).unwrap();
        assert!(p.on_candle(bar(0, 101)).is_err());
        assert!(p.halt_reason().is_some());
    }

    // ========================================================================
    // 버퍼
    // ========================================================================

    #[test]
    fn test_buffer_is_bounded() {
        let mut p = pipeline();
        let closes: Vec<i64> = (0..250).map(|i| 1000 + (i % 7) * 3).collect();
        feed(&mut p, &closes);

        assert_eq!(p.bar_count(), 250);
        assert!(p.window(usize::MAX).len() < 100);
        assert_eq!(p.window(10).len(), 10);
        assert_eq!(p.context().last_index(), Some(249));
    }

    #[test]
    fn test_default_settings_keep_configured_history() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.buffer_capacity, PipelineConfig::default().buffer_capacity);

        let mut p = TimeframePipeline::new("BTCUSDT", Timeframe::H1, settings);
        let closes: Vec<i64> = (0..40).map(|i| 1000 + (i % 5) * 4).collect();
        feed(&mut p, &closes);
        assert_eq!(p.window(usize::MAX).len(), 40);
    }
}
