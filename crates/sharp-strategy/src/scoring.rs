//! Sharp Score 계산.
//!
//! ```text
//! raw   = w1·structure + w2·zone + w3·momentum
//! final = clamp(raw × confluence_multiplier, 0, 100)
//! ```
//!
//! 매수/매도 두 후보 방향을 모두 채점하고 원점수가 큰 쪽을 택합니다.
//! 두 원점수 차이가 `tie_epsilon`보다 작으면 모호한 구조로 보고 NEUTRAL로 판정합니다.

use serde::{Deserialize, Serialize};
use sharp_analytics::MultiTimeframeAggregator;
use sharp_core::{
    ConfluenceResult, DecimalExt, Direction, ScoreBreakdown, SharpError, SharpResult,
    SignalDirection, StructureKind, TimeframeContext, Zone,
};
use tracing::debug;

use crate::config::ScoringConfig;

/// 한 방향의 점수 구성.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionalScore {
    pub direction: Direction,
    pub structure: f64,
    pub zone: f64,
    pub momentum: f64,
    pub raw: f64,
}

/// 스코어링 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    /// 실행 가능하면 BUY/SELL, 아니면 NEUTRAL
    pub direction: SignalDirection,
    /// 원점수가 더 큰 후보 방향 (동점이면 UP)
    pub candidate: Direction,
    pub bullish: DirectionalScore,
    pub bearish: DirectionalScore,
    /// 후보 방향의 점수 구성
    pub breakdown: ScoreBreakdown,
    pub confluence: ConfluenceResult,
    /// 두 방향 원점수 차이가 epsilon 미만
    pub ambiguous: bool,
    pub actionable: bool,
    /// 기여 요인 (컨플루언스 요인, 구조/존/모멘텀 메모 순)
    pub factors: Vec<String>,
}

impl ScoreOutcome {
    pub fn final_score(&self) -> f64 {
        self.breakdown.final_score
    }
}

/// 스코어링 엔진.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    min_bars: usize,
}

impl ScoringEngine {
    /// `min_bars`보다 캔들이 적은 진입 컨텍스트는 `DataInsufficient`로 거부됩니다.
    pub fn new(config: ScoringConfig, min_bars: usize) -> Self {
        Self { config, min_bars }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// 최근 구조 이벤트 점수.
    ///
    /// 이벤트 방향이 `direction`과 같을 때만 `(base + bonus × strength) × 0.5^(age / half_life)`.
    pub fn structure_score(&self, ctx: &TimeframeContext, direction: Direction) -> f64 {
        let Some(event) = ctx.latest_event().filter(|e| e.direction == direction) else {
            return 0.0;
        };

        let base = match event.kind {
            StructureKind::Choch => self.config.choch_base,
            StructureKind::Bos => self.config.bos_base,
        };
        let age = ctx
            .last_index()
            .map_or(0, |last| last.saturating_sub(event.index)) as f64;
        let decay = 0.5f64.powf(age / self.config.structure_half_life);

        ((base + self.config.strength_bonus * event.strength.clamp(0.0, 1.0)) * decay).clamp(0.0, 100.0)
    }

    /// `direction` 방향의 가장 가까운 미검증 존.
    ///
    /// 가격이 아직 넘어서지 않은 존만 대상입니다 (상승 존은 종가 ≥ 하단, 하락 존은 종가 ≤ 상단).
    pub fn nearest_zone<'a>(&self, ctx: &'a TimeframeContext, direction: Direction) -> Option<&'a Zone> {
        let close = ctx.last_close?;
        ctx.active_zones
            .iter()
            .filter(|z| z.direction == direction && z.is_untested())
            .filter(|z| match direction {
                Direction::Up => close >= z.price_low,
                Direction::Down => close <= z.price_high,
            })
            .min_by(|a, b| {
                a.distance_to(close)
                    .cmp(&b.distance_to(close))
                    .then_with(|| b.strength.total_cmp(&a.strength))
                    .then_with(|| b.id.cmp(&a.id))
            })
    }

    /// 가장 가까운 미검증 존의 근접도와 강도 점수.
    pub fn zone_score(&self, ctx: &TimeframeContext, direction: Direction) -> f64 {
        let (Some(zone), Some(close)) = (self.nearest_zone(ctx, direction), ctx.last_close) else {
            return 0.0;
        };
        let close_f = close.to_f64_lossy();
        if close_f <= 0.0 {
            return 0.0;
        }

        let distance_pct = zone.distance_to(close).to_f64_lossy() / close_f;
        let proximity = (1.0 - distance_pct / self.config.max_zone_distance_pct).max(0.0);
        (100.0 * (0.5 * proximity + 0.5 * zone.strength.clamp(0.0, 1.0))).clamp(0.0, 100.0)
    }

    /// 부호 있는 모멘텀(-100 ~ 100)을 방향 점수로 변환: `50 ± momentum / 2`.
    pub fn momentum_score(&self, momentum: f64, direction: Direction) -> f64 {
        let m = if momentum.is_finite() {
            momentum.clamp(-100.0, 100.0)
        } else {
            0.0
        };
        (50.0 + direction.sign() * m / 2.0).clamp(0.0, 100.0)
    }

    /// 한 방향의 가중 원점수.
    pub fn directional(&self, ctx: &TimeframeContext, direction: Direction, momentum: f64) -> DirectionalScore {
        let structure = self.structure_score(ctx, direction);
        let zone = self.zone_score(ctx, direction);
        let momentum = self.momentum_score(momentum, direction);
        let raw = self.config.structure_weight * structure
            + self.config.zone_weight * zone
            + self.config.momentum_weight * momentum;

        DirectionalScore {
            direction,
            structure,
            zone,
            momentum,
            raw,
        }
    }

    /// 진입 컨텍스트와 전체 계층 컨텍스트로 Sharp Score를 계산합니다.
    pub fn score(
        &self,
        entry: &TimeframeContext,
        momentum: f64,
        aggregator: &MultiTimeframeAggregator,
        contexts: &[TimeframeContext],
    ) -> SharpResult<ScoreOutcome> {
        if entry.bar_count < self.min_bars {
            return Err(SharpError::DataInsufficient {
                required: self.min_bars,
                provided: entry.bar_count,
            });
        }

        let bullish = self.directional(entry, Direction::Up, momentum);
        let bearish = self.directional(entry, Direction::Down, momentum);

        let ambiguous = (bullish.raw - bearish.raw).abs() < self.config.tie_epsilon;
        let winner = if bullish.raw >= bearish.raw { &bullish } else { &bearish };
        let candidate = winner.direction;

        let confluence = aggregator.evaluate(candidate, contexts);
        let final_score = (winner.raw * confluence.multiplier).clamp(0.0, 100.0);
        let actionable = final_score >= self.config.threshold && !confluence.suppressed && !ambiguous;

        let breakdown = ScoreBreakdown {
            structure: winner.structure,
            zone: winner.zone,
            momentum: winner.momentum,
            raw: winner.raw,
            multiplier: confluence.multiplier,
            final_score,
        };

        let factors = self.factors(entry, winner, momentum, &confluence);

        debug!(
            timeframe = %entry.timeframe,
            candidate = %candidate,
            bull = bullish.raw,
            bear = bearish.raw,
            final_score,
            ambiguous,
            actionable,
            "스코어 계산"
        );

        Ok(ScoreOutcome {
            direction: if actionable {
                SignalDirection::from(candidate)
            } else {
                SignalDirection::Neutral
            },
            candidate,
            breakdown,
            ambiguous,
            actionable,
            factors,
            bullish,
            bearish,
            confluence,
        })
    }

    fn factors(
        &self,
        entry: &TimeframeContext,
        winner: &DirectionalScore,
        momentum: f64,
        confluence: &ConfluenceResult,
    ) -> Vec<String> {
        let mut factors = confluence.dominant_factors.clone();

        if winner.structure > 0.0 {
            if let Some(event) = entry.latest_event() {
                factors.push(format!(
                    "{} {} {} at {} (strength {:.2})",
                    entry.timeframe, event.kind, event.direction, event.price, event.strength
                ));
            }
        }
        if let Some(zone) = self.nearest_zone(entry, winner.direction) {
            factors.push(format!(
                "{} {} {} {}-{} (strength {:.2})",
                entry.timeframe,
                zone.kind.name(),
                zone.direction,
                zone.price_low,
                zone.price_high,
                zone.strength
            ));
        }
        factors.push(format!("momentum {:+.1}", momentum));
        factors
    }
}

/// 거래 방향 앞쪽에 있는 가장 가까운 반대 방향 존 (익절 정책 입력).
pub fn nearest_opposing_zone(ctx: &TimeframeContext, direction: Direction) -> Option<&Zone> {
    let close = ctx.last_close?;
    ctx.active_zones
        .iter()
        .filter(|z| z.direction == direction.opposite())
        .filter(|z| match direction {
            Direction::Up => z.price_low > close,
            Direction::Down => z.price_high < close,
        })
        .min_by(|a, b| a.distance_to(close).cmp(&b.distance_to(close)).then_with(|| a.id.cmp(&b.id)))
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sharp_analytics::ConfluenceConfig;
    use sharp_core::{BlockStatus, StructureEvent, Timeframe, TrendState, ZoneKind};

    // ========================================================================
    // 테스트 헬퍼 함수
    // ========================================================================

    fn event(kind: StructureKind, direction: Direction, index: usize, strength: f64) -> StructureEvent {
        StructureEvent {
            id: 3,
            kind,
            direction,
            price: dec!(43400),
            close_price: dec!(43420),
            swing_index: index.saturating_sub(5),
            timeframe: Timeframe::H1,
            index,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            strength,
        }
    }

    fn zone(id: u64, direction: Direction, low: Decimal, high: Decimal, strength: f64) -> Zone {
        Zone {
            id,
            kind: ZoneKind::OrderBlock {
                status: BlockStatus::Untested,
            },
            direction,
            price_high: high,
            price_low: low,
            strength,
            created_index: 50,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            resolved_index: None,
            source_event: Some(3),
        }
    }

    fn ctx(timeframe: Timeframe, trend: TrendState, bars: usize) -> TimeframeContext {
        let mut c = TimeframeContext::empty("BTCUSDT", timeframe);
        c.trend = trend;
        c.bar_count = bars;
        c.last_close = Some(dec!(43260));
        c
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(ScoringConfig::default(), 60)
    }

    fn aggregator() -> MultiTimeframeAggregator {
        MultiTimeframeAggregator::new(ConfluenceConfig::default(), 60)
    }

    fn aligned_contexts(entry: &TimeframeContext, trend: TrendState) -> Vec<TimeframeContext> {
        vec![
            entry.clone(),
            ctx(Timeframe::H4, trend, 100),
            ctx(Timeframe::D1, trend, 100),
        ]
    }

    // ========================================================================
    // 구성 점수
    // ========================================================================

    #[test]
    fn test_structure_score_base_and_decay() {
        let e = engine();
        let mut c = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        c.recent_events.push(event(StructureKind::Choch, Direction::Up, 99, 0.0));

        assert_eq!(e.structure_score(&c, Direction::Up), 80.0);
        assert_eq!(e.structure_score(&c, Direction::Down), 0.0);

        // 24캔들 경과: 반감
        c.recent_events[0].index = 75;
        assert!((e.structure_score(&c, Direction::Up) - 40.0).abs() < 1e-9);

        // BOS + 강도 0.5
        c.recent_events[0] = event(StructureKind::Bos, Direction::Up, 99, 0.5);
        assert_eq!(e.structure_score(&c, Direction::Up), 80.0);
    }

    #[test]
    fn test_zone_score_proximity_and_strength() {
        let e = engine();
        let mut c = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        c.active_zones.push(zone(1, Direction::Up, dec!(43150), dec!(43260), 0.4));

        // 종가가 존 안: 근접도 1.0
        assert!((e.zone_score(&c, Direction::Up) - 70.0).abs() < 1e-9);
        assert_eq!(e.zone_score(&c, Direction::Down), 0.0);
    }

    #[test]
    fn test_zone_crossed_is_ignored() {
        let e = engine();
        let mut c = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        // 종가가 상승 존 아래 → 이미 관통
        c.active_zones.push(zone(1, Direction::Up, dec!(43300), dec!(43400), 0.9));
        assert_eq!(e.zone_score(&c, Direction::Up), 0.0);
    }

    #[test]
    fn test_zone_far_away_only_strength() {
        let e = engine();
        let mut c = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        // 종가 대비 약 7.5% 아래
        c.active_zones.push(zone(1, Direction::Up, dec!(39000), dec!(40000), 0.6));
        assert!((e.zone_score(&c, Direction::Up) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_zone_prefers_closer() {
        let e = engine();
        let mut c = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        c.active_zones.push(zone(1, Direction::Up, dec!(42000), dec!(42100), 0.9));
        c.active_zones.push(zone(2, Direction::Up, dec!(43100), dec!(43200), 0.3));

        assert_eq!(e.nearest_zone(&c, Direction::Up).unwrap().id, 2);
    }

    #[test]
    fn test_momentum_score() {
        let e = engine();
        assert_eq!(e.momentum_score(20.0, Direction::Up), 60.0);
        assert_eq!(e.momentum_score(20.0, Direction::Down), 40.0);
        assert_eq!(e.momentum_score(500.0, Direction::Up), 100.0);
        assert_eq!(e.momentum_score(f64::NAN, Direction::Down), 50.0);
    }

    // ========================================================================
    // 판정
    // ========================================================================

    #[test]
    fn test_actionable_buy() {
        let e = engine();
        let mut entry = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        entry.recent_events.push(event(StructureKind::Choch, Direction::Up, 99, 0.0));
        entry.active_zones.push(zone(1, Direction::Up, dec!(43150), dec!(43260), 0.4));
        let contexts = aligned_contexts(&entry, TrendState::Uptrend);

        let outcome = e.score(&entry, 20.0, &aggregator(), &contexts).unwrap();

        assert!((outcome.breakdown.raw - 71.5).abs() < 1e-9);
        assert_eq!(outcome.breakdown.multiplier, 1.0);
        assert_eq!(outcome.direction, SignalDirection::Buy);
        assert!(outcome.actionable);
        assert!(!outcome.ambiguous);
        assert!(outcome.factors.iter().any(|f| f.contains("CHoCH")));
    }

    #[test]
    fn test_below_threshold_is_neutral() {
        let e = engine();
        let mut entry = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        entry.recent_events.push(event(StructureKind::Bos, Direction::Up, 99, 0.0));
        let contexts = aligned_contexts(&entry, TrendState::Uptrend);

        // 0.4 × 70 + 0.25 × 50 = 40.5
        let outcome = e.score(&entry, 0.0, &aggregator(), &contexts).unwrap();
        assert_eq!(outcome.candidate, Direction::Up);
        assert_eq!(outcome.direction, SignalDirection::Neutral);
        assert!(!outcome.actionable);
    }

    #[test]
    fn test_tie_is_ambiguous() {
        let e = engine();
        let mut entry = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        entry.active_zones.push(zone(1, Direction::Up, dec!(43150), dec!(43260), 0.5));
        entry.active_zones.push(zone(2, Direction::Down, dec!(43260), dec!(43350), 0.5));
        let contexts = aligned_contexts(&entry, TrendState::Uptrend);

        let outcome = e.score(&entry, 0.0, &aggregator(), &contexts).unwrap();
        assert!(outcome.ambiguous);
        assert_eq!(outcome.direction, SignalDirection::Neutral);
    }

    #[test]
    fn test_unaligned_is_suppressed() {
        let e = engine();
        let mut entry = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        entry.recent_events.push(event(StructureKind::Choch, Direction::Up, 99, 1.0));
        entry.active_zones.push(zone(1, Direction::Up, dec!(43150), dec!(43260), 1.0));
        let contexts = aligned_contexts(&entry, TrendState::Downtrend);

        let outcome = e.score(&entry, 100.0, &aggregator(), &contexts).unwrap();
        assert!(outcome.confluence.suppressed);
        assert_eq!(outcome.breakdown.multiplier, 0.2);
        assert!(!outcome.actionable);
    }

    #[test]
    fn test_insufficient_history() {
        let e = engine();
        let entry = ctx(Timeframe::H1, TrendState::Undefined, 59);

        let result = e.score(&entry, 0.0, &aggregator(), &[entry.clone()]);
        assert!(matches!(
            result,
            Err(SharpError::DataInsufficient { required: 60, provided: 59 })
        ));
    }

    #[test]
    fn test_nearest_opposing_zone() {
        let mut c = ctx(Timeframe::H1, TrendState::Uptrend, 100);
        c.active_zones.push(zone(1, Direction::Down, dec!(44000), dec!(44200), 0.5));
        c.active_zones.push(zone(2, Direction::Down, dec!(43600), dec!(43800), 0.5));
        c.active_zones.push(zone(3, Direction::Down, dec!(42000), dec!(42200), 0.5));

        assert_eq!(nearest_opposing_zone(&c, Direction::Up).unwrap().id, 2);
        assert!(nearest_opposing_zone(&c, Direction::Down).is_none());
    }

    // ========================================================================
    // 속성 테스트
    // ========================================================================

    fn arb_trend() -> impl Strategy<Value = TrendState> {
        prop_oneof![
            Just(TrendState::Undefined),
            Just(TrendState::Uptrend),
            Just(TrendState::Downtrend),
            Just(TrendState::Ranging),
        ]
    }

    proptest! {
        #[test]
        fn prop_final_score_bounded(
            momentum in -300.0f64..300.0,
            strength in 0.0f64..1.0,
            zone_strength in 0.0f64..1.0,
            age in 0usize..200,
            up in any::<bool>(),
            choch in any::<bool>(),
            zone_offset in -2000i64..2000,
            trends in (arb_trend(), arb_trend()),
        ) {
            let e = engine();
            let direction = if up { Direction::Up } else { Direction::Down };
            let kind = if choch { StructureKind::Choch } else { StructureKind::Bos };

            let mut entry = ctx(Timeframe::H1, TrendState::from_direction(direction), 300);
            entry.recent_events.push(event(kind, direction, 299 - age, strength));
            let low = dec!(43000) + Decimal::from(zone_offset);
            entry.active_zones.push(zone(1, direction, low, low + dec!(150), zone_strength));

            let contexts = vec![
                entry.clone(),
                ctx(Timeframe::H4, trends.0, 100),
                ctx(Timeframe::D1, trends.1, 100),
            ];

            let outcome = e.score(&entry, momentum, &aggregator(), &contexts).unwrap();
            let final_score = outcome.final_score();
            prop_assert!((0.0..=100.0).contains(&final_score));
            prop_assert!([0.2, 0.6, 1.0].contains(&outcome.breakdown.multiplier));
            prop_assert!((0.0..=100.0).contains(&outcome.bullish.raw));
            prop_assert!((0.0..=100.0).contains(&outcome.bearish.raw));
            if outcome.actionable {
                prop_assert!(final_score >= 70.0);
                prop_assert_ne!(outcome.direction, SignalDirection::Neutral);
            }
        }
    }
}
