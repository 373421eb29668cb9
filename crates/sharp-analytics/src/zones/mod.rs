//! 가격 존 탐지와 생애 주기 관리.
//!
//! 캔들 마감마다 [`ZoneDetector::on_candle`]이 다음 순서로 동작합니다:
//!
//! 1. 기존 존 상태 갱신 (블록 전이, FVG 채움, 스윕 무효화)
//! 2. Mitigated 된 Order Block에서 Breaker Block 생성. 종가가 임계값을 넘지 못한
//!    블록은 후보로 남아 이후 캔들에서 다시 검사됩니다.
//! 3. Liquidity Sweep, Fair Value Gap, Order Block 신규 탐지
//! 4. 오래된 종료 존 정리 및 최대 개수 유지

mod breaker_block;
mod fair_value_gap;
mod liquidity_sweep;
mod order_block;

use rust_decimal::Decimal;
use sharp_core::{Candle, DecimalExt, Direction, StructureEvent, SwingPoint, Zone, ZoneKind, ZoneTransitionError};
use tracing::{debug, trace};

use crate::config::ZoneConfig;
use liquidity_sweep::SweepTracker;

/// 아직 id가 부여되지 않은 존 후보.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ZoneDraft {
    pub kind: ZoneKind,
    pub direction: Direction,
    pub price_high: Decimal,
    pub price_low: Decimal,
    pub strength: f64,
    pub source_event: Option<u64>,
}

/// 평균 대비 거래량 비율. 평균이 0이면 0.
pub(crate) fn volume_ratio(volume: Decimal, avg: Decimal) -> f64 {
    if avg <= Decimal::ZERO {
        return 0.0;
    }
    (volume / avg).to_f64_lossy().max(0.0)
}

/// 거래량 점수 (0.0 ~ 1.0). 평균의 2배에서 포화됩니다.
pub(crate) fn volume_score(volume: Decimal, avg: Decimal) -> f64 {
    (volume_ratio(volume, avg) / 2.0).min(1.0)
}

/// 현재 캔들을 제외한 직전 `period`개 캔들의 평균 거래량.
fn average_volume(history: &[Candle], period: usize) -> Decimal {
    let Some(end) = history.len().checked_sub(1) else {
        return Decimal::ZERO;
    };
    let start = end.saturating_sub(period);
    let window = &history[start..end];
    if window.is_empty() {
        return Decimal::ZERO;
    }
    window.iter().map(|c| c.volume).sum::<Decimal>() / Decimal::from(window.len())
}

/// 한 캔들 처리 결과.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneUpdate {
    /// 새로 생성된 존 id
    pub created: Vec<u64>,
    /// 이번 캔들에서 종료 상태가 된 존 id
    pub resolved: Vec<u64>,
    /// 정리된 존 수
    pub pruned: usize,
}

/// 스윙 기준점 (스윕 탐지용).
#[derive(Debug, Clone, Copy, Default)]
pub struct SwingRefs<'a> {
    pub last_high: Option<&'a SwingPoint>,
    pub last_low: Option<&'a SwingPoint>,
}

/// 파이프라인별 존 탐지기.
#[derive(Debug, Clone)]
pub struct ZoneDetector {
    config: ZoneConfig,
    zones: Vec<Zone>,
    next_id: u64,
    sweeps: SweepTracker,
    /// 얕게 Mitigated 되어 아직 Breaker Block을 만들지 않은 Order Block id
    breaker_candidates: Vec<u64>,
}

impl ZoneDetector {
    pub fn new(config: ZoneConfig) -> Self {
        Self {
            config,
            zones: Vec::new(),
            next_id: 1,
            sweeps: SweepTracker::default(),
            breaker_candidates: Vec::new(),
        }
    }

    /// 추적 중인 모든 존 (종료 존 포함, 생성 순).
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// 종료되지 않은 존.
    pub fn active_zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(|z| !z.is_resolved())
    }

    /// 마감된 캔들 하나를 처리합니다.
    ///
    /// `history`는 현재 캔들로 끝나는 버퍼이며 `index`는 현재 캔들의 절대 인덱스입니다.
    pub fn on_candle(
        &mut self,
        history: &[Candle],
        index: usize,
        event: Option<&StructureEvent>,
        swings: SwingRefs<'_>,
    ) -> Result<ZoneUpdate, ZoneTransitionError> {
        let mut update = ZoneUpdate::default();
        let Some(candle) = history.last() else {
            return Ok(update);
        };
        let avg_volume = average_volume(history, self.config.volume_period);

        // 1-2. 기존 존 갱신
        let mut drafts = Vec::new();
        let (zones, config) = (&self.zones, &self.config);
        self.breaker_candidates.retain(|origin_id| {
            let Some(origin) = zones.iter().find(|z| z.id == *origin_id) else {
                return false;
            };
            match breaker_block::spawn(origin, candle, config, avg_volume) {
                Some(draft) => {
                    drafts.push(draft);
                    false
                }
                None => true,
            }
        });

        for zone in self.zones.iter_mut() {
            if zone.is_resolved() || zone.created_index >= index {
                continue;
            }
            let resolved_now = match zone.kind {
                ZoneKind::OrderBlock { .. } | ZoneKind::BreakerBlock { .. } => {
                    let mitigated = order_block::advance(zone, candle, index)?;
                    if mitigated && matches!(zone.kind, ZoneKind::OrderBlock { .. }) {
                        match breaker_block::spawn(zone, candle, &self.config, avg_volume) {
                            Some(draft) => drafts.push(draft),
                            None => self.breaker_candidates.push(zone.id),
                        }
                    }
                    mitigated
                }
                ZoneKind::FairValueGap { .. } => fair_value_gap::update(zone, candle, index)?,
                ZoneKind::LiquiditySweep { .. } => liquidity_sweep::update(zone, candle, index)?,
            };
            if resolved_now {
                trace!(zone_id = zone.id, kind = zone.kind.name(), index, "존 종료");
                update.resolved.push(zone.id);
            }
        }

        // 3. 신규 탐지
        drafts.extend(self.sweeps.observe(
            candle,
            index,
            [swings.last_high, swings.last_low],
            &self.config,
            avg_volume,
        ));
        drafts.extend(fair_value_gap::detect(history, &self.config));
        if let Some(event) = event.filter(|e| e.index == index) {
            drafts.extend(order_block::detect(history, event, &self.config, avg_volume));
        }

        for draft in drafts {
            let zone = Zone {
                id: self.next_id,
                kind: draft.kind,
                direction: draft.direction,
                price_high: draft.price_high,
                price_low: draft.price_low,
                strength: draft.strength,
                created_index: index,
                created_at: candle.timestamp,
                resolved_index: None,
                source_event: draft.source_event,
            };
            debug!(
                zone_id = zone.id,
                kind = zone.kind.name(),
                direction = %zone.direction,
                low = %zone.price_low,
                high = %zone.price_high,
                strength = zone.strength,
                "존 생성"
            );
            self.next_id += 1;
            update.created.push(zone.id);
            self.zones.push(zone);
        }

        // 4. 정리
        update.pruned = self.prune(index);
        let zones = &self.zones;
        self.breaker_candidates
            .retain(|origin_id| zones.iter().any(|z| z.id == *origin_id));
        self.sweeps
            .forget_before(index.saturating_sub(self.config.prune_horizon));

        Ok(update)
    }

    fn prune(&mut self, index: usize) -> usize {
        let before = self.zones.len();
        let horizon = self.config.prune_horizon;
        self.zones.retain(|z| match z.resolved_index {
            Some(resolved) => index.saturating_sub(resolved) <= horizon,
            None => true,
        });

        while self.zones.len() > self.config.max_zones {
            // 오래된 종료 존 우선, 없으면 가장 오래된 존
            let victim = self
                .zones
                .iter()
                .position(|z| z.is_resolved())
                .unwrap_or(0);
            self.zones.remove(victim);
        }

        before - self.zones.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use sharp_core::{BlockStatus, FillStatus, StructureKind, Timeframe};

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
            dec!(10),
        )
    }

    fn bos_up(index: usize) -> StructureEvent {
        StructureEvent {
            id: 1,
            kind: StructureKind::Bos,
            direction: Direction::Up,
            price: dec!(104),
            close_price: dec!(106),
            swing_index: 0,
            timeframe: Timeframe::H1,
            index,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(index as i64),
            strength: 0.6,
        }
    }

    #[test]
    fn test_volume_score_saturates() {
        assert_eq!(volume_score(dec!(10), dec!(0)), 0.0);
        assert!((volume_score(dec!(10), dec!(10)) - 0.5).abs() < 1e-9);
        assert_eq!(volume_score(dec!(50), dec!(10)), 1.0);
    }

    #[test]
    fn test_average_volume_excludes_current() {
        let mut history: Vec<Candle> = (0..3).map(|i| candle(i, dec!(1), dec!(2), dec!(0.5), dec!(1.5))).collect();
        history[2].volume = dec!(1000);
        assert_eq!(average_volume(&history, 20), dec!(10));
        assert_eq!(average_volume(&history[..1], 20), Decimal::ZERO);
    }

    #[test]
    fn test_order_block_and_fvg_created_on_event() {
        let mut detector = ZoneDetector::new(ZoneConfig::default());
        let history = vec![
            candle(0, dec!(100), dec!(101), dec!(99), dec!(100.5)),
            candle(1, dec!(100.5), dec!(101.2), dec!(99.5), dec!(99.8)), // 음봉
            candle(2, dec!(99.8), dec!(105), dec!(99.7), dec!(104.8)),
            candle(3, dec!(104.8), dec!(107), dec!(103), dec!(106)),
        ];
        for i in 0..3 {
            detector.on_candle(&history[..=i], i, None, SwingRefs::default()).unwrap();
        }
        let update = detector
            .on_candle(&history, 3, Some(&bos_up(3)), SwingRefs::default())
            .unwrap();

        assert_eq!(update.created.len(), 2);
        let kinds: Vec<_> = detector.zones().iter().map(|z| z.kind.name()).collect();
        assert!(kinds.contains(&"FairValueGap"));
        assert!(kinds.contains(&"OrderBlock"));
        assert!(detector.zones().iter().all(|z| z.direction == Direction::Up));
        assert!(detector.zones().iter().all(|z| z.price_high > z.price_low));
    }

    #[test]
    fn test_stale_event_does_not_create_order_block() {
        let mut detector = ZoneDetector::new(ZoneConfig::default());
        let history = vec![
            candle(0, dec!(100), dec!(101), dec!(99), dec!(99.5)),
            candle(1, dec!(99.5), dec!(100), dec!(99), dec!(99.8)),
        ];
        let update = detector
            .on_candle(&history, 1, Some(&bos_up(0)), SwingRefs::default())
            .unwrap();
        assert!(update.created.is_empty());
    }

    #[test]
    fn test_mitigated_block_spawns_breaker() {
        let mut detector = ZoneDetector::new(ZoneConfig::default());
        let mut history = vec![
            candle(0, dec!(100), dec!(101), dec!(99), dec!(100.5)),
            candle(1, dec!(100.5), dec!(101.2), dec!(99.5), dec!(99.8)),
            candle(2, dec!(99.8), dec!(102), dec!(99.7), dec!(101.9)),
        ];
        detector.on_candle(&history[..1], 0, None, SwingRefs::default()).unwrap();
        detector.on_candle(&history[..2], 1, None, SwingRefs::default()).unwrap();
        detector.on_candle(&history, 2, Some(&bos_up(2)), SwingRefs::default()).unwrap();
        let block_id = detector.zones()[0].id;

        history.push(candle(3, dec!(101.9), dec!(102), dec!(98), dec!(98.5)));
        let update = detector.on_candle(&history, 3, None, SwingRefs::default()).unwrap();

        assert_eq!(update.resolved, vec![block_id]);
        let breaker = detector
            .zones()
            .iter()
            .find(|z| matches!(z.kind, ZoneKind::BreakerBlock { .. }))
            .unwrap();
        assert_eq!(breaker.direction, Direction::Down);
        assert_eq!(
            breaker.kind,
            ZoneKind::BreakerBlock {
                status: BlockStatus::Untested,
                origin_zone: block_id
            }
        );
    }

    #[test]
    fn test_shallow_mitigation_then_deep_break_spawns_breaker() {
        let mut detector = ZoneDetector::new(ZoneConfig::default());
        let mut history = vec![
            candle(0, dec!(100), dec!(101), dec!(99), dec!(100.5)),
            candle(1, dec!(100.5), dec!(101.2), dec!(99.5), dec!(99.8)),
            candle(2, dec!(99.8), dec!(102), dec!(99.7), dec!(101.9)),
        ];
        detector.on_candle(&history[..1], 0, None, SwingRefs::default()).unwrap();
        detector.on_candle(&history[..2], 1, None, SwingRefs::default()).unwrap();
        detector.on_candle(&history, 2, Some(&bos_up(2)), SwingRefs::default()).unwrap();
        let block_id = detector
            .zones()
            .iter()
            .find(|z| matches!(z.kind, ZoneKind::OrderBlock { .. }))
            .unwrap()
            .id;
        let breakers = |d: &ZoneDetector| {
            d.zones()
                .iter()
                .filter(|z| matches!(z.kind, ZoneKind::BreakerBlock { .. }))
                .count()
        };

        // 블록 하단 99.5 아래, 임계값 99.4005 위에서 마감
        history.push(candle(3, dec!(101.9), dec!(102), dec!(99.3), dec!(99.45)));
        let update = detector.on_candle(&history, 3, None, SwingRefs::default()).unwrap();
        assert_eq!(update.resolved, vec![block_id]);
        assert_eq!(breakers(&detector), 0);

        history.push(candle(4, dec!(99.45), dec!(99.6), dec!(96), dec!(96.5)));
        detector.on_candle(&history, 4, None, SwingRefs::default()).unwrap();
        let breaker = detector
            .zones()
            .iter()
            .find(|z| matches!(z.kind, ZoneKind::BreakerBlock { .. }))
            .unwrap();
        assert_eq!(breaker.created_index, 4);
        assert_eq!(breaker.direction, Direction::Down);
        assert_eq!(
            breaker.kind,
            ZoneKind::BreakerBlock {
                status: BlockStatus::Untested,
                origin_zone: block_id
            }
        );

        // 후보는 한 번만 Breaker Block을 만듭니다
        history.push(candle(5, dec!(96.5), dec!(96.6), dec!(94), dec!(94.5)));
        detector.on_candle(&history, 5, None, SwingRefs::default()).unwrap();
        assert_eq!(breakers(&detector), 1);
        assert!(detector.breaker_candidates.is_empty());
    }

    #[test]
    fn test_breaker_candidate_retired_with_pruned_block() {
        let config = ZoneConfig {
            prune_horizon: 1,
            ..ZoneConfig::default()
        };
        let mut detector = ZoneDetector::new(config);
        let mut history = vec![
            candle(0, dec!(100), dec!(101), dec!(99), dec!(100.5)),
            candle(1, dec!(100.5), dec!(101.2), dec!(99.5), dec!(99.8)),
            candle(2, dec!(99.8), dec!(102), dec!(99.7), dec!(101.9)),
        ];
        detector.on_candle(&history[..1], 0, None, SwingRefs::default()).unwrap();
        detector.on_candle(&history[..2], 1, None, SwingRefs::default()).unwrap();
        detector.on_candle(&history, 2, Some(&bos_up(2)), SwingRefs::default()).unwrap();

        history.push(candle(3, dec!(101.9), dec!(102), dec!(99.3), dec!(99.45)));
        detector.on_candle(&history, 3, None, SwingRefs::default()).unwrap();
        assert_eq!(detector.breaker_candidates.len(), 1);

        history.push(candle(4, dec!(99.45), dec!(99.8), dec!(99.41), dec!(99.6)));
        detector.on_candle(&history, 4, None, SwingRefs::default()).unwrap();
        history.push(candle(5, dec!(99.6), dec!(99.8), dec!(99.41), dec!(99.6)));
        detector.on_candle(&history, 5, None, SwingRefs::default()).unwrap();
        assert!(detector.breaker_candidates.is_empty());
    }

    #[test]
    fn test_prune_drops_old_resolved_and_caps_count() {
        let config = ZoneConfig {
            prune_horizon: 5,
            max_zones: 2,
            ..ZoneConfig::default()
        };
        let mut detector = ZoneDetector::new(config);
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (i, resolved) in [(0u64, Some(1usize)), (1, None), (2, None), (3, None)] {
            detector.zones.push(Zone {
                id: i + 1,
                kind: ZoneKind::FairValueGap {
                    fill: if resolved.is_some() { FillStatus::Filled } else { FillStatus::Unfilled },
                },
                direction: Direction::Up,
                price_high: dec!(2),
                price_low: dec!(1),
                strength: 0.5,
                created_index: i as usize,
                created_at: base,
                resolved_index: resolved,
                source_event: None,
            });
        }

        let pruned = detector.prune(10);
        assert_eq!(pruned, 2);
        let ids: Vec<u64> = detector.zones().iter().map(|z| z.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }
}
