//! 손절/익절 레벨 생성.
//!
//! - ATR 기반 손절: `ATR × 레짐 배수 × 신뢰도 계수`
//! - 익절: 고정 R 배수, 또는 가장 가까운 반대 방향 존을 반영한 보수/공격 정책
//! - 트레일링 스탑 제안

use rust_decimal::Decimal;
use sharp_core::{
    Direction, Price, TakeProfitLevel, TargetSource, TrailingStopPlan, VolatilityRegime, Zone,
};

use crate::config::{RiskConfig, TakeProfitPolicy};

/// 손절 거리와 익절 레벨을 계산하는 플래너.
#[derive(Debug, Clone)]
pub struct StopPlanner {
    config: RiskConfig,
}

impl StopPlanner {
    /// 새 플래너를 생성합니다.
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// 점수에 따른 손절 거리 계수.
    ///
    /// 높은 신뢰도는 손절을 좁히고 낮은 신뢰도는 넓힙니다.
    pub fn confidence_factor(&self, score: f64) -> Decimal {
        let c = &self.config.confidence;
        if !c.enabled || !score.is_finite() {
            Decimal::ONE
        } else if score > c.high_score {
            c.high_factor
        } else if score < c.low_score {
            c.low_factor
        } else {
            Decimal::ONE
        }
    }

    /// 레짐과 점수를 반영한 유효 ATR 배수.
    pub fn atr_multiple(&self, regime: VolatilityRegime, score: f64) -> Decimal {
        self.config.regime.multiplier(regime) * self.confidence_factor(score)
    }

    /// ATR 기반 손절 가격을 계산합니다.
    ///
    /// # 인자
    /// * `entry_price` - 진입 가격
    /// * `stop_distance` - ATR × 배수로 계산한 손절 거리
    /// * `direction` - 포지션 방향
    pub fn calculate_atr_stop(
        &self,
        entry_price: Price,
        stop_distance: Decimal,
        direction: Direction,
    ) -> Price {
        match direction {
            Direction::Up => entry_price - stop_distance,
            Direction::Down => entry_price + stop_distance,
        }
    }

    /// 설정된 정책으로 익절 레벨을 생성합니다.
    ///
    /// 레벨은 항상 거래 방향으로 단조 증가(매도는 단조 감소)합니다.
    /// 반대 존은 방향이 거래와 반대이고 근접 경계가 진입가 너머에 있을 때만 사용됩니다.
    pub fn take_profits(
        &self,
        direction: Direction,
        entry_price: Price,
        stop_distance: Decimal,
        opposing_zone: Option<&Zone>,
    ) -> Vec<TakeProfitLevel> {
        let tp = &self.config.take_profit;
        let at_r = |r: Decimal| match direction {
            Direction::Up => entry_price + stop_distance * r,
            Direction::Down => entry_price - stop_distance * r,
        };

        let mut prices: Vec<(Price, TargetSource)> = tp
            .r_multiples
            .iter()
            .map(|r| (at_r(*r), TargetSource::RMultiple))
            .collect();

        if let Some((near, far)) = opposing_zone.and_then(|z| zone_edges(z, direction, entry_price)) {
            match tp.policy {
                TakeProfitPolicy::FixedR => {}
                TakeProfitPolicy::Conservative => {
                    if let Some(first) = prices.first_mut() {
                        if is_nearer(near, first.0, direction) {
                            *first = (near, TargetSource::OpposingZone);
                        }
                    }
                }
                TakeProfitPolicy::Aggressive => {
                    if let Some(last) = prices.last_mut() {
                        if is_nearer(last.0, far, direction) {
                            *last = (far, TargetSource::OpposingZone);
                        }
                    }
                }
            }
        }

        prices
            .into_iter()
            .zip(tp.scale_out.iter())
            .map(|((price, source), scale_out)| TakeProfitLevel {
                price,
                r_multiple: r_ratio(price, entry_price, stop_distance),
                source,
                scale_out: *scale_out,
            })
            .collect()
    }

    /// 트레일링 스탑 제안. 점수가 기준을 넘고 TP1이 있을 때만 생성됩니다.
    pub fn trailing_stop(
        &self,
        atr: Decimal,
        score: f64,
        take_profits: &[TakeProfitLevel],
    ) -> Option<TrailingStopPlan> {
        let trailing = &self.config.trailing;
        if !trailing.enabled || score.is_nan() || score <= trailing.min_score {
            return None;
        }

        take_profits.first().map(|tp1| TrailingStopPlan {
            distance: atr * trailing.atr_multiple,
            activation_price: tp1.price,
        })
    }
}

/// 반대 존의 (근접 경계, 먼 경계). 사용할 수 없는 존이면 `None`.
fn zone_edges(zone: &Zone, direction: Direction, entry_price: Price) -> Option<(Price, Price)> {
    if zone.direction != direction.opposite() {
        return None;
    }

    let (near, far) = match direction {
        Direction::Up => (zone.price_low, zone.price_high),
        Direction::Down => (zone.price_high, zone.price_low),
    };

    let beyond_entry = match direction {
        Direction::Up => near > entry_price,
        Direction::Down => near < entry_price,
    };
    beyond_entry.then_some((near, far))
}

/// `a`가 `b`보다 진입가에 가까운지 (거래 방향 기준).
fn is_nearer(a: Price, b: Price, direction: Direction) -> bool {
    match direction {
        Direction::Up => a < b,
        Direction::Down => a > b,
    }
}

fn r_ratio(price: Price, entry_price: Price, stop_distance: Decimal) -> Decimal {
    if stop_distance.is_zero() {
        return Decimal::ZERO;
    }
    ((price - entry_price).abs() / stop_distance).round_dp(2)
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use sharp_core::{BlockStatus, ZoneKind};

    fn planner(policy: TakeProfitPolicy) -> StopPlanner {
        let mut config = RiskConfig::default();
        config.take_profit.policy = policy;
        StopPlanner::new(config)
    }

    fn bearish_zone(low: Decimal, high: Decimal) -> Zone {
        Zone {
            id: 7,
            kind: ZoneKind::OrderBlock {
                status: BlockStatus::Untested,
            },
            direction: Direction::Down,
            price_high: high,
            price_low: low,
            strength: 0.8,
            created_index: 10,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            resolved_index: None,
            source_event: None,
        }
    }

    #[test]
    fn test_atr_multiple_by_regime_and_confidence() {
        let planner = planner(TakeProfitPolicy::FixedR);

        assert_eq!(planner.atr_multiple(VolatilityRegime::Normal, 71.5), dec!(1.5));
        assert_eq!(planner.atr_multiple(VolatilityRegime::Low, 71.5), dec!(1.2));
        // 높은 신뢰도: 1.5 × 0.9
        assert_eq!(planner.atr_multiple(VolatilityRegime::Normal, 85.0), dec!(1.35));
        // 낮은 신뢰도: 1.5 × 1.1
        assert_eq!(planner.atr_multiple(VolatilityRegime::Normal, 55.0), dec!(1.65));
    }

    #[test]
    fn test_atr_stop() {
        let planner = planner(TakeProfitPolicy::FixedR);

        assert_eq!(planner.calculate_atr_stop(dec!(43260), dec!(675), Direction::Up), dec!(42585));
        assert_eq!(planner.calculate_atr_stop(dec!(43260), dec!(675), Direction::Down), dec!(43935));
    }

    #[test]
    fn test_fixed_r_levels() {
        let planner = planner(TakeProfitPolicy::FixedR);
        let levels = planner.take_profits(Direction::Up, dec!(43260), dec!(675), None);

        let prices: Vec<_> = levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![dec!(43935), dec!(44610), dec!(45285)]);
        assert_eq!(levels[1].r_multiple, dec!(2));
        assert_eq!(levels[0].scale_out, dec!(0.3));
        assert!(levels.iter().all(|l| l.source == TargetSource::RMultiple));
    }

    #[test]
    fn test_fixed_r_sell_levels_descend() {
        let planner = planner(TakeProfitPolicy::FixedR);
        let levels = planner.take_profits(Direction::Down, dec!(100), dec!(2), None);

        let prices: Vec<_> = levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![dec!(98), dec!(96), dec!(94)]);
    }

    #[test]
    fn test_conservative_uses_nearer_zone_edge() {
        let planner = planner(TakeProfitPolicy::Conservative);
        let zone = bearish_zone(dec!(43600), dec!(43800));

        let levels = planner.take_profits(Direction::Up, dec!(43260), dec!(675), Some(&zone));
        assert_eq!(levels[0].price, dec!(43600));
        assert_eq!(levels[0].source, TargetSource::OpposingZone);
        // 340 / 675 = 0.5037
        assert_eq!(levels[0].r_multiple, dec!(0.50));
        assert_eq!(levels[1].price, dec!(44610));
    }

    #[test]
    fn test_conservative_keeps_1r_when_zone_farther() {
        let planner = planner(TakeProfitPolicy::Conservative);
        let zone = bearish_zone(dec!(44200), dec!(44400));

        let levels = planner.take_profits(Direction::Up, dec!(43260), dec!(675), Some(&zone));
        assert_eq!(levels[0].price, dec!(43935));
        assert_eq!(levels[0].source, TargetSource::RMultiple);
    }

    #[test]
    fn test_aggressive_uses_farther_zone_edge() {
        let planner = planner(TakeProfitPolicy::Aggressive);
        let zone = bearish_zone(dec!(45000), dec!(45600));

        let levels = planner.take_profits(Direction::Up, dec!(43260), dec!(675), Some(&zone));
        assert_eq!(levels[2].price, dec!(45600));
        assert_eq!(levels[2].source, TargetSource::OpposingZone);
        assert!(levels.windows(2).all(|w| w[0].price < w[1].price));
    }

    #[test]
    fn test_zone_behind_entry_is_ignored() {
        let planner = planner(TakeProfitPolicy::Conservative);
        let zone = bearish_zone(dec!(43000), dec!(43300));

        let levels = planner.take_profits(Direction::Up, dec!(43260), dec!(675), Some(&zone));
        assert_eq!(levels[0].price, dec!(43935));
    }

    #[test]
    fn test_same_direction_zone_is_ignored() {
        let planner = planner(TakeProfitPolicy::Conservative);
        let mut zone = bearish_zone(dec!(43600), dec!(43800));
        zone.direction = Direction::Up;

        let levels = planner.take_profits(Direction::Up, dec!(43260), dec!(675), Some(&zone));
        assert_eq!(levels[0].source, TargetSource::RMultiple);
    }

    #[test]
    fn test_trailing_stop_threshold() {
        let planner = planner(TakeProfitPolicy::FixedR);
        let levels = planner.take_profits(Direction::Up, dec!(43260), dec!(675), None);

        assert!(planner.trailing_stop(dec!(450), 71.5, &levels).is_none());

        let trailing = planner.trailing_stop(dec!(450), 78.0, &levels).unwrap();
        assert_eq!(trailing.distance, dec!(675));
        assert_eq!(trailing.activation_price, dec!(43935));
    }
}
