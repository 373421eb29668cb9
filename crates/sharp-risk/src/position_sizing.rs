//! 포지션 크기 계산.
//!
//! 제공 기능:
//! - 고정 비율(fixed-fractional) 사이징: 계좌 리스크 금액 / 손절 거리
//! - Kelly 기준 사이징: 과거 성과 표본이 충분할 때만 사용, 부족하면 고정 비율로 폴백
//!
//! 모든 수량은 심볼의 수량 단위(lot step)로 내림합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sharp_core::{decimal_from_f64, DecimalExt, PerformanceStats, SizingMethod};
use tracing::debug;

use crate::config::RiskConfig;

/// 사이징 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingDecision {
    /// 실제 적용한 계좌 리스크 비율
    pub fraction: Decimal,
    pub method: SizingMethod,
    /// 수량 단위로 내림한 포지션 크기
    pub size: Decimal,
}

/// 포지션 크기 계산기.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    /// 주어진 설정으로 새 포지션 사이저를 생성.
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// 고정 비율 방식으로 포지션 크기를 계산.
    ///
    /// `floor_to_step(equity × risk_fraction / stop_distance, lot_step)`
    ///
    /// 손절 거리가 0 이하이면 0을 반환합니다.
    pub fn calculate_fixed_fractional(
        &self,
        equity: Decimal,
        risk_fraction: Decimal,
        stop_distance: Decimal,
        lot_step: Decimal,
    ) -> Decimal {
        if stop_distance <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let risk_amount = equity * risk_fraction;
        (risk_amount / stop_distance).floor_to_step(lot_step)
    }

    /// Kelly 기준 리스크 비율을 계산.
    ///
    /// Kelly 공식: f = W - (1-W)/R, 여기서 W = 승률, R = 평균 수익 R / 평균 손실 R.
    /// 결과에 안전 계수를 곱하고 `[0, cap]`으로 제한합니다.
    ///
    /// 비활성화되었거나, 표본이 최소치 미만이거나, 통계가 유효하지 않으면 `None`.
    pub fn kelly_fraction(&self, stats: &PerformanceStats) -> Option<Decimal> {
        let kelly = &self.config.kelly;
        if !kelly.enabled || stats.sample_size < kelly.min_sample {
            return None;
        }

        let valid = stats.win_rate.is_finite()
            && (0.0..=1.0).contains(&stats.win_rate)
            && stats.avg_win_r.is_finite()
            && stats.avg_win_r > 0.0
            && stats.avg_loss_r.is_finite()
            && stats.avg_loss_r > 0.0;
        if !valid {
            return None;
        }

        let win_loss_ratio = stats.avg_win_r / stats.avg_loss_r;
        let kelly_pct = stats.win_rate - (1.0 - stats.win_rate) / win_loss_ratio;
        let raw = decimal_from_f64(kelly_pct)?;

        Some((raw * kelly.safety_factor).clamp(Decimal::ZERO, kelly.cap))
    }

    /// 심볼과 성과 통계에 따라 사이징 방식을 고르고 크기를 계산.
    pub fn size(
        &self,
        symbol: &str,
        equity: Decimal,
        stop_distance: Decimal,
        performance: Option<&PerformanceStats>,
    ) -> SizingDecision {
        let lot_step = self.config.get_lot_step(symbol);

        let (fraction, method) = match performance.and_then(|stats| self.kelly_fraction(stats)) {
            Some(fraction) => (fraction, SizingMethod::Kelly),
            None => (self.config.get_risk_fraction(symbol), SizingMethod::FixedFractional),
        };

        let size = self.calculate_fixed_fractional(equity, fraction, stop_distance, lot_step);
        debug!(symbol, %fraction, ?method, %size, "포지션 크기 계산");

        SizingDecision { fraction, method, size }
    }
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn stats(win_rate: f64, avg_win_r: f64, avg_loss_r: f64, sample_size: usize) -> PerformanceStats {
        PerformanceStats {
            win_rate,
            avg_win_r,
            avg_loss_r,
            sample_size,
        }
    }

    #[test]
    fn test_fixed_fractional_floors_to_lot_step() {
        let sizer = PositionSizer::new(RiskConfig::default());

        // 10000 × 0.02 / 675 = 0.29629...
        let size = sizer.calculate_fixed_fractional(dec!(10000), dec!(0.02), dec!(675), dec!(0.001));
        assert_eq!(size, dec!(0.296));
    }

    #[test]
    fn test_fixed_fractional_zero_distance() {
        let sizer = PositionSizer::new(RiskConfig::default());
        let size = sizer.calculate_fixed_fractional(dec!(10000), dec!(0.02), Decimal::ZERO, dec!(0.001));
        assert_eq!(size, Decimal::ZERO);
    }

    #[test]
    fn test_kelly_requires_min_sample() {
        let sizer = PositionSizer::new(RiskConfig::default());

        assert!(sizer.kelly_fraction(&stats(0.6, 2.0, 1.0, 29)).is_none());
        assert!(sizer.kelly_fraction(&stats(0.6, 2.0, 1.0, 30)).is_some());
    }

    #[test]
    fn test_kelly_fraction_scaled_and_capped() {
        let sizer = PositionSizer::new(RiskConfig::default());

        // f = 0.5 - 0.5 / 2 = 0.25, × 0.25 = 0.0625 → cap 0.05
        let fraction = sizer.kelly_fraction(&stats(0.5, 2.0, 1.0, 40)).unwrap();
        assert_eq!(fraction, dec!(0.05));

        // f = 0.4 - 0.6 / 2 = 0.1, × 0.25 = 0.025
        let fraction = sizer.kelly_fraction(&stats(0.4, 2.0, 1.0, 40)).unwrap();
        assert!((fraction - dec!(0.025)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_kelly_negative_edge_is_zero() {
        let sizer = PositionSizer::new(RiskConfig::default());

        // f = 0.3 - 0.7 / 1 = -0.4
        let fraction = sizer.kelly_fraction(&stats(0.3, 1.0, 1.0, 50)).unwrap();
        assert_eq!(fraction, Decimal::ZERO);
    }

    #[test]
    fn test_kelly_invalid_stats_fall_back() {
        let sizer = PositionSizer::new(RiskConfig::default());

        assert!(sizer.kelly_fraction(&stats(0.6, 2.0, 0.0, 50)).is_none());
        assert!(sizer.kelly_fraction(&stats(f64::NAN, 2.0, 1.0, 50)).is_none());

        let decision = sizer.size("BTCUSDT", dec!(10000), dec!(675), Some(&stats(0.6, 2.0, 0.0, 50)));
        assert_eq!(decision.method, SizingMethod::FixedFractional);
        assert_eq!(decision.fraction, dec!(0.02));
    }

    #[test]
    fn test_size_uses_kelly_when_available() {
        let sizer = PositionSizer::new(RiskConfig::default());

        let decision = sizer.size("BTCUSDT", dec!(10000), dec!(500), Some(&stats(0.5, 2.0, 1.0, 40)));
        assert_eq!(decision.method, SizingMethod::Kelly);
        assert_eq!(decision.fraction, dec!(0.05));
        // 10000 × 0.05 / 500 = 1
        assert_eq!(decision.size, dec!(1.000));
    }

    #[test]
    fn test_kelly_disabled() {
        let mut config = RiskConfig::default();
        config.kelly.enabled = false;
        let sizer = PositionSizer::new(config);

        let decision = sizer.size("BTCUSDT", dec!(10000), dec!(500), Some(&stats(0.5, 2.0, 1.0, 400)));
        assert_eq!(decision.method, SizingMethod::FixedFractional);
    }
}
