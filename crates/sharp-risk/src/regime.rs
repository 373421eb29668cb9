//! 변동성 레짐 분류와 거래 위험 등급.

use sharp_core::{RiskLevel, VolatilityRegime};

use crate::config::RegimeConfig;

/// ATR 퍼센타일로 변동성 레짐을 분류합니다.
///
/// 유한하지 않은 퍼센타일은 NORMAL로 간주합니다.
pub fn classify_regime(percentile: f64, config: &RegimeConfig) -> VolatilityRegime {
    if !percentile.is_finite() {
        return VolatilityRegime::Normal;
    }

    if percentile < config.low_below {
        VolatilityRegime::Low
    } else if percentile < config.normal_below {
        VolatilityRegime::Normal
    } else if percentile < config.high_below {
        VolatilityRegime::High
    } else {
        VolatilityRegime::Extreme
    }
}

fn regime_points(regime: VolatilityRegime) -> f64 {
    match regime {
        VolatilityRegime::Low => 10.0,
        VolatilityRegime::Normal => 15.0,
        VolatilityRegime::High => 25.0,
        VolatilityRegime::Extreme => 40.0,
    }
}

/// 레짐 점수와 낮은 신뢰도 패널티를 합산해 위험 등급을 산출합니다.
///
/// `points = regime_points + (100 - score) × 0.4`
pub fn risk_level(regime: VolatilityRegime, score: f64) -> RiskLevel {
    let score = if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 };
    let points = regime_points(regime) + (100.0 - score) * 0.4;

    if points < 30.0 {
        RiskLevel::Low
    } else if points < 50.0 {
        RiskLevel::Medium
    } else if points < 70.0 {
        RiskLevel::High
    } else {
        RiskLevel::Extreme
    }
}
