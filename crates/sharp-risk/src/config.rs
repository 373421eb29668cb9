//! 리스크 관리 설정.
//!
//! 손절 거리, 익절 정책, 포지션 사이징을 위한 설정 구조체를 정의합니다.
//! 모든 기본값은 `config/default.toml`과 일치합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sharp_core::{ConfigValidationError, VolatilityRegime};
use std::collections::HashMap;

/// 전역 리스크 관리 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// 사이징 기준 계좌 자산 (기본값: 10,000)
    #[serde(default = "default_account_equity")]
    pub account_equity: Decimal,

    /// 거래당 계좌 리스크 비율 (기본값: 0.02)
    #[serde(default = "default_risk_fraction")]
    pub risk_fraction: Decimal,

    /// 수량 최소 단위 (기본값: 0.001)
    #[serde(default = "default_lot_step")]
    pub lot_step: Decimal,

    /// 변동성 레짐 구간과 ATR 배수
    #[serde(default)]
    pub regime: RegimeConfig,

    /// 점수 기반 손절 거리 조정
    #[serde(default)]
    pub confidence: ConfidenceAdjustment,

    /// 익절 정책
    #[serde(default)]
    pub take_profit: TakeProfitConfig,

    /// Kelly 사이징
    #[serde(default)]
    pub kelly: KellyConfig,

    /// 트레일링 스탑 제안
    #[serde(default)]
    pub trailing: TrailingConfig,

    /// 분할 진입 제안
    #[serde(default)]
    pub scale_in: ScaleInConfig,

    /// 심볼별 리스크 설정 (전역 설정을 재정의함)
    #[serde(default)]
    pub symbol_configs: HashMap<String, SymbolRiskConfig>,
}

/// 심볼별 리스크 설정.
/// 여기의 값들은 특정 심볼에 대해 전역 RiskConfig를 재정의합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRiskConfig {
    /// 이 심볼의 수량 단위
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_step: Option<Decimal>,

    /// 이 심볼의 리스크 비율
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_fraction: Option<Decimal>,

    /// 리스크 플랜 생성 여부 (기본값: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// ATR 퍼센타일 구간과 레짐별 ATR 배수.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// 이 퍼센타일 미만이면 LOW (기본값: 25)
    #[serde(default = "default_low_below")]
    pub low_below: f64,
    /// 이 퍼센타일 미만이면 NORMAL (기본값: 75)
    #[serde(default = "default_normal_below")]
    pub normal_below: f64,
    /// 이 퍼센타일 미만이면 HIGH, 이상이면 EXTREME (기본값: 95)
    #[serde(default = "default_high_below")]
    pub high_below: f64,

    #[serde(default = "default_low_multiplier")]
    pub low_multiplier: Decimal,
    #[serde(default = "default_normal_multiplier")]
    pub normal_multiplier: Decimal,
    #[serde(default = "default_high_multiplier")]
    pub high_multiplier: Decimal,
    #[serde(default = "default_extreme_multiplier")]
    pub extreme_multiplier: Decimal,
}

/// 점수에 따른 손절 거리 조정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAdjustment {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 이 점수 초과 시 `high_factor` 적용 (기본값: 80)
    #[serde(default = "default_high_score")]
    pub high_score: f64,
    #[serde(default = "default_high_factor")]
    pub high_factor: Decimal,
    /// 이 점수 미만 시 `low_factor` 적용 (기본값: 60)
    #[serde(default = "default_low_score")]
    pub low_score: f64,
    #[serde(default = "default_low_factor")]
    pub low_factor: Decimal,
}

/// 익절 레벨 선택 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitPolicy {
    /// 설정된 R 배수만 사용
    #[default]
    FixedR,
    /// TP1을 1R과 반대 존 근접 경계 중 가까운 쪽으로
    Conservative,
    /// 마지막 TP를 최종 R과 반대 존 먼 경계 중 먼 쪽으로
    Aggressive,
}

/// 익절 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitConfig {
    #[serde(default)]
    pub policy: TakeProfitPolicy,
    /// R 배수 레벨 (기본값: 1, 2, 3)
    #[serde(default = "default_r_multiples")]
    pub r_multiples: Vec<Decimal>,
    /// 레벨별 청산 비중 (기본값: 0.3, 0.4, 0.3)
    #[serde(default = "default_scale_out")]
    pub scale_out: Vec<Decimal>,
}

/// Kelly 사이징 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Kelly 적용 최소 거래 수 (기본값: 30)
    #[serde(default = "default_kelly_min_sample")]
    pub min_sample: usize,
    /// Kelly 비율에 곱하는 안전 계수 (기본값: 0.25)
    #[serde(default = "default_kelly_safety")]
    pub safety_factor: Decimal,
    /// 리스크 비율 상한 (기본값: 0.05)
    #[serde(default = "default_kelly_cap")]
    pub cap: Decimal,
}

/// 트레일링 스탑 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 이 점수 초과 시 제안 (기본값: 75)
    #[serde(default = "default_trailing_min_score")]
    pub min_score: f64,
    /// 추적 거리 ATR 배수 (기본값: 1.5)
    #[serde(default = "default_trailing_atr_multiple")]
    pub atr_multiple: Decimal,
}

/// 분할 진입 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleInConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 이 점수 초과 시 제안 (기본값: 80)
    #[serde(default = "default_scale_in_min_score")]
    pub min_score: f64,
    /// 진입 비중 (기본값: 0.5, 0.3, 0.2)
    #[serde(default = "default_scale_in_weights")]
    pub weights: Vec<Decimal>,
}

// 기본값 함수들
fn default_account_equity() -> Decimal {
    dec!(10000)
}

fn default_risk_fraction() -> Decimal {
    dec!(0.02)
}

fn default_lot_step() -> Decimal {
    dec!(0.001)
}

fn default_true() -> bool {
    true
}

fn default_low_below() -> f64 {
    25.0
}

fn default_normal_below() -> f64 {
    75.0
}

fn default_high_below() -> f64 {
    95.0
}

fn default_low_multiplier() -> Decimal {
    dec!(1.2)
}

fn default_normal_multiplier() -> Decimal {
    dec!(1.5)
}

fn default_high_multiplier() -> Decimal {
    dec!(1.8)
}

fn default_extreme_multiplier() -> Decimal {
    dec!(2.25)
}

fn default_high_score() -> f64 {
    80.0
}

fn default_high_factor() -> Decimal {
    dec!(0.9)
}

fn default_low_score() -> f64 {
    60.0
}

fn default_low_factor() -> Decimal {
    dec!(1.1)
}

fn default_r_multiples() -> Vec<Decimal> {
    vec![dec!(1), dec!(2), dec!(3)]
}

fn default_scale_out() -> Vec<Decimal> {
    vec![dec!(0.3), dec!(0.4), dec!(0.3)]
}

fn default_kelly_min_sample() -> usize {
    30
}

fn default_kelly_safety() -> Decimal {
    dec!(0.25)
}

fn default_kelly_cap() -> Decimal {
    dec!(0.05)
}

fn default_trailing_min_score() -> f64 {
    75.0
}

fn default_trailing_atr_multiple() -> Decimal {
    dec!(1.5)
}

fn default_scale_in_min_score() -> f64 {
    80.0
}

fn default_scale_in_weights() -> Vec<Decimal> {
    vec![dec!(0.5), dec!(0.3), dec!(0.2)]
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_equity: default_account_equity(),
            risk_fraction: default_risk_fraction(),
            lot_step: default_lot_step(),
            regime: RegimeConfig::default(),
            confidence: ConfidenceAdjustment::default(),
            take_profit: TakeProfitConfig::default(),
            kelly: KellyConfig::default(),
            trailing: TrailingConfig::default(),
            scale_in: ScaleInConfig::default(),
            symbol_configs: HashMap::new(),
        }
    }
}

impl Default for SymbolRiskConfig {
    fn default() -> Self {
        Self {
            lot_step: None,
            risk_fraction: None,
            enabled: true,
        }
    }
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            low_below: default_low_below(),
            normal_below: default_normal_below(),
            high_below: default_high_below(),
            low_multiplier: default_low_multiplier(),
            normal_multiplier: default_normal_multiplier(),
            high_multiplier: default_high_multiplier(),
            extreme_multiplier: default_extreme_multiplier(),
        }
    }
}

impl Default for ConfidenceAdjustment {
    fn default() -> Self {
        Self {
            enabled: true,
            high_score: default_high_score(),
            high_factor: default_high_factor(),
            low_score: default_low_score(),
            low_factor: default_low_factor(),
        }
    }
}

impl Default for TakeProfitConfig {
    fn default() -> Self {
        Self {
            policy: TakeProfitPolicy::default(),
            r_multiples: default_r_multiples(),
            scale_out: default_scale_out(),
        }
    }
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_sample: default_kelly_min_sample(),
            safety_factor: default_kelly_safety(),
            cap: default_kelly_cap(),
        }
    }
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_score: default_trailing_min_score(),
            atr_multiple: default_trailing_atr_multiple(),
        }
    }
}

impl Default for ScaleInConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_score: default_scale_in_min_score(),
            weights: default_scale_in_weights(),
        }
    }
}

impl RegimeConfig {
    /// 레짐별 ATR 배수.
    pub fn multiplier(&self, regime: VolatilityRegime) -> Decimal {
        match regime {
            VolatilityRegime::Low => self.low_multiplier,
            VolatilityRegime::Normal => self.normal_multiplier,
            VolatilityRegime::High => self.high_multiplier,
            VolatilityRegime::Extreme => self.extreme_multiplier,
        }
    }
}

impl RiskConfig {
    /// 기본값으로 새 RiskConfig를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 보수적인 리스크 설정을 생성합니다 (낮은 리스크 비율, 가까운 익절).
    pub fn conservative() -> Self {
        Self {
            risk_fraction: dec!(0.01),
            take_profit: TakeProfitConfig {
                policy: TakeProfitPolicy::Conservative,
                ..TakeProfitConfig::default()
            },
            kelly: KellyConfig {
                cap: dec!(0.02),
                ..KellyConfig::default()
            },
            ..Self::default()
        }
    }

    /// 공격적인 리스크 설정을 생성합니다 (높은 리스크 비율, 먼 익절).
    pub fn aggressive() -> Self {
        Self {
            risk_fraction: dec!(0.03),
            take_profit: TakeProfitConfig {
                policy: TakeProfitPolicy::Aggressive,
                ..TakeProfitConfig::default()
            },
            ..Self::default()
        }
    }

    /// 심볼에 대한 유효 리스크 비율을 가져옵니다.
    /// 심볼별 값이 설정되어 있으면 해당 값을 반환하고, 그렇지 않으면 전역 기본값을 반환합니다.
    pub fn get_risk_fraction(&self, symbol: &str) -> Decimal {
        self.symbol_configs
            .get(symbol)
            .and_then(|c| c.risk_fraction)
            .unwrap_or(self.risk_fraction)
    }

    /// 심볼에 대한 유효 수량 단위를 가져옵니다.
    pub fn get_lot_step(&self, symbol: &str) -> Decimal {
        self.symbol_configs
            .get(symbol)
            .and_then(|c| c.lot_step)
            .unwrap_or(self.lot_step)
    }

    /// 심볼에 대해 리스크 플랜이 활성화되어 있는지 확인합니다.
    pub fn is_symbol_enabled(&self, symbol: &str) -> bool {
        self.symbol_configs
            .get(symbol)
            .map(|c| c.enabled)
            .unwrap_or(true)
    }

    /// 심볼별 설정을 추가하거나 업데이트합니다.
    pub fn set_symbol_config(&mut self, symbol: impl Into<String>, config: SymbolRiskConfig) {
        self.symbol_configs.insert(symbol.into(), config);
    }

    /// 설정 값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.account_equity <= Decimal::ZERO {
            return Err(ConfigValidationError::invalid(
                "risk.account_equity must be greater than 0",
            ));
        }

        let fraction_ok = |f: Decimal| f > Decimal::ZERO && f < Decimal::ONE;
        if !fraction_ok(self.risk_fraction) {
            return Err(ConfigValidationError::invalid(
                "risk.risk_fraction must be within (0, 1)",
            ));
        }

        if self.lot_step <= Decimal::ZERO {
            return Err(ConfigValidationError::invalid(
                "risk.lot_step must be greater than 0",
            ));
        }

        for (symbol, sc) in &self.symbol_configs {
            if sc.risk_fraction.is_some_and(|f| !fraction_ok(f)) {
                return Err(ConfigValidationError::invalid(format!(
                    "risk.symbol_configs.{}.risk_fraction must be within (0, 1)",
                    symbol
                )));
            }
            if sc.lot_step.is_some_and(|s| s <= Decimal::ZERO) {
                return Err(ConfigValidationError::invalid(format!(
                    "risk.symbol_configs.{}.lot_step must be greater than 0",
                    symbol
                )));
            }
        }

        let r = &self.regime;
        if !(0.0 < r.low_below && r.low_below <= r.normal_below && r.normal_below <= r.high_below && r.high_below <= 100.0) {
            return Err(ConfigValidationError::invalid(
                "risk.regime bands must satisfy 0 < low <= normal <= high <= 100",
            ));
        }
        let multipliers = [r.low_multiplier, r.normal_multiplier, r.high_multiplier, r.extreme_multiplier];
        if multipliers.iter().any(|m| *m <= Decimal::ZERO) {
            return Err(ConfigValidationError::invalid(
                "risk.regime multipliers must be greater than 0",
            ));
        }

        let c = &self.confidence;
        if c.high_factor <= Decimal::ZERO || c.low_factor <= Decimal::ZERO || c.low_score > c.high_score {
            return Err(ConfigValidationError::invalid(
                "risk.confidence factors must be positive and low_score <= high_score",
            ));
        }

        let tp = &self.take_profit;
        if tp.r_multiples.is_empty() {
            return Err(ConfigValidationError::MissingField(
                "risk.take_profit.r_multiples".into(),
            ));
        }
        if tp.r_multiples.windows(2).any(|w| w[0] >= w[1]) || tp.r_multiples[0] <= Decimal::ZERO {
            return Err(ConfigValidationError::invalid(
                "risk.take_profit.r_multiples must be positive and strictly increasing",
            ));
        }
        if tp.scale_out.len() != tp.r_multiples.len() || tp.scale_out.iter().sum::<Decimal>() != Decimal::ONE {
            return Err(ConfigValidationError::invalid(
                "risk.take_profit.scale_out must match r_multiples and sum to 1",
            ));
        }

        let k = &self.kelly;
        if k.safety_factor <= Decimal::ZERO || k.safety_factor > Decimal::ONE || !fraction_ok(k.cap) {
            return Err(ConfigValidationError::invalid(
                "risk.kelly.safety_factor must be within (0, 1] and cap within (0, 1)",
            ));
        }

        if self.trailing.atr_multiple <= Decimal::ZERO {
            return Err(ConfigValidationError::invalid(
                "risk.trailing.atr_multiple must be greater than 0",
            ));
        }

        if self.scale_in.weights.is_empty() || self.scale_in.weights.iter().sum::<Decimal>() != Decimal::ONE {
            return Err(ConfigValidationError::invalid(
                "risk.scale_in.weights must sum to 1",
            ));
        }

        Ok(())
    }
}
