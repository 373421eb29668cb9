//! 리스크 플랜: 손절/익절 레벨과 포지션 크기.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Direction;
use crate::types::{Price, Quantity};

/// ATR 퍼센타일 구간으로 분류한 변동성 레짐.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
    Extreme,
}

impl fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VolatilityRegime::Low => "LOW",
            VolatilityRegime::Normal => "NORMAL",
            VolatilityRegime::High => "HIGH",
            VolatilityRegime::Extreme => "EXTREME",
        };
        f.write_str(s)
    }
}

/// 레짐과 신뢰도로 산출한 거래 위험 등급.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

/// 포지션 사이징 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    FixedFractional,
    Kelly,
}

/// 익절 레벨의 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    /// 고정 R 배수
    RMultiple,
    /// 가장 가까운 반대 방향 존
    OpposingZone,
}

/// 익절 레벨.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitLevel {
    pub price: Price,
    /// |price - entry| / stop_distance
    pub r_multiple: Decimal,
    pub source: TargetSource,
    /// 이 레벨에서 청산할 비중 (0.0 ~ 1.0)
    pub scale_out: Decimal,
}

/// 트레일링 스탑 제안.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopPlan {
    /// 가격 기준 추적 거리
    pub distance: Decimal,
    /// 이 가격에 도달하면 추적 시작 (TP1)
    pub activation_price: Price,
}

/// 시그널의 리스크 플랜.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPlan {
    pub direction: Direction,
    pub entry_price: Price,
    pub atr: Decimal,
    pub regime: VolatilityRegime,
    /// 손절 거리에 사용한 ATR 배수
    pub atr_multiple: Decimal,
    pub stop_distance: Decimal,
    pub stop_loss: Price,
    pub take_profits: Vec<TakeProfitLevel>,
    /// 실제 적용한 계좌 리스크 비율
    pub risk_fraction: Decimal,
    pub sizing: SizingMethod,
    pub position_size: Quantity,
    /// position_size × stop_distance
    pub risk_amount: Decimal,
    pub trailing_stop: Option<TrailingStopPlan>,
    /// 분할 진입 비중 (비어 있으면 일괄 진입)
    pub scale_in: Vec<Decimal>,
    pub risk_level: RiskLevel,
}

impl RiskPlan {
    /// 첫 번째 익절 가격.
    pub fn first_target(&self) -> Option<Price> {
        self.take_profits.first().map(|tp| tp.price)
    }

    /// 익절 가격 목록.
    pub fn target_prices(&self) -> Vec<Price> {
        self.take_profits.iter().map(|tp| tp.price).collect()
    }

    /// 레벨별 리스크/보상 비율.
    pub fn reward_ratios(&self) -> Vec<Decimal> {
        self.take_profits.iter().map(|tp| tp.r_multiple).collect()
    }
}
