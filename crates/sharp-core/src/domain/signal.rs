//! 방향성 시그널과 수명주기.
//!
//! - `SignalDirection` - BUY / SELL / NEUTRAL
//! - `SignalState` - GENERATED → DELIVERED → TRACKED → {CLOSED_WIN, CLOSED_LOSS, INVALIDATED}
//! - `DedupKey` - (심볼, 타임프레임, 구조 이벤트 id). 시그널 id도 이 키에서 결정적으로 파생됩니다.
//! - `Signal` - 스코어, 기여 요인, 리스크 플랜을 담는 직렬화 가능한 엔티티

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::{ConfluenceResult, Direction, RiskPlan};
use crate::error::SharpError;
use crate::types::{Price, Quantity, Timeframe};

/// 시그널 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalDirection {
    Buy,
    Sell,
    Neutral,
}

impl SignalDirection {
    /// 가격 방향으로 변환합니다 (중립은 `None`).
    pub fn direction(self) -> Option<Direction> {
        match self {
            SignalDirection::Buy => Some(Direction::Up),
            SignalDirection::Sell => Some(Direction::Down),
            SignalDirection::Neutral => None,
        }
    }
}

impl From<Direction> for SignalDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => SignalDirection::Buy,
            Direction::Down => SignalDirection::Sell,
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Buy => write!(f, "BUY"),
            SignalDirection::Sell => write!(f, "SELL"),
            SignalDirection::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// 시그널 수명주기 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalState {
    Generated,
    Delivered,
    Tracked,
    ClosedWin,
    ClosedLoss,
    Invalidated,
}

impl SignalState {
    /// 허용된 전이인지 확인합니다.
    ///
    /// 전달 실패 시에도 추적은 시작되므로 `Generated → Tracked`를 허용합니다.
    pub fn can_transition_to(self, next: SignalState) -> bool {
        use SignalState::*;
        matches!(
            (self, next),
            (Generated, Delivered)
                | (Generated, Tracked)
                | (Delivered, Tracked)
                | (Tracked, ClosedWin)
                | (Tracked, ClosedLoss)
                | (Tracked, Invalidated)
        )
    }

    /// 종료 상태인지 확인합니다.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            SignalState::ClosedWin | SignalState::ClosedLoss | SignalState::Invalidated
        )
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalState::Generated => "GENERATED",
            SignalState::Delivered => "DELIVERED",
            SignalState::Tracked => "TRACKED",
            SignalState::ClosedWin => "CLOSED_WIN",
            SignalState::ClosedLoss => "CLOSED_LOSS",
            SignalState::Invalidated => "INVALIDATED",
        };
        f.write_str(s)
    }
}

/// 시그널에 붙는 주의 플래그.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "caveat", rename_all = "snake_case")]
pub enum Caveat {
    /// 협력자 호출이 재시도 후에도 시간 초과
    CollaboratorTimeout { collaborator: String },
    /// 협력자가 데이터를 제공하지 못함
    DataUnavailable { reason: String },
    /// ATR/손절 거리가 유효하지 않아 리스크 플랜 없음
    InvalidRisk { reason: String },
    /// 리스크 입력(ATR)을 얻지 못해 리스크 플랜 없음
    RiskUnavailable,
    /// 정렬 없음 억제를 설정으로 무시함
    UnalignedOverride,
}

/// 스코어 구성 요소.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub structure: f64,
    pub zone: f64,
    pub momentum: f64,
    pub raw: f64,
    pub multiplier: f64,
    pub final_score: f64,
}

/// 시그널 중복 제거 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub structure_event_id: u64,
}

impl DedupKey {
    /// 새 키를 생성합니다.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, structure_event_id: u64) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            structure_event_id,
        }
    }

    /// 키에서 파생한 결정적 UUID (v5).
    pub fn to_uuid(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.to_string().as_bytes())
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.symbol, self.timeframe, self.structure_event_id)
    }
}

/// 엔진이 생성한 방향성 시그널.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// 중복 제거 키에서 파생된 id
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub direction: SignalDirection,
    /// Sharp Score (0 ~ 100)
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// 기여 요인 설명
    pub factors: Vec<String>,
    pub entry_price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Price>,
    #[serde(default)]
    pub take_profits: Vec<Price>,
    #[serde(default)]
    pub risk_reward: Vec<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_size: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_plan: Option<RiskPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confluence: Option<ConfluenceResult>,
    pub structure_event_id: u64,
    /// 트리거 캔들의 마감 시각
    pub generated_at: DateTime<Utc>,
    pub state: SignalState,
    /// 협력자 실패로 신뢰도가 낮아진 시그널인지
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub caveats: Vec<Caveat>,
}

impl Signal {
    /// 새 시그널을 생성합니다. 상태는 `Generated`입니다.
    pub fn new(
        key: &DedupKey,
        direction: SignalDirection,
        breakdown: ScoreBreakdown,
        entry_price: Price,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: key.to_uuid(),
            symbol: key.symbol.clone(),
            timeframe: key.timeframe,
            direction,
            score: breakdown.final_score.clamp(0.0, 100.0),
            breakdown,
            factors: Vec::new(),
            entry_price,
            stop_loss: None,
            take_profits: Vec::new(),
            risk_reward: Vec::new(),
            position_size: None,
            risk_plan: None,
            confluence: None,
            structure_event_id: key.structure_event_id,
            generated_at,
            state: SignalState::Generated,
            degraded: false,
            caveats: Vec::new(),
        }
    }

    /// 중복 제거 키.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.symbol.clone(), self.timeframe, self.structure_event_id)
    }

    /// 기여 요인을 설정합니다.
    pub fn with_factors(mut self, factors: Vec<String>) -> Self {
        self.factors = factors;
        self
    }

    /// 컨플루언스 결과를 첨부합니다.
    pub fn with_confluence(mut self, confluence: ConfluenceResult) -> Self {
        self.confluence = Some(confluence);
        self
    }

    /// 리스크 플랜을 첨부하고 가격 필드를 채웁니다.
    pub fn with_risk_plan(mut self, plan: RiskPlan) -> Self {
        self.stop_loss = Some(plan.stop_loss);
        self.take_profits = plan.target_prices();
        self.risk_reward = plan.reward_ratios();
        self.position_size = Some(plan.position_size);
        self.risk_plan = Some(plan);
        self
    }

    /// 주의 플래그를 추가합니다.
    pub fn with_caveat(mut self, caveat: Caveat) -> Self {
        self.caveats.push(caveat);
        self
    }

    /// 신뢰도를 낮춘 degraded 시그널로 표시합니다.
    pub fn degrade(mut self, factor: f64) -> Self {
        self.degraded = true;
        self.score = (self.score * factor.clamp(0.0, 1.0)).clamp(0.0, 100.0);
        self
    }

    /// 상태를 전이합니다.
    pub fn transition(&mut self, next: SignalState) -> Result<(), SharpError> {
        if !self.state.can_transition_to(next) {
            return Err(SharpError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }
}
