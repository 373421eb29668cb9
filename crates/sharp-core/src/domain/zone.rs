//! 공급/수요 존 모델.
//!
//! 존 종류마다 상태 수명주기가 다릅니다:
//! - Order Block / Breaker Block: `Untested → Reacted → {Active, Mitigated}`, `Active → Mitigated`
//! - Fair Value Gap: `Unfilled → Filled` (역행 불가)
//! - Liquidity Sweep: `Confirmed → Invalidated`
//!
//! 모든 전이는 [`Zone`]의 메서드를 통해서만 일어나며, 허용되지 않은 전이는 거부됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::types::Price;

/// Order Block / Breaker Block 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    /// 생성 이후 가격이 아직 닿지 않음
    Untested,
    /// 가격이 존 안으로 들어옴
    Reacted,
    /// 반응 후 존 방향으로 다시 벗어남
    Active,
    /// 종가가 존을 관통함 (종료 상태)
    Mitigated,
}

impl BlockStatus {
    /// 허용된 전이인지 확인합니다.
    pub fn can_transition_to(self, next: BlockStatus) -> bool {
        use BlockStatus::*;
        matches!(
            (self, next),
            (Untested, Reacted) | (Reacted, Active) | (Reacted, Mitigated) | (Active, Mitigated)
        )
    }
}

/// Fair Value Gap 채움 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    Unfilled,
    Filled,
}

/// Liquidity Sweep 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    /// 스윕 확인됨
    Confirmed,
    /// 종가가 윅 극단을 넘어 무효화됨
    Invalidated,
}

/// 존 종류와 종류별 상태.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneKind {
    OrderBlock {
        status: BlockStatus,
    },
    FairValueGap {
        fill: FillStatus,
    },
    LiquiditySweep {
        status: SweepStatus,
        /// 스윕된 스윙 가격
        level: Price,
    },
    BreakerBlock {
        status: BlockStatus,
        /// 원본 Order Block id
        origin_zone: u64,
    },
}

impl ZoneKind {
    /// 로그/팩터 표기용 이름.
    pub fn name(&self) -> &'static str {
        match self {
            ZoneKind::OrderBlock { .. } => "OrderBlock",
            ZoneKind::FairValueGap { .. } => "FairValueGap",
            ZoneKind::LiquiditySweep { .. } => "LiquiditySweep",
            ZoneKind::BreakerBlock { .. } => "BreakerBlock",
        }
    }

    /// 블록 계열이면 현재 상태.
    pub fn block_status(&self) -> Option<BlockStatus> {
        match self {
            ZoneKind::OrderBlock { status } | ZoneKind::BreakerBlock { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// 존 상태 전이 거부.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("존 {zone_id} ({kind}): 허용되지 않은 전이 {from} -> {to}")]
pub struct ZoneTransitionError {
    pub zone_id: u64,
    pub kind: &'static str,
    pub from: String,
    pub to: String,
}

/// 가격 존.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// 파이프라인 내 고유 id
    pub id: u64,
    pub kind: ZoneKind,
    /// 존이 지지(Up)하는지 저항(Down)하는지
    pub direction: Direction,
    pub price_high: Price,
    pub price_low: Price,
    /// 강도 (0.0 ~ 1.0)
    pub strength: f64,
    /// 생성 캔들 인덱스
    pub created_index: usize,
    pub created_at: DateTime<Utc>,
    /// 종료 상태에 도달한 캔들 인덱스
    pub resolved_index: Option<usize>,
    /// 생성 원인 구조 이벤트 id
    pub source_event: Option<u64>,
}

impl Zone {
    /// 존 중간 가격.
    pub fn mid(&self) -> Price {
        (self.price_high + self.price_low) / Decimal::TWO
    }

    /// 가격이 존 범위 안에 있는지 확인합니다.
    pub fn contains(&self, price: Price) -> bool {
        price >= self.price_low && price <= self.price_high
    }

    /// 가격에서 존까지의 거리 (존 안이면 0).
    pub fn distance_to(&self, price: Price) -> Decimal {
        if price > self.price_high {
            price - self.price_high
        } else if price < self.price_low {
            self.price_low - price
        } else {
            Decimal::ZERO
        }
    }

    /// 종료 상태(Mitigated/Filled/Invalidated)인지 확인합니다.
    pub fn is_resolved(&self) -> bool {
        match &self.kind {
            ZoneKind::OrderBlock { status } | ZoneKind::BreakerBlock { status, .. } => {
                *status == BlockStatus::Mitigated
            }
            ZoneKind::FairValueGap { fill } => *fill == FillStatus::Filled,
            ZoneKind::LiquiditySweep { status, .. } => *status == SweepStatus::Invalidated,
        }
    }

    /// 아직 검증되지 않은 신선한 존인지 확인합니다.
    pub fn is_untested(&self) -> bool {
        match &self.kind {
            ZoneKind::OrderBlock { status } | ZoneKind::BreakerBlock { status, .. } => {
                *status == BlockStatus::Untested
            }
            ZoneKind::FairValueGap { fill } => *fill == FillStatus::Unfilled,
            ZoneKind::LiquiditySweep { status, .. } => *status == SweepStatus::Confirmed,
        }
    }

    /// 블록 상태를 전이합니다.
    pub fn advance_block(&mut self, next: BlockStatus, index: usize) -> Result<(), ZoneTransitionError> {
        let id = self.id;
        let kind = self.kind.name();
        match &mut self.kind {
            ZoneKind::OrderBlock { status } | ZoneKind::BreakerBlock { status, .. } => {
                if !status.can_transition_to(next) {
                    return Err(ZoneTransitionError {
                        zone_id: id,
                        kind,
                        from: format!("{:?}", status),
                        to: format!("{:?}", next),
                    });
                }
                *status = next;
            }
            _ => {
                return Err(ZoneTransitionError {
                    zone_id: id,
                    kind,
                    from: "-".to_string(),
                    to: format!("{:?}", next),
                })
            }
        }
        if next == BlockStatus::Mitigated {
            self.resolved_index = Some(index);
        }
        Ok(())
    }

    /// FVG를 채움 상태로 표시합니다. 이미 채워졌으면 아무 변화도 없습니다.
    pub fn mark_filled(&mut self, index: usize) -> Result<(), ZoneTransitionError> {
        match &mut self.kind {
            ZoneKind::FairValueGap { fill } => {
                if *fill == FillStatus::Unfilled {
                    *fill = FillStatus::Filled;
                    self.resolved_index = Some(index);
                }
                Ok(())
            }
            other => Err(ZoneTransitionError {
                zone_id: self.id,
                kind: other.name(),
                from: "-".to_string(),
                to: "Filled".to_string(),
            }),
        }
    }

    /// 스윕을 무효화합니다. 이미 무효화되었으면 아무 변화도 없습니다.
    pub fn invalidate_sweep(&mut self, index: usize) -> Result<(), ZoneTransitionError> {
        match &mut self.kind {
            ZoneKind::LiquiditySweep { status, .. } => {
                if *status == SweepStatus::Confirmed {
                    *status = SweepStatus::Invalidated;
                    self.resolved_index = Some(index);
                }
                Ok(())
            }
            other => Err(ZoneTransitionError {
                zone_id: self.id,
                kind: other.name(),
                from: "-".to_string(),
                to: "Invalidated".to_string(),
            }),
        }
    }
}
