//! 리스크 관리 시스템.
//!
//! 이 crate는 실행 가능한 시그널을 거래 계획으로 바꿉니다:
//! - ATR 퍼센타일 기반 변동성 레짐 분류
//! - ATR × 레짐 배수 손절 거리와 손절가
//! - R 배수 또는 반대 존 기반 익절 레벨
//! - 고정 비율 및 Kelly 포지션 사이징
//! - 트레일링 스탑, 분할 진입/청산 제안과 위험 등급
//!
//! # 예제
//!
//! ```rust,ignore
//! use sharp_risk::{RiskConfig, RiskManager, RiskRequest};
//!
//! let manager = RiskManager::new(RiskConfig::default())?;
//! let plan = manager.plan(&RiskRequest::new("BTCUSDT", Direction::Up, entry, 450.0, 50.0, 71.5))?;
//! ```

pub mod config;
pub mod manager;
pub mod position_sizing;
pub mod regime;
pub mod stop_loss;

// 주요 타입 재내보내기
pub use config::{
    ConfidenceAdjustment, KellyConfig, RegimeConfig, RiskConfig, ScaleInConfig, SymbolRiskConfig,
    TakeProfitConfig, TakeProfitPolicy, TrailingConfig,
};
pub use manager::{RiskManager, RiskRequest};
pub use position_sizing::{PositionSizer, SizingDecision};
pub use regime::{classify_regime, risk_level};
pub use stop_loss::StopPlanner;
