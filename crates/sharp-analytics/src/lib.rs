//! # Sharp Analytics
//!
//! 캔들 시퀀스로부터 시장 구조를 추출하는 분석 컴포넌트.
//!
//! # 구성
//!
//! - [`swing`]: 스윙 고점/저점 탐지 (증분, O(k))
//! - [`structure`]: BOS/CHoCH 추세 상태 머신 (명시적 상태 전달)
//! - [`zones`]: Order Block, Fair Value Gap, Liquidity Sweep, Breaker Block
//! - [`multi_timeframe`]: 타임프레임 바이어스 가중 집계와 정렬 배수
//! - [`indicators`]: ATR, ATR 퍼센타일, RSI, 거래량 모멘텀
//! - [`provider`]: 캔들 기반 기본 지표 협력자
//! - [`performance`]: 시그널 R 결과를 누적하는 인메모리 성과 원장
//! - [`timeframe_alignment`]: 리플레이 시 Look-Ahead 없는 타임프레임 병합

pub mod config;
pub mod indicators;
pub mod multi_timeframe;
pub mod performance;
pub mod provider;
pub mod structure;
pub mod swing;
pub mod timeframe_alignment;
pub mod zones;

pub use config::{
    ConfluenceConfig, IndicatorConfig, MultiplierConfig, StructureConfig, SwingConfig, TierConfig,
    ZoneConfig,
};
pub use indicators::{IndicatorEngine, IndicatorError, IndicatorResult};
pub use multi_timeframe::MultiTimeframeAggregator;
pub use performance::PerformanceLedger;
pub use provider::CandleIndicatorProvider;
pub use structure::{StructureAnalyzer, StructureState};
pub use swing::{SwingPointDetector, SwingUpdate};
pub use timeframe_alignment::{TimeframeAligner, TimedCandle};
pub use zones::{SwingRefs, ZoneDetector, ZoneUpdate};
