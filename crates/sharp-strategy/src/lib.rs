//! # Sharp Strategy
//!
//! 타임프레임별 분석 파이프라인을 묶어 방향성 시그널을 만드는 엔진.
//!
//! # 구성
//!
//! - [`pipeline`]: (심볼, 타임프레임)별 캔들 버퍼, 스윙, 구조, 존
//! - [`scoring`]: Sharp Score 계산과 실행 가능 판정
//! - [`retry`]: 협력자 호출 타임아웃과 지수 백오프
//! - [`tracker`]: 발행된 시그널의 종료 판정과 보관
//! - [`sink`]: 기본 시그널 싱크
//! - [`engine`]: 심볼별 사이클과 멀티 심볼 엔진
//! - [`config`]: 전체 엔진 설정
//!
//! # 예제
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sharp_analytics::CandleIndicatorProvider;
//! use sharp_strategy::{CandleEvent, Collaborators, EngineConfig, SignalEngine};
//!
//! let config = EngineConfig::load(Some(Path::new("config/default.toml")))?;
//! let indicator = Arc::new(CandleIndicatorProvider::new(config.indicator.clone()));
//! let mut engine = SignalEngine::new(config, Collaborators::new(indicator))?;
//!
//! let report = engine.on_candle(CandleEvent::new("BTCUSDT", Timeframe::H1, candle)).await?;
//! if let Some(signal) = report.emitted {
//!     println!("{} {:.1}", signal.direction, signal.score);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod pipeline;
pub mod retry;
pub mod scoring;
pub mod sink;
pub mod tracker;

pub use config::{CollaboratorConfig, EngineConfig, PipelineConfig, ScoringConfig, TrackingConfig};
pub use engine::{
    CandleEvent, Collaborators, CycleReport, CycleStatus, EngineStats, SignalEngine, SymbolEngine,
};
pub use pipeline::{CandleOutcome, CycleUpdate, PipelineSettings, TimeframePipeline};
pub use retry::RetryPolicy;
pub use scoring::{nearest_opposing_zone, DirectionalScore, ScoreOutcome, ScoringEngine};
pub use sink::{LoggingSink, MemorySink};
pub use tracker::{ClosedSignal, SignalTracker};
