//! # Sharp Core
//!
//! 시장 구조 분석 및 시그널 스코어링 엔진의 핵심 도메인 모델을 제공합니다.
//!
//! 이 크레이트는 엔진 전반에서 공유되는 기본 타입을 제공합니다:
//! - 캔들 및 캔들 시퀀스 검증
//! - 스윙 포인트, 구조 이벤트(BOS/CHoCH), 추세 상태
//! - 존(Order Block, FVG, Liquidity Sweep, Breaker Block)
//! - 타임프레임 컨텍스트와 컨플루언스 결과
//! - 시그널과 리스크 플랜
//! - 외부 협력자(지표, 성과 추적, 캔들 소스, 시그널 싱크) 인터페이스
//! - 설정 로딩과 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
