//! 시그널 엔진의 에러 타입.
//!
//! 복구 가능한 에러(데이터 부족, 협력자 타임아웃)와 파이프라인을 정지시키는
//! 치명적 에러(잘못된 캔들 시퀀스, 설정 오류)를 구분합니다.
//! 모호한 구조는 에러가 아니며 NEUTRAL 판정으로 처리됩니다.

use thiserror::Error;

use crate::domain::{CollaboratorError, ZoneTransitionError};
use crate::types::Timeframe;

/// 엔진 에러.
#[derive(Debug, Error)]
pub enum SharpError {
    /// 분석에 필요한 캔들 수 부족
    #[error("데이터 부족: 필요 {required}개, 제공 {provided}개")]
    DataInsufficient { required: usize, provided: usize },

    /// ATR 또는 손절 거리가 유효하지 않음
    #[error("유효하지 않은 리스크: {0}")]
    InvalidRisk(String),

    /// 협력자 호출이 재시도 후에도 시간 초과
    #[error("협력자 타임아웃: {collaborator} ({attempts}회 시도)")]
    CollaboratorTimeout { collaborator: String, attempts: u32 },

    /// 협력자가 데이터를 제공하지 못함
    #[error("데이터 사용 불가: {0}")]
    DataUnavailable(String),

    /// 잘못된 설정 또는 잘못된 캔들 시퀀스
    #[error("설정 에러: {0}")]
    Configuration(String),

    /// 이전 설정 에러로 정지된 파이프라인
    #[error("파이프라인 정지됨 [{symbol} {timeframe}]: {reason}")]
    PipelineHalted {
        symbol: String,
        timeframe: Timeframe,
        reason: String,
    },

    /// 허용되지 않은 시그널 상태 전이
    #[error("잘못된 상태 전이: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 엔진 작업을 위한 Result 타입.
pub type SharpResult<T> = Result<T, SharpError>;

impl SharpError {
    /// 다음 캔들 마감 시 재시도하면 해소될 수 있는 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SharpError::DataInsufficient { .. }
                | SharpError::CollaboratorTimeout { .. }
                | SharpError::DataUnavailable(_)
        )
    }

    /// 파이프라인을 정지시키는 치명적 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SharpError::Configuration(_) | SharpError::PipelineHalted { .. }
        )
    }
}

impl From<serde_json::Error> for SharpError {
    fn from(err: serde_json::Error) -> Self {
        SharpError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for SharpError {
    fn from(err: config::ConfigError) -> Self {
        SharpError::Configuration(err.to_string())
    }
}

impl From<crate::config::ConfigValidationError> for SharpError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        SharpError::Configuration(err.to_string())
    }
}

impl From<ZoneTransitionError> for SharpError {
    fn from(err: ZoneTransitionError) -> Self {
        SharpError::InvalidTransition {
            from: format!("{} {}", err.kind, err.from),
            to: err.to,
        }
    }
}

impl From<CollaboratorError> for SharpError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::Timeout(name) => SharpError::CollaboratorTimeout {
                collaborator: name,
                attempts: 1,
            },
            other => SharpError::DataUnavailable(other.to_string()),
        }
    }
}
