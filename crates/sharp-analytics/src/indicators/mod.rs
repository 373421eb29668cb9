//! 기술적 지표 모듈.
//!
//! 시그널 엔진의 기본 지표 협력자가 사용하는 지표를 제공합니다.
//!
//! # 지원 지표
//!
//! ## 변동성 지표
//! - **ATR**: 평균 실제 범위 (Wilder 방식 EMA)
//! - **ATR 퍼센타일**: 최근 ATR 분포에서 현재 ATR의 위치 (변동성 국면 판정용)
//!
//! ## 모멘텀 지표
//! - **RSI**: 상대강도지수 (EWM)
//! - **거래량 모멘텀**: 단기/장기 평균 거래량 비율
//! - **부호 있는 모멘텀**: RSI와 거래량 모멘텀을 합친 -100 ~ 100 값
//!
//! # 사용 예시
//!
//! ```ignore
//! use sharp_analytics::indicators::{IndicatorEngine, AtrParams};
//!
//! let engine = IndicatorEngine::new();
//! let atr = engine.atr(&candles, AtrParams { period: 14 })?;
//! ```

pub mod momentum;
pub mod volatility;

use rust_decimal::Decimal;
use sharp_core::{Candle, SharpError};
use thiserror::Error;

pub use momentum::{MomentumCalculator, RsiParams, VolumeMomentumParams};
pub use volatility::{AtrParams, VolatilityIndicators};

/// 지표 계산 오류.
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// 데이터 부족 오류
    #[error("데이터가 부족합니다: 필요 {required}개, 제공 {provided}개")]
    InsufficientData { required: usize, provided: usize },

    /// 잘못된 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameter(String),

    /// 계산 오류
    #[error("계산 오류: {0}")]
    CalculationError(String),
}

/// 지표 계산 결과 타입.
pub type IndicatorResult<T> = Result<T, IndicatorError>;

impl From<IndicatorError> for SharpError {
    fn from(err: IndicatorError) -> Self {
        match err {
            IndicatorError::InsufficientData { required, provided } => {
                SharpError::DataInsufficient { required, provided }
            }
            other => SharpError::DataUnavailable(other.to_string()),
        }
    }
}

/// 통합 지표 엔진.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndicatorEngine {
    momentum: MomentumCalculator,
    volatility: VolatilityIndicators,
}

impl IndicatorEngine {
    /// 새로운 지표 엔진 생성.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== 변동성 지표 ====================

    /// ATR (Average True Range) 계산.
    ///
    /// # 반환
    /// 캔들별 ATR (처음 period-1개는 None)
    pub fn atr(&self, candles: &[Candle], params: AtrParams) -> IndicatorResult<Vec<Option<Decimal>>> {
        self.volatility.atr(candles, params)
    }

    /// 마지막 캔들의 ATR 퍼센타일 (0 ~ 100).
    pub fn atr_percentile(
        &self,
        candles: &[Candle],
        params: AtrParams,
        lookback: usize,
    ) -> IndicatorResult<f64> {
        self.volatility.atr_percentile(candles, params, lookback)
    }

    // ==================== 모멘텀 지표 ====================

    /// RSI (Relative Strength Index) 계산.
    ///
    /// # 반환
    /// 0-100 사이의 RSI 값들
    pub fn rsi(&self, prices: &[Decimal], params: RsiParams) -> IndicatorResult<Vec<Option<Decimal>>> {
        self.momentum.rsi(prices, params)
    }

    /// 단기/장기 평균 거래량 비율.
    pub fn volume_momentum(&self, candles: &[Candle], params: VolumeMomentumParams) -> IndicatorResult<f64> {
        self.momentum.volume_momentum(candles, params)
    }

    /// 부호 있는 모멘텀 (-100 ~ 100).
    pub fn signed_momentum(
        &self,
        candles: &[Candle],
        rsi: RsiParams,
        volume: VolumeMomentumParams,
    ) -> IndicatorResult<f64> {
        self.momentum.signed_momentum(candles, rsi, volume)
    }
}
