//! 캔들 윈도우로 ATR/모멘텀을 계산하는 기본 지표 협력자.
//!
//! 외부 지표 서비스가 없을 때(리플레이, 테스트) 파이프라인에 연결됩니다.

use async_trait::async_trait;
use sharp_core::{Candle, CollaboratorError, DecimalExt, IndicatorProvider, IndicatorSnapshot, Timeframe};
use tracing::trace;

use crate::config::IndicatorConfig;
use crate::indicators::{AtrParams, IndicatorEngine, IndicatorError, RsiParams, VolumeMomentumParams};

/// [`IndicatorEngine`] 기반 지표 제공자.
#[derive(Debug, Clone, Default)]
pub struct CandleIndicatorProvider {
    engine: IndicatorEngine,
    config: IndicatorConfig,
}

impl CandleIndicatorProvider {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            engine: IndicatorEngine::new(),
            config,
        }
    }

    /// 동기 계산. 비동기 trait 구현과 테스트에서 공용으로 사용합니다.
    pub fn compute(&self, window: &[Candle]) -> Result<IndicatorSnapshot, IndicatorError> {
        let atr_params = AtrParams {
            period: self.config.atr_period,
        };
        let atr = self
            .engine
            .atr(window, atr_params)?
            .last()
            .copied()
            .flatten()
            .ok_or_else(|| IndicatorError::CalculationError("ATR 값이 없습니다".to_string()))?;
        let atr_percentile = self
            .engine
            .atr_percentile(window, atr_params, self.config.percentile_lookback)?;
        let momentum = self.engine.signed_momentum(
            window,
            RsiParams {
                period: self.config.rsi_period,
            },
            VolumeMomentumParams {
                fast: self.config.fast_volume_period,
                slow: self.config.slow_volume_period,
            },
        )?;

        Ok(IndicatorSnapshot {
            atr: atr.to_f64_lossy(),
            atr_percentile,
            momentum,
        })
    }
}

#[async_trait]
impl IndicatorProvider for CandleIndicatorProvider {
    fn name(&self) -> &str {
        "candle-indicators"
    }

    async fn snapshot(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        window: &[Candle],
    ) -> Result<IndicatorSnapshot, CollaboratorError> {
        let snapshot = self.compute(window).map_err(|e| match e {
            IndicatorError::InsufficientData { .. } => CollaboratorError::Unavailable(e.to_string()),
            other => CollaboratorError::InvalidResponse(other.to_string()),
        })?;
        trace!(
            symbol,
            timeframe = %timeframe,
            atr = snapshot.atr,
            atr_percentile = snapshot.atr_percentile,
            momentum = snapshot.momentum,
            "지표 스냅샷"
        );
        Ok(snapshot)
    }
}
