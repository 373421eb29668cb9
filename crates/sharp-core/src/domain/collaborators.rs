//! 외부 협력자 인터페이스.
//!
//! 엔진 코어는 직접 네트워크/저장소 I/O를 하지 않습니다. 지표 계산, 성과 통계,
//! 과거 캔들 백필, 시그널 전달은 모두 이 trait들을 통해 주입되므로
//! 테스트에서 결정적으로 재현할 수 있습니다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Candle, Signal};
use crate::types::Timeframe;

// ================================================================================================
// 에러 타입
// ================================================================================================

/// 협력자 호출 에러.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    /// 응답 시간 초과
    #[error("{0} 응답 시간 초과")]
    Timeout(String),

    /// 데이터를 제공할 수 없음
    #[error("데이터 없음: {0}")]
    Unavailable(String),

    /// 응답 값이 유효하지 않음
    #[error("잘못된 응답: {0}")]
    InvalidResponse(String),
}

// ================================================================================================
// 응답 타입
// ================================================================================================

/// 지표 협력자가 캔들 윈도우로부터 계산한 값.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// Average True Range (가격 단위). 0/NaN이면 리스크 계산이 거부됩니다.
    pub atr: f64,
    /// 최근 ATR 분포 내 현재 ATR의 퍼센타일 (0 ~ 100)
    pub atr_percentile: f64,
    /// 부호 있는 모멘텀 (-100 ~ 100, 양수는 상승 모멘텀)
    pub momentum: f64,
}

impl IndicatorSnapshot {
    /// 모멘텀을 [-100, 100]으로 제한한 값.
    pub fn clamped_momentum(&self) -> f64 {
        if self.momentum.is_finite() {
            self.momentum.clamp(-100.0, 100.0)
        } else {
            0.0
        }
    }
}

/// 과거 시그널 성과 통계 (Kelly 사이징 입력).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// 승률 (0.0 ~ 1.0)
    pub win_rate: f64,
    /// 수익 거래의 평균 R
    pub avg_win_r: f64,
    /// 손실 거래의 평균 R (양수)
    pub avg_loss_r: f64,
    /// 표본 거래 수
    pub sample_size: usize,
}

// ================================================================================================
// Trait 정의
// ================================================================================================

/// ATR/모멘텀 지표 제공자.
#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    /// 로그와 caveat에 사용할 이름.
    fn name(&self) -> &str;

    /// 마감된 캔들 윈도우(오래된 순)에 대한 지표 스냅샷.
    async fn snapshot(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        window: &[Candle],
    ) -> Result<IndicatorSnapshot, CollaboratorError>;
}

/// 시그널 성과 추적 제공자.
#[async_trait]
pub trait PerformanceProvider: Send + Sync {
    /// 심볼/전략별 성과 통계. 기록이 없으면 `None`.
    async fn stats(
        &self,
        symbol: &str,
        strategy: &str,
    ) -> Result<Option<PerformanceStats>, CollaboratorError>;

    /// 종료된 시그널의 R 결과를 기록합니다 (손실은 음수).
    async fn record_outcome(
        &self,
        symbol: &str,
        strategy: &str,
        r_multiple: f64,
    ) -> Result<(), CollaboratorError>;
}

/// 과거 캔들 백필 소스.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// 오래된 순으로 정렬된 마감 캔들. `limit`개를 넘지 않습니다.
    async fn history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, CollaboratorError>;
}

/// 시그널 전달 대상 (알림, 감사 로그 저장 등).
#[async_trait]
pub trait SignalSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, signal: &Signal) -> Result<(), CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_momentum() {
        let snap = IndicatorSnapshot {
            atr: 450.0,
            atr_percentile: 50.0,
            momentum: 180.0,
        };
        assert_eq!(snap.clamped_momentum(), 100.0);

        let snap = IndicatorSnapshot {
            momentum: f64::NAN,
            ..snap
        };
        assert_eq!(snap.clamped_momentum(), 0.0);
    }

    #[test]
    fn test_error_display() {
        let err = CollaboratorError::Timeout("indicator".to_string());
        assert!(err.to_string().contains("indicator"));
    }
}
