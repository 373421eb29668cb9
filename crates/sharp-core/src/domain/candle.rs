//! 캔들 데이터와 시퀀스 검증.
//!
//! 캔들은 마감된 이후 불변이며 (심볼, 타임프레임)별로 시간순 append-only입니다.
//! 이 규칙을 어기는 입력은 [`CandleDefect`]로 보고되고, 파이프라인은 이를
//! 치명적 설정 에러로 취급하여 정지합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Price, Timeframe};

/// 마감된 OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시각
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량
    pub volume: Decimal,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 양봉인지 확인합니다.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// 음봉인지 확인합니다.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// 몸통 크기.
    pub fn body_size(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    /// 고가-저가 범위.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// 고가와 저가의 중간값.
    pub fn mid(&self) -> Price {
        (self.high + self.low) / Decimal::TWO
    }

    /// 타임프레임 기준 캔들 마감 시각.
    pub fn close_time(&self, timeframe: Timeframe) -> DateTime<Utc> {
        timeframe.close_time(self.timestamp)
    }

    /// 단일 캔들의 내부 일관성을 검증합니다.
    pub fn validate(&self) -> Result<(), CandleDefect> {
        if self.high < self.low {
            return Err(CandleDefect::HighBelowLow {
                timestamp: self.timestamp,
                high: self.high,
                low: self.low,
            });
        }
        if self.open < self.low || self.open > self.high {
            return Err(CandleDefect::OutOfRange {
                timestamp: self.timestamp,
                field: "open",
            });
        }
        if self.close < self.low || self.close > self.high {
            return Err(CandleDefect::OutOfRange {
                timestamp: self.timestamp,
                field: "close",
            });
        }
        if self.volume < Decimal::ZERO {
            return Err(CandleDefect::NegativeVolume {
                timestamp: self.timestamp,
            });
        }
        Ok(())
    }
}

/// 잘못된 캔들 입력.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleDefect {
    #[error("고가가 저가보다 낮음 ({timestamp}): high={high}, low={low}")]
    HighBelowLow {
        timestamp: DateTime<Utc>,
        high: Price,
        low: Price,
    },

    #[error("{field} 값이 고가/저가 범위를 벗어남 ({timestamp})")]
    OutOfRange {
        timestamp: DateTime<Utc>,
        field: &'static str,
    },

    #[error("음수 거래량 ({timestamp})")]
    NegativeVolume { timestamp: DateTime<Utc> },

    #[error("타임스탬프 역행: 이전 {previous}, 현재 {current}")]
    TimestampRegression {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("같은 시각({timestamp})에 다른 값의 캔들이 도착함")]
    ConflictingDuplicate { timestamp: DateTime<Utc> },
}

/// 새 캔들이 시퀀스에 어떻게 반영되는지.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// 새로운 마감 캔들. 시퀀스에 추가됩니다.
    Append,
    /// 직전 캔들과 동일한 재전송. 무시됩니다.
    Rerun,
}

/// 직전 캔들 대비 새 캔들의 시퀀스 규칙을 검사합니다.
pub fn check_sequence(previous: Option<&Candle>, next: &Candle) -> Result<SequenceCheck, CandleDefect> {
    next.validate()?;

    let Some(previous) = previous else {
        return Ok(SequenceCheck::Append);
    };

    if next.timestamp > previous.timestamp {
        Ok(SequenceCheck::Append)
    } else if next.timestamp == previous.timestamp {
        if next == previous {
            Ok(SequenceCheck::Rerun)
        } else {
            Err(CandleDefect::ConflictingDuplicate {
                timestamp: next.timestamp,
            })
        }
    } else {
        Err(CandleDefect::TimestampRegression {
            previous: previous.timestamp,
            current: next.timestamp,
        })
    }
}
