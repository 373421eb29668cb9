//! 변동성 지표 (Volatility Indicators).
//!
//! - ATR (Average True Range, 평균 실제 범위)
//! - ATR 퍼센타일

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sharp_core::{Candle, DecimalExt};

use super::{IndicatorError, IndicatorResult};

/// ATR 파라미터.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AtrParams {
    /// ATR 기간 (기본: 14).
    pub period: usize,
}

impl Default for AtrParams {
    fn default() -> Self {
        Self { period: 14 }
    }
}

/// 변동성 지표 계산기.
#[derive(Debug, Default, Clone, Copy)]
pub struct VolatilityIndicators;

impl VolatilityIndicators {
    /// 새로운 변동성 지표 계산기 생성.
    pub fn new() -> Self {
        Self
    }

    /// ATR (Average True Range) 계산.
    ///
    /// True Range = max(고가 - 저가, |고가 - 전일종가|, |저가 - 전일종가|)
    /// ATR = True Range의 EMA (alpha = 1/period, 초기값은 단순 평균)
    pub fn atr(&self, candles: &[Candle], params: AtrParams) -> IndicatorResult<Vec<Option<Decimal>>> {
        let len = candles.len();
        let period = params.period;

        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "기간은 0보다 커야 합니다".to_string(),
            ));
        }
        if len < period + 1 {
            return Err(IndicatorError::InsufficientData {
                required: period + 1,
                provided: len,
            });
        }

        // True Range 계산
        let mut true_ranges = Vec::with_capacity(len);
        true_ranges.push(candles[0].range()); // 첫 번째는 당일 범위

        for pair in candles.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let hl = cur.high - cur.low;
            let hc = (cur.high - prev.close).abs();
            let lc = (cur.low - prev.close).abs();
            true_ranges.push(hl.max(hc).max(lc));
        }

        // ATR 계산 (EMA 방식)
        let mut result: Vec<Option<Decimal>> = Vec::with_capacity(len);
        let alpha = Decimal::ONE / Decimal::from(period);
        let one_minus_alpha = Decimal::ONE - alpha;
        let mut current = Decimal::ZERO;

        for (i, tr) in true_ranges.iter().enumerate() {
            if i + 1 < period {
                result.push(None);
            } else if i + 1 == period {
                // 초기 ATR은 단순 평균
                let sum: Decimal = true_ranges[..=i].iter().sum();
                current = sum / Decimal::from(period);
                result.push(Some(current));
            } else {
                current = (*tr * alpha) + (current * one_minus_alpha);
                result.push(Some(current));
            }
        }

        Ok(result)
    }

    /// 최근 `lookback`개 ATR 값 중 마지막 ATR의 퍼센타일.
    ///
    /// 중간 순위 방식: (작은 값 수 + 같은 값 수의 절반) / 표본 수 × 100.
    /// 모든 값이 같으면 50입니다.
    pub fn atr_percentile(&self, candles: &[Candle], params: AtrParams, lookback: usize) -> IndicatorResult<f64> {
        if lookback == 0 {
            return Err(IndicatorError::InvalidParameter(
                "퍼센타일 구간은 0보다 커야 합니다".to_string(),
            ));
        }
        let series: Vec<f64> = self
            .atr(candles, params)?
            .into_iter()
            .flatten()
            .map(|v| v.to_f64_lossy())
            .collect();
        let window = &series[series.len().saturating_sub(lookback)..];
        let Some(&current) = window.last() else {
            return Err(IndicatorError::CalculationError("ATR 값이 없습니다".to_string()));
        };

        let below = window.iter().filter(|&&v| v < current).count() as f64;
        let equal = window.iter().filter(|&&v| v == current).count() as f64;
        Ok(((below + 0.5 * equal) / window.len() as f64 * 100.0).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(i: i64, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i),
            close,
            high,
            low,
            close,
            dec!(1),
        )
    }

    fn constant_range(n: i64, range: Decimal) -> Vec<Candle> {
        (0..n)
            .map(|i| bar(i, dec!(100) + range / dec!(2), dec!(100) - range / dec!(2), dec!(100)))
            .collect()
    }

    #[test]
    fn test_atr_constant_range() {
        let vol = VolatilityIndicators::new();
        let candles = constant_range(20, dec!(4));
        let atr = vol.atr(&candles, AtrParams { period: 14 }).unwrap();

        assert_eq!(atr.len(), 20);
        assert!(atr[12].is_none());
        assert_eq!(atr[13], Some(dec!(4)));
        assert_eq!(atr[19], Some(dec!(4)));
    }

    #[test]
    fn test_atr_uses_gaps() {
        let vol = VolatilityIndicators::new();
        let candles = vec![
            bar(0, dec!(101), dec!(99), dec!(100)),
            bar(1, dec!(111), dec!(109), dec!(110)), // 갭: TR = 11
            bar(2, dec!(111), dec!(109), dec!(110)),
        ];
        let atr = vol.atr(&candles, AtrParams { period: 2 }).unwrap();
        // 초기값 (2 + 11) / 2 = 6.5, 이후 2 × 0.5 + 6.5 × 0.5 = 4.25
        assert_eq!(atr[1], Some(dec!(6.5)));
        assert_eq!(atr[2], Some(dec!(4.25)));
    }

    #[test]
    fn test_atr_insufficient_data() {
        let vol = VolatilityIndicators::new();
        let result = vol.atr(&constant_range(10, dec!(2)), AtrParams { period: 14 });
        assert!(matches!(
            result,
            Err(IndicatorError::InsufficientData {
                required: 15,
                provided: 10
            })
        ));
    }

    #[test]
    fn test_atr_percentile_bands() {
        let vol = VolatilityIndicators::new();
        let flat = constant_range(40, dec!(2));
        let pct = vol.atr_percentile(&flat, AtrParams { period: 5 }, 20).unwrap();
        assert!((pct - 50.0).abs() < 1e-9);

        // 마지막에 큰 변동성: 최상위 퍼센타일
        let mut spiking = flat.clone();
        spiking.push(bar(40, dec!(110), dec!(90), dec!(100)));
        let pct = vol.atr_percentile(&spiking, AtrParams { period: 5 }, 20).unwrap();
        assert!(pct >= 95.0);
    }
}
