//! 모멘텀 지표 (Momentum Indicators).
//!
//! RSI와 거래량 모멘텀, 그리고 둘을 합친 부호 있는 모멘텀을 제공합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sharp_core::{Candle, DecimalExt};

use super::{IndicatorError, IndicatorResult};

/// RSI 파라미터.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RsiParams {
    /// RSI 기간 (기본: 14).
    pub period: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self { period: 14 }
    }
}

/// 거래량 모멘텀 파라미터.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeMomentumParams {
    /// 단기 평균 기간 (기본: 5).
    pub fast: usize,
    /// 장기 평균 기간 (기본: 20).
    pub slow: usize,
}

impl Default for VolumeMomentumParams {
    fn default() -> Self {
        Self { fast: 5, slow: 20 }
    }
}

/// 모멘텀 지표 계산기.
#[derive(Debug, Default, Clone, Copy)]
pub struct MomentumCalculator;

impl MomentumCalculator {
    /// 새로운 모멘텀 계산기 생성.
    pub fn new() -> Self {
        Self
    }

    /// RSI (Relative Strength Index) 계산.
    ///
    /// RSI = 100 - (100 / (1 + RS))
    /// RS = 평균 상승폭 / 평균 하락폭
    ///
    /// 평균은 EWM (alpha = 1/period, 초기값은 단순 평균) 방식입니다.
    pub fn rsi(&self, prices: &[Decimal], params: RsiParams) -> IndicatorResult<Vec<Option<Decimal>>> {
        let period = params.period;

        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "기간은 0보다 커야 합니다".to_string(),
            ));
        }

        if prices.len() < period + 1 {
            return Err(IndicatorError::InsufficientData {
                required: period + 1,
                provided: prices.len(),
            });
        }

        // 가격 변화 계산
        let mut deltas = Vec::with_capacity(prices.len());
        deltas.push(Decimal::ZERO); // 첫 번째는 변화 없음
        deltas.extend(prices.windows(2).map(|w| w[1] - w[0]));

        // 상승/하락 분리
        let gains: Vec<Decimal> = deltas.iter().map(|&d| d.max(Decimal::ZERO)).collect();
        let losses: Vec<Decimal> = deltas
            .iter()
            .map(|&d| if d < Decimal::ZERO { d.abs() } else { Decimal::ZERO })
            .collect();

        let alpha = Decimal::ONE / Decimal::from(period);
        let avg_gains = ewm(&gains, alpha, period);
        let avg_losses = ewm(&losses, alpha, period);

        let result = avg_gains
            .into_iter()
            .zip(avg_losses)
            .map(|pair| match pair {
                (Some(_), Some(loss)) if loss == Decimal::ZERO => Some(dec!(100)),
                (Some(gain), Some(loss)) => {
                    let rs = gain / loss;
                    Some(dec!(100) - (dec!(100) / (Decimal::ONE + rs)))
                }
                _ => None,
            })
            .collect();

        Ok(result)
    }

    /// 단기 평균 거래량 / 장기 평균 거래량. 장기 평균이 0이면 1.0 (중립).
    pub fn volume_momentum(&self, candles: &[Candle], params: VolumeMomentumParams) -> IndicatorResult<f64> {
        if params.fast == 0 || params.fast > params.slow {
            return Err(IndicatorError::InvalidParameter(format!(
                "거래량 기간이 잘못되었습니다: fast={}, slow={}",
                params.fast, params.slow
            )));
        }
        if candles.len() < params.slow {
            return Err(IndicatorError::InsufficientData {
                required: params.slow,
                provided: candles.len(),
            });
        }

        let mean = |n: usize| -> Decimal {
            let window = &candles[candles.len() - n..];
            window.iter().map(|c| c.volume).sum::<Decimal>() / Decimal::from(n)
        };
        let slow = mean(params.slow);
        if slow <= Decimal::ZERO {
            return Ok(1.0);
        }
        Ok((mean(params.fast) / slow).to_f64_lossy())
    }

    /// 부호 있는 모멘텀 (-100 ~ 100).
    ///
    /// `(RSI - 50) × 2`에 거래량 모멘텀 계수(0.5 ~ 1.5로 제한)를 곱합니다.
    pub fn signed_momentum(
        &self,
        candles: &[Candle],
        rsi_params: RsiParams,
        volume_params: VolumeMomentumParams,
    ) -> IndicatorResult<f64> {
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let rsi = self
            .rsi(&closes, rsi_params)?
            .last()
            .copied()
            .flatten()
            .ok_or_else(|| IndicatorError::CalculationError("RSI 값이 없습니다".to_string()))?
            .to_f64_lossy();
        let participation = self.volume_momentum(candles, volume_params)?.clamp(0.5, 1.5);

        Ok(((rsi - 50.0) * 2.0 * participation).clamp(-100.0, 100.0))
    }
}

/// EWM (Exponential Weighted Mean) 계산.
fn ewm(values: &[Decimal], alpha: Decimal, min_periods: usize) -> Vec<Option<Decimal>> {
    let one_minus_alpha = Decimal::ONE - alpha;
    let mut result = Vec::with_capacity(values.len());
    let mut value = Decimal::ZERO;

    for (i, v) in values.iter().enumerate() {
        if i + 1 < min_periods {
            result.push(None);
        } else if i + 1 == min_periods {
            // 초기 EWM은 단순 평균으로 시작
            let sum: Decimal = values[..=i].iter().sum();
            value = sum / Decimal::from(i + 1);
            result.push(Some(value));
        } else {
            value = (*v * alpha) + (value * one_minus_alpha);
            result.push(Some(value));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn sample_prices() -> Vec<Decimal> {
        vec![
            dec!(100.0),
            dec!(102.0),
            dec!(101.0),
            dec!(103.0),
            dec!(105.0),
            dec!(104.0),
            dec!(106.0),
            dec!(108.0),
            dec!(107.0),
            dec!(109.0),
            dec!(111.0),
            dec!(110.0),
            dec!(112.0),
            dec!(114.0),
            dec!(113.0),
            dec!(115.0),
        ]
    }

    fn candles_from(prices: &[Decimal], volume: impl Fn(usize) -> Decimal) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                Candle::new(
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64),
                    p,
                    p + dec!(1),
                    p - dec!(1),
                    p,
                    volume(i),
                )
            })
            .collect()
    }

    #[test]
    fn test_rsi_calculation() {
        let momentum = MomentumCalculator::new();
        let result = momentum.rsi(&sample_prices(), RsiParams { period: 14 }).unwrap();

        assert_eq!(result.len(), 16);
        assert!(result[12].is_none());
        let last = result[15].unwrap();
        // 상승 추세: RSI > 50
        assert!(last > dec!(50) && last <= dec!(100));
    }

    #[test]
    fn test_rsi_only_gains() {
        let momentum = MomentumCalculator::new();
        let prices: Vec<Decimal> = (0..20).map(|i| Decimal::from(100 + i)).collect();
        let result = momentum.rsi(&prices, RsiParams { period: 14 }).unwrap();
        assert_eq!(result[19], Some(dec!(100)));
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let momentum = MomentumCalculator::new();
        let result = momentum.rsi(&[dec!(1), dec!(2)], RsiParams { period: 14 });
        assert!(matches!(result, Err(IndicatorError::InsufficientData { .. })));
    }

    #[test]
    fn test_volume_momentum() {
        let momentum = MomentumCalculator::new();
        let prices: Vec<Decimal> = (0..20).map(|_| dec!(100)).collect();
        // 마지막 5개 캔들만 거래량 2배
        let candles = candles_from(&prices, |i| if i >= 15 { dec!(20) } else { dec!(10) });
        let ratio = momentum.volume_momentum(&candles, VolumeMomentumParams::default()).unwrap();
        assert!((ratio - 20.0 / 12.5).abs() < 1e-9);

        let silent = candles_from(&prices, |_| Decimal::ZERO);
        assert_eq!(momentum.volume_momentum(&silent, VolumeMomentumParams::default()).unwrap(), 1.0);
    }

    #[test]
    fn test_signed_momentum_sign_and_bounds() {
        let momentum = MomentumCalculator::new();
        let rising: Vec<Decimal> = (0..30).map(|i| Decimal::from(100 + i)).collect();
        let falling: Vec<Decimal> = (0..30).map(|i| Decimal::from(200 - i)).collect();

        let up = momentum
            .signed_momentum(&candles_from(&rising, |_| dec!(10)), RsiParams::default(), VolumeMomentumParams::default())
            .unwrap();
        let down = momentum
            .signed_momentum(&candles_from(&falling, |_| dec!(10)), RsiParams::default(), VolumeMomentumParams::default())
            .unwrap();

        assert!((up - 100.0).abs() < 1e-9);
        assert!((down + 100.0).abs() < 1e-9);
    }
}
