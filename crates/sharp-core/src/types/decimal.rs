//! 가격/수량 계산을 위한 Decimal 유틸리티.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 포지션 수량 타입.
pub type Quantity = Decimal;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 단위(step)의 배수로 내림합니다. step이 0 이하이면 값을 그대로 반환합니다.
    fn floor_to_step(&self, step: Decimal) -> Decimal;

    /// 스코어 계산용 f64 변환. 표현할 수 없으면 0.0.
    fn to_f64_lossy(&self) -> f64;

    /// 지정된 소수점 자릿수로 반올림합니다 (0.5는 0에서 멀어지는 방향).
    fn round_price(&self, dp: u32) -> Decimal;
}

impl DecimalExt for Decimal {
    fn floor_to_step(&self, step: Decimal) -> Decimal {
        if step <= Decimal::ZERO {
            return *self;
        }
        (*self / step).floor() * step
    }

    fn to_f64_lossy(&self) -> f64 {
        self.to_f64().unwrap_or(0.0)
    }

    fn round_price(&self, dp: u32) -> Decimal {
        self.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// 유한한 f64를 Decimal로 변환합니다. NaN/무한대는 `None`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
}
