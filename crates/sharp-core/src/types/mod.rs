//! 엔진 전반에서 사용되는 기본 타입.

mod decimal;
mod timeframe;

pub use decimal::*;
pub use timeframe::*;
