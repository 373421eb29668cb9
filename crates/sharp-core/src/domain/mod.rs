//! 도메인 모델.

mod candle;
mod collaborators;
mod context;
mod risk_plan;
mod signal;
mod structure;
mod zone;

pub use candle::*;
pub use collaborators::*;
pub use context::*;
pub use risk_plan::*;
pub use signal::*;
pub use structure::*;
pub use zone::*;
