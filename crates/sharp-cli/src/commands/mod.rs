//! CLI 명령어 구현 모듈.

pub mod candles;
pub mod replay;
pub mod validate;
