//! Sharp 시그널 엔진 CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - CSV 캔들 파일 로더
//! - 다중 타임프레임 결정적 리플레이
//! - 설정 검증

pub mod commands;
