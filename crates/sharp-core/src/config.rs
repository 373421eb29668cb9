//! 설정 로딩 공통 기능.
//!
//! 각 컴포넌트 크레이트는 자체 설정 구조체를 정의하고, 이 모듈의
//! [`load_layered`]로 TOML 파일 + 환경 변수 오버라이드를 합성합니다.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::logging::{LogConfig, LogFormat};

/// 환경 변수 오버라이드 접두사 (`SHARP__SCORING__THRESHOLD=75`).
pub const ENV_PREFIX: &str = "SHARP";

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 설정 검증 오류.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("잘못된 설정 값: {0}")]
    InvalidValue(String),

    #[error("필수 필드 누락: {0}")]
    MissingField(String),
}

impl ConfigValidationError {
    /// 값 범위 오류 헬퍼.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }
}

/// 로깅 설정 (설정 파일 섹션).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨 필터 (예: "info", "sharp_strategy=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// 파일명/줄 번호 포함 여부
    #[serde(default)]
    pub with_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            with_file: false,
        }
    }
}

impl LoggingConfig {
    /// 설정 값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.format
            .parse::<LogFormat>()
            .map(|_| ())
            .map_err(ConfigValidationError::InvalidValue)
    }

    /// 로깅 초기화용 [`LogConfig`]로 변환합니다.
    pub fn to_log_config(&self) -> LogConfig {
        let format = self.format.parse().unwrap_or_default();
        let mut config = LogConfig::new(self.level.clone()).with_format(format);
        config.with_file = self.with_file;
        config
    }
}

/// 파일(선택)과 `SHARP__` 환경 변수에서 설정을 로드합니다.
///
/// 파일이 없으면 구조체의 serde 기본값과 환경 변수만 사용합니다.
pub fn load_layered<T: DeserializeOwned>(path: Option<&Path>) -> Result<T, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let config = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
