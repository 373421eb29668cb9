//! 설정 검증 명령어.
//!
//! ```bash
//! sharp validate-config -c config/default.toml
//! SHARP__SCORING__THRESHOLD=75 sharp validate-config -c config/default.toml --print
//! ```

use anyhow::{Context, Result};
use sharp_strategy::EngineConfig;
use std::path::Path;

/// 설정 파일과 `SHARP__` 환경 변수를 합쳐 로드하고 검증합니다.
pub fn validate_config(path: Option<&Path>) -> Result<EngineConfig> {
    let label = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<defaults>".to_string());
    EngineConfig::load(path).with_context(|| format!("configuration {} is invalid", label))
}

/// 검증된 설정의 요약 줄.
pub fn describe(config: &EngineConfig) -> Vec<String> {
    let tiers = config
        .confluence
        .tiers
        .iter()
        .map(|t| format!("{} {:?} ({:.2})", t.timeframe, t.role, t.weight))
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        format!("심볼: {}", config.pipeline.symbols.join(", ")),
        format!("계층: {}", tiers),
        format!(
            "임계값: {:.1} (동률 허용 {:.1}, 최소 캔들 {})",
            config.scoring.threshold, config.scoring.tie_epsilon, config.pipeline.min_bars
        ),
        format!(
            "협력자: 타임아웃 {}ms, 최대 {}회 시도",
            config.collaborator.timeout_ms, config.collaborator.max_attempts
        ),
    ]
}

// =============================================================================
// 테스트
// =============================================================================
