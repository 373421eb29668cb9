//! 엔진 전체 설정.
//!
//! [`EngineConfig`]는 모든 컴포넌트 설정을 하나로 묶으며,
//! `config/default.toml`과 `SHARP__` 환경 변수에서 로드됩니다.
//!
//! ```text
//! SHARP__SCORING__THRESHOLD=75
//! SHARP__RISK__RISK_FRACTION=0.01
//! ```

use serde::{Deserialize, Serialize};
use sharp_analytics::{ConfluenceConfig, IndicatorConfig, StructureConfig, SwingConfig, ZoneConfig};
use sharp_core::{load_layered, ConfigValidationError, LoggingConfig, SharpResult};
use sharp_risk::RiskConfig;
use std::path::Path;
use std::time::Duration;

use crate::retry::RetryPolicy;

// ================================================================================================
// 파이프라인
// ================================================================================================

/// 파이프라인 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 분석 대상 심볼 (기본값: BTCUSDT)
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// 스코어링에 필요한 최소 캔들 수 (기본값: 60)
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    /// 타임프레임별 캔들 버퍼 크기 (기본값: 500)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// 지표 협력자에 전달하는 캔들 수 (기본값: 150)
    #[serde(default = "default_indicator_window")]
    pub indicator_window: usize,

    /// 성과 원장에서 사용하는 전략 이름 (기본값: "sharp")
    #[serde(default = "default_strategy_name")]
    pub strategy_name: String,
}

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string()]
}

fn default_min_bars() -> usize {
    60
}

fn default_buffer_capacity() -> usize {
    500
}

fn default_indicator_window() -> usize {
    150
}

fn default_strategy_name() -> String {
    "sharp".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            min_bars: default_min_bars(),
            buffer_capacity: default_buffer_capacity(),
            indicator_window: default_indicator_window(),
            strategy_name: default_strategy_name(),
        }
    }
}

// ================================================================================================
// 스코어링
// ================================================================================================

/// Sharp Score 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// 구조 점수 가중치 (기본값: 0.4)
    #[serde(default = "default_structure_weight")]
    pub structure_weight: f64,

    /// 존 점수 가중치 (기본값: 0.35)
    #[serde(default = "default_zone_weight")]
    pub zone_weight: f64,

    /// 모멘텀 점수 가중치 (기본값: 0.25)
    #[serde(default = "default_momentum_weight")]
    pub momentum_weight: f64,

    /// 실행 가능 임계값 (기본값: 70)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// 매수/매도 원점수 차이가 이보다 작으면 NEUTRAL (기본값: 5.0)
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,

    /// CHoCH 기본 구조 점수 (기본값: 80)
    #[serde(default = "default_choch_base")]
    pub choch_base: f64,

    /// BOS 기본 구조 점수 (기본값: 70)
    #[serde(default = "default_bos_base")]
    pub bos_base: f64,

    /// 이벤트 강도 1.0일 때 더해지는 점수 (기본값: 20)
    #[serde(default = "default_strength_bonus")]
    pub strength_bonus: f64,

    /// 구조 점수 반감기, 캔들 수 (기본값: 24)
    #[serde(default = "default_structure_half_life")]
    pub structure_half_life: f64,

    /// 존 근접도가 0이 되는 거리, 종가 대비 비율 (기본값: 0.03 = 3%)
    #[serde(default = "default_max_zone_distance_pct")]
    pub max_zone_distance_pct: f64,

    /// degraded 시그널 점수 계수 (기본값: 0.8)
    #[serde(default = "default_degraded_confidence_factor")]
    pub degraded_confidence_factor: f64,
}

fn default_structure_weight() -> f64 {
    0.4
}

fn default_zone_weight() -> f64 {
    0.35
}

fn default_momentum_weight() -> f64 {
    0.25
}

fn default_threshold() -> f64 {
    70.0
}

fn default_tie_epsilon() -> f64 {
    5.0
}

fn default_choch_base() -> f64 {
    80.0
}

fn default_bos_base() -> f64 {
    70.0
}

fn default_strength_bonus() -> f64 {
    20.0
}

fn default_structure_half_life() -> f64 {
    24.0
}

fn default_max_zone_distance_pct() -> f64 {
    0.03
}

fn default_degraded_confidence_factor() -> f64 {
    0.8
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            structure_weight: default_structure_weight(),
            zone_weight: default_zone_weight(),
            momentum_weight: default_momentum_weight(),
            threshold: default_threshold(),
            tie_epsilon: default_tie_epsilon(),
            choch_base: default_choch_base(),
            bos_base: default_bos_base(),
            strength_bonus: default_strength_bonus(),
            structure_half_life: default_structure_half_life(),
            max_zone_distance_pct: default_max_zone_distance_pct(),
            degraded_confidence_factor: default_degraded_confidence_factor(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let weights = [self.structure_weight, self.zone_weight, self.momentum_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigValidationError::invalid(
                "scoring weights must be finite and non-negative",
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigValidationError::invalid(format!(
                "scoring weights must sum to 1.0, got {:.4}",
                sum
            )));
        }
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(ConfigValidationError::invalid(
                "scoring.threshold must be within [0, 100]",
            ));
        }
        if !(self.tie_epsilon >= 0.0) {
            return Err(ConfigValidationError::invalid(
                "scoring.tie_epsilon must be non-negative",
            ));
        }
        let bases_ok = [self.choch_base, self.bos_base, self.strength_bonus]
            .iter()
            .all(|v| (0.0..=100.0).contains(v));
        if !bases_ok {
            return Err(ConfigValidationError::invalid(
                "scoring structure bases must be within [0, 100]",
            ));
        }
        if !(self.structure_half_life > 0.0) {
            return Err(ConfigValidationError::invalid(
                "scoring.structure_half_life must be positive",
            ));
        }
        if !(self.max_zone_distance_pct > 0.0) {
            return Err(ConfigValidationError::invalid(
                "scoring.max_zone_distance_pct must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.degraded_confidence_factor) {
            return Err(ConfigValidationError::invalid(
                "scoring.degraded_confidence_factor must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

// ================================================================================================
// 협력자 / 추적
// ================================================================================================

/// 외부 협력자 호출 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    /// 시도당 타임아웃 (기본값: 2000ms)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// 사이클당 최대 시도 횟수 (기본값: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 첫 재시도 대기 (기본값: 100ms, 매 시도 2배)
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// 재시도 대기 상한 (기본값: 1000ms)
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// 백필 시 요청하는 캔들 수 (기본값: 500)
    #[serde(default = "default_backfill_limit")]
    pub backfill_limit: usize,
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_initial_ms() -> u64 {
    100
}

fn default_backoff_max_ms() -> u64 {
    1000
}

fn default_backfill_limit() -> usize {
    500
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            backfill_limit: default_backfill_limit(),
        }
    }
}

impl CollaboratorConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.timeout_ms == 0 {
            return Err(ConfigValidationError::invalid(
                "collaborator.timeout_ms must be greater than 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigValidationError::invalid(
                "collaborator.max_attempts must be at least 1",
            ));
        }
        if self.backoff_initial_ms > self.backoff_max_ms {
            return Err(ConfigValidationError::invalid(
                "collaborator.backoff_initial_ms must not exceed backoff_max_ms",
            ));
        }
        Ok(())
    }

    /// 재시도 정책으로 변환합니다.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.backoff_initial_ms),
            max_backoff: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

/// 시그널 추적 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// 보관할 종료 시그널 수 (기본값: 1000)
    #[serde(default = "default_archive_capacity")]
    pub archive_capacity: usize,

    /// 종료된 시그널의 R 결과를 성과 원장에 기록 (기본값: true)
    #[serde(default = "default_true")]
    pub record_outcomes: bool,
}

fn default_archive_capacity() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            archive_capacity: default_archive_capacity(),
            record_outcomes: true,
        }
    }
}

// ================================================================================================
// 엔진
// ================================================================================================

/// 엔진 설정.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub swing: SwingConfig,
    #[serde(default)]
    pub structure: StructureConfig,
    #[serde(default)]
    pub zones: ZoneConfig,
    #[serde(default)]
    pub confluence: ConfluenceConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub collaborator: CollaboratorConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// 파일(선택)과 환경 변수에서 설정을 로드하고 검증합니다.
    pub fn load(path: Option<&Path>) -> SharpResult<Self> {
        let config: EngineConfig = load_layered(path)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열로 직렬화합니다.
    pub fn to_toml(&self) -> SharpResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| sharp_core::SharpError::Serialization(e.to_string()))
    }

    /// 모든 섹션을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let pipeline = &self.pipeline;
        if pipeline.symbols.is_empty() {
            return Err(ConfigValidationError::MissingField("pipeline.symbols".into()));
        }
        if pipeline.min_bars == 0 {
            return Err(ConfigValidationError::invalid(
                "pipeline.min_bars must be at least 1",
            ));
        }
        let required = pipeline
            .min_bars
            .max(pipeline.indicator_window)
            .max(self.zones.required_history());
        if pipeline.buffer_capacity < required {
            return Err(ConfigValidationError::invalid(format!(
                "pipeline.buffer_capacity must be at least {}",
                required
            )));
        }
        if pipeline.indicator_window < self.indicator.min_window() {
            return Err(ConfigValidationError::invalid(format!(
                "pipeline.indicator_window must be at least {}",
                self.indicator.min_window()
            )));
        }

        self.swing.validate()?;
        self.structure.validate()?;
        self.zones.validate()?;
        self.confluence.validate()?;
        self.indicator.validate()?;
        self.scoring.validate()?;
        self.risk.validate()?;
        self.collaborator.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
