//! 분석 컴포넌트 설정.
//!
//! 모든 기본값은 문서화된 튜닝 가능 값이며 `config/default.toml`과 일치합니다.

use serde::{Deserialize, Serialize};
use sharp_core::{ConfigValidationError, TierRole, Timeframe};

// ================================================================================================
// 스윙 / 구조
// ================================================================================================

/// 스윙 포인트 탐지 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingConfig {
    /// 전후 비교 캔들 수 k (기본값: 2)
    #[serde(default = "default_swing_window")]
    pub window: usize,

    /// 보관할 최대 스윙 포인트 수 (기본값: 64)
    #[serde(default = "default_max_swings")]
    pub max_swings: usize,
}

fn default_swing_window() -> usize {
    2
}

fn default_max_swings() -> usize {
    64
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            window: default_swing_window(),
            max_swings: default_max_swings(),
        }
    }
}

impl SwingConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.window == 0 {
            return Err(ConfigValidationError::invalid("swing.window must be at least 1"));
        }
        if self.max_swings < 2 {
            return Err(ConfigValidationError::invalid("swing.max_swings must be at least 2"));
        }
        Ok(())
    }
}

/// 구조 분석 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureConfig {
    /// 돌파 없이 이 캔들 수가 지나면 추세가 RANGING으로 소멸 (0이면 비활성)
    #[serde(default)]
    pub ranging_after_bars: usize,

    /// 컨텍스트에 보관할 최근 구조 이벤트 수 (기본값: 16)
    #[serde(default = "default_recent_events")]
    pub recent_events: usize,
}

fn default_recent_events() -> usize {
    16
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            ranging_after_bars: 0,
            recent_events: default_recent_events(),
        }
    }
}

impl StructureConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.recent_events == 0 {
            return Err(ConfigValidationError::invalid(
                "structure.recent_events must be at least 1",
            ));
        }
        Ok(())
    }
}

// ================================================================================================
// 존
// ================================================================================================

/// 존 탐지 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Order Block 탐색 최대 역방향 캔들 수 (기본값: 10)
    #[serde(default = "default_order_block_lookback")]
    pub order_block_lookback: usize,

    /// 강한 이동으로 간주하는 변위 비율 (기본값: 0.02 = 2%)
    #[serde(default = "default_strong_move_pct")]
    pub strong_move_pct: f64,

    /// 거래량 평균 계산 기간 (기본값: 20)
    #[serde(default = "default_volume_period")]
    pub volume_period: usize,

    /// FVG 최소 갭 크기, 종가 대비 비율 (기본값: 0.0005 = 0.05%)
    #[serde(default = "default_fvg_min_gap_pct")]
    pub fvg_min_gap_pct: f64,

    /// 스윕으로 인정할 스윙 초과 비율 (기본값: 0.001 = 0.1%)
    #[serde(default = "default_sweep_threshold_pct")]
    pub sweep_threshold_pct: f64,

    /// Breaker Block 생성에 필요한 관통 비율 (기본값: 0.001 = 0.1%)
    #[serde(default = "default_breaker_break_pct")]
    pub breaker_break_pct: f64,

    /// 종료된 존을 보관하는 캔들 수 (기본값: 200)
    #[serde(default = "default_prune_horizon")]
    pub prune_horizon: usize,

    /// 파이프라인당 최대 존 수 (기본값: 64)
    #[serde(default = "default_max_zones")]
    pub max_zones: usize,
}

fn default_order_block_lookback() -> usize {
    10
}

fn default_strong_move_pct() -> f64 {
    0.02
}

fn default_volume_period() -> usize {
    20
}

fn default_fvg_min_gap_pct() -> f64 {
    0.0005
}

fn default_sweep_threshold_pct() -> f64 {
    0.001
}

fn default_breaker_break_pct() -> f64 {
    0.001
}

fn default_prune_horizon() -> usize {
    200
}

fn default_max_zones() -> usize {
    64
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            order_block_lookback: default_order_block_lookback(),
            strong_move_pct: default_strong_move_pct(),
            volume_period: default_volume_period(),
            fvg_min_gap_pct: default_fvg_min_gap_pct(),
            sweep_threshold_pct: default_sweep_threshold_pct(),
            breaker_break_pct: default_breaker_break_pct(),
            prune_horizon: default_prune_horizon(),
            max_zones: default_max_zones(),
        }
    }
}

impl ZoneConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.order_block_lookback == 0 {
            return Err(ConfigValidationError::invalid(
                "zones.order_block_lookback must be at least 1",
            ));
        }
        if self.strong_move_pct <= 0.0 {
            return Err(ConfigValidationError::invalid(
                "zones.strong_move_pct must be greater than 0",
            ));
        }
        if self.volume_period == 0 {
            return Err(ConfigValidationError::invalid("zones.volume_period must be at least 1"));
        }
        for (name, value) in [
            ("fvg_min_gap_pct", self.fvg_min_gap_pct),
            ("sweep_threshold_pct", self.sweep_threshold_pct),
            ("breaker_break_pct", self.breaker_break_pct),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigValidationError::invalid(format!(
                    "zones.{} must be within [0, 1)",
                    name
                )));
            }
        }
        if self.max_zones == 0 {
            return Err(ConfigValidationError::invalid("zones.max_zones must be at least 1"));
        }
        Ok(())
    }

    /// 캔들 버퍼가 보관해야 하는 최소 캔들 수.
    pub fn required_history(&self) -> usize {
        self.order_block_lookback.max(self.volume_period) + 3
    }
}

// ================================================================================================
// 멀티 타임프레임
// ================================================================================================

/// 계층 하나의 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub role: TierRole,
    pub timeframe: Timeframe,
    pub weight: f64,
}

/// 정렬 정도별 이산 배수.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierConfig {
    #[serde(default = "default_full_multiplier")]
    pub full: f64,
    #[serde(default = "default_partial_multiplier")]
    pub partial: f64,
    #[serde(default = "default_unaligned_multiplier")]
    pub unaligned: f64,
}

fn default_full_multiplier() -> f64 {
    1.0
}

fn default_partial_multiplier() -> f64 {
    0.6
}

fn default_unaligned_multiplier() -> f64 {
    0.2
}

impl Default for MultiplierConfig {
    fn default() -> Self {
        Self {
            full: default_full_multiplier(),
            partial: default_partial_multiplier(),
            unaligned: default_unaligned_multiplier(),
        }
    }
}

impl MultiplierConfig {
    /// 설정된 배수 집합.
    pub fn values(&self) -> [f64; 3] {
        [self.unaligned, self.partial, self.full]
    }
}

/// 멀티 타임프레임 집계 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceConfig {
    /// 계층 목록 (기본값: 1h 진입 0.2, 4h 확인 0.3, 1d 추세 0.5)
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,

    #[serde(default)]
    pub multipliers: MultiplierConfig,

    /// 정렬 없음 상태에서도 시그널을 억제하지 않음
    #[serde(default)]
    pub allow_unaligned: bool,
}

fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            role: TierRole::Entry,
            timeframe: Timeframe::H1,
            weight: 0.2,
        },
        TierConfig {
            role: TierRole::Confirmation,
            timeframe: Timeframe::H4,
            weight: 0.3,
        },
        TierConfig {
            role: TierRole::Trend,
            timeframe: Timeframe::D1,
            weight: 0.5,
        },
    ]
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            multipliers: MultiplierConfig::default(),
            allow_unaligned: false,
        }
    }
}

impl ConfluenceConfig {
    /// 진입 계층 설정.
    pub fn entry_tier(&self) -> Option<&TierConfig> {
        self.tiers.iter().find(|t| t.role == TierRole::Entry)
    }

    /// 타임프레임에 해당하는 계층.
    pub fn tier_for(&self, timeframe: Timeframe) -> Option<&TierConfig> {
        self.tiers.iter().find(|t| t.timeframe == timeframe)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let entry_count = self.tiers.iter().filter(|t| t.role == TierRole::Entry).count();
        if entry_count != 1 {
            return Err(ConfigValidationError::invalid(format!(
                "confluence.tiers must contain exactly one entry tier, found {}",
                entry_count
            )));
        }

        for (i, tier) in self.tiers.iter().enumerate() {
            if !(tier.weight > 0.0 && tier.weight.is_finite()) {
                return Err(ConfigValidationError::invalid(format!(
                    "confluence tier {} weight must be positive",
                    tier.timeframe
                )));
            }
            if self.tiers[..i].iter().any(|t| t.timeframe == tier.timeframe) {
                return Err(ConfigValidationError::invalid(format!(
                    "confluence tier timeframe {} is duplicated",
                    tier.timeframe
                )));
            }
        }

        let m = &self.multipliers;
        if !(0.0 <= m.unaligned && m.unaligned <= m.partial && m.partial <= m.full && m.full <= 1.0) {
            return Err(ConfigValidationError::invalid(
                "confluence multipliers must satisfy 0 <= unaligned <= partial <= full <= 1",
            ));
        }
        Ok(())
    }
}

// ================================================================================================
// 지표
// ================================================================================================

/// 기본 지표 협력자 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// ATR 기간 (기본값: 14)
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// ATR 퍼센타일 산출 구간 (기본값: 100)
    #[serde(default = "default_percentile_lookback")]
    pub percentile_lookback: usize,

    /// RSI 기간 (기본값: 14)
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// 단기 거래량 평균 기간 (기본값: 5)
    #[serde(default = "default_fast_volume_period")]
    pub fast_volume_period: usize,

    /// 장기 거래량 평균 기간 (기본값: 20)
    #[serde(default = "default_slow_volume_period")]
    pub slow_volume_period: usize,
}

fn default_atr_period() -> usize {
    14
}

fn default_percentile_lookback() -> usize {
    100
}

fn default_rsi_period() -> usize {
    14
}

fn default_fast_volume_period() -> usize {
    5
}

fn default_slow_volume_period() -> usize {
    20
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            atr_period: default_atr_period(),
            percentile_lookback: default_percentile_lookback(),
            rsi_period: default_rsi_period(),
            fast_volume_period: default_fast_volume_period(),
            slow_volume_period: default_slow_volume_period(),
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.atr_period == 0 || self.rsi_period == 0 {
            return Err(ConfigValidationError::invalid(
                "indicator periods must be at least 1",
            ));
        }
        if self.fast_volume_period == 0 || self.fast_volume_period > self.slow_volume_period {
            return Err(ConfigValidationError::invalid(
                "indicator.fast_volume_period must be within [1, slow_volume_period]",
            ));
        }
        Ok(())
    }

    /// 스냅샷 계산에 필요한 최소 캔들 수.
    pub fn min_window(&self) -> usize {
        (self.atr_period + 1)
            .max(self.rsi_period + 1)
            .max(self.slow_volume_period)
    }
}
