//! 멀티 타임프레임 바이어스 집계.
//!
//! 계층별(진입/확인/추세) 추세 바이어스를 가중 합산하고, 후보 시그널 방향과의
//! 정렬 정도에 따라 이산 배수(full/partial/unaligned)를 결정합니다.

use sharp_core::{Alignment, Bias, ConfluenceResult, Direction, TierBias, TimeframeContext};
use tracing::trace;

use crate::config::ConfluenceConfig;

/// 멀티 타임프레임 집계기.
#[derive(Debug, Clone)]
pub struct MultiTimeframeAggregator {
    config: ConfluenceConfig,
    min_bars: usize,
}

impl MultiTimeframeAggregator {
    /// `min_bars`보다 캔들이 적은 계층은 중립으로 처리됩니다.
    pub fn new(config: ConfluenceConfig, min_bars: usize) -> Self {
        Self { config, min_bars }
    }

    pub fn config(&self) -> &ConfluenceConfig {
        &self.config
    }

    /// 계층별 바이어스를 산출합니다. 설정된 계층 순서를 따릅니다.
    pub fn tier_biases(&self, contexts: &[TimeframeContext]) -> Vec<TierBias> {
        self.config
            .tiers
            .iter()
            .map(|tier| {
                let ctx = contexts.iter().find(|c| c.timeframe == tier.timeframe);
                let insufficient = ctx.map_or(true, |c| c.bar_count < self.min_bars);
                TierBias {
                    role: tier.role,
                    timeframe: tier.timeframe,
                    bias: match ctx {
                        Some(c) if !insufficient => c.bias(),
                        _ => Bias::Neutral,
                    },
                    weight: tier.weight,
                    insufficient_history: insufficient,
                }
            })
            .collect()
    }

    /// 후보 방향에 대한 정렬 결과를 계산합니다.
    pub fn evaluate(&self, candidate: Direction, contexts: &[TimeframeContext]) -> ConfluenceResult {
        let biases = self.tier_biases(contexts);

        let total_weight: f64 = biases.iter().map(|b| b.weight).sum();
        let agreeing_weight: f64 = biases
            .iter()
            .filter(|b| b.bias.agrees_with(candidate))
            .map(|b| b.weight)
            .sum();

        let alignment = if !biases.is_empty() && biases.iter().all(|b| b.bias.agrees_with(candidate)) {
            Alignment::Full
        } else if total_weight > 0.0 && agreeing_weight > total_weight / 2.0 {
            Alignment::Partial
        } else {
            Alignment::Unaligned
        };

        let multipliers = &self.config.multipliers;
        let multiplier = match alignment {
            Alignment::Full => multipliers.full,
            Alignment::Partial => multipliers.partial,
            Alignment::Unaligned => multipliers.unaligned,
        };

        let weighted_bias = if total_weight > 0.0 {
            (biases.iter().map(|b| b.weight * b.bias.sign()).sum::<f64>() / total_weight).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let suppressed = alignment == Alignment::Unaligned && !self.config.allow_unaligned;

        let mut agreeing: Vec<&TierBias> = biases.iter().filter(|b| b.bias.agrees_with(candidate)).collect();
        agreeing.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        let mut dominant_factors: Vec<String> = agreeing
            .iter()
            .map(|b| format!("{} {} {}", b.timeframe, b.role, candidate))
            .collect();
        dominant_factors.extend(
            biases
                .iter()
                .filter(|b| b.insufficient_history)
                .map(|b| format!("{} {} insufficient history", b.timeframe, b.role)),
        );

        trace!(
            candidate = %candidate,
            ?alignment,
            multiplier,
            weighted_bias,
            suppressed,
            "멀티 타임프레임 집계"
        );

        ConfluenceResult {
            candidate,
            biases,
            alignment,
            multiplier,
            weighted_bias,
            suppressed,
            dominant_factors,
        }
    }
}
