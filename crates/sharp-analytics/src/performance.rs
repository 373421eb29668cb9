//! 종료된 시그널의 R 결과를 누적하는 인메모리 성과 원장.
//!
//! Kelly 사이징의 입력(승률, 평균 R)을 제공합니다. 심볼/전략별로 최근
//! `capacity`개 결과만 유지합니다.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use sharp_core::{CollaboratorError, PerformanceProvider, PerformanceStats};
use tokio::sync::RwLock;
use tracing::debug;

/// 기본 보관 결과 수.
pub const DEFAULT_LEDGER_CAPACITY: usize = 500;

type LedgerKey = (String, String);

/// 인메모리 성과 원장. 복제본은 같은 저장소를 공유합니다.
#[derive(Debug, Clone)]
pub struct PerformanceLedger {
    outcomes: Arc<RwLock<HashMap<LedgerKey, VecDeque<f64>>>>,
    capacity: usize,
}

impl Default for PerformanceLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

impl PerformanceLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            outcomes: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// 기록된 R 결과로부터 통계를 계산합니다.
    fn summarize(outcomes: &VecDeque<f64>) -> Option<PerformanceStats> {
        if outcomes.is_empty() {
            return None;
        }
        let (wins, losses): (Vec<f64>, Vec<f64>) = outcomes.iter().partition(|&&r| r > 0.0);
        let mean = |values: &[f64]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };

        Some(PerformanceStats {
            win_rate: wins.len() as f64 / outcomes.len() as f64,
            avg_win_r: mean(&wins),
            avg_loss_r: mean(&losses).abs(),
            sample_size: outcomes.len(),
        })
    }
}

#[async_trait]
impl PerformanceProvider for PerformanceLedger {
    async fn stats(
        &self,
        symbol: &str,
        strategy: &str,
    ) -> Result<Option<PerformanceStats>, CollaboratorError> {
        let outcomes = self.outcomes.read().await;
        Ok(outcomes
            .get(&(symbol.to_string(), strategy.to_string()))
            .and_then(Self::summarize))
    }

    async fn record_outcome(
        &self,
        symbol: &str,
        strategy: &str,
        r_multiple: f64,
    ) -> Result<(), CollaboratorError> {
        if !r_multiple.is_finite() {
            return Err(CollaboratorError::InvalidResponse(format!(
                "R 결과가 유한하지 않습니다: {}",
                r_multiple
            )));
        }
        let mut outcomes = self.outcomes.write().await;
        let entry = outcomes
            .entry((symbol.to_string(), strategy.to_string()))
            .or_default();
        entry.push_back(r_multiple);
        while entry.len() > self.capacity {
            entry.pop_front();
        }
        debug!(symbol, strategy, r_multiple, samples = entry.len(), "성과 기록");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_ledger_has_no_stats() {
        let ledger = PerformanceLedger::default();
        assert!(ledger.stats("BTCUSDT", "smc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_from_outcomes() {
        let ledger = PerformanceLedger::default();
        for r in [2.0, -1.0, 3.0, -1.0] {
            ledger.record_outcome("BTCUSDT", "smc", r).await.unwrap();
        }
        let stats = ledger.stats("BTCUSDT", "smc").await.unwrap().unwrap();

        assert_eq!(stats.sample_size, 4);
        assert!((stats.win_rate - 0.5).abs() < 1e-9);
        assert!((stats.avg_win_r - 2.5).abs() < 1e-9);
        assert!((stats.avg_loss_r - 1.0).abs() < 1e-9);

        // 다른 심볼과 분리
        assert!(ledger.stats("ETHUSDT", "smc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_keeps_recent() {
        let ledger = PerformanceLedger::new(3);
        for r in [-1.0, -1.0, 1.0, 1.0, 1.0] {
            ledger.record_outcome("BTCUSDT", "smc", r).await.unwrap();
        }
        let stats = ledger.stats("BTCUSDT", "smc").await.unwrap().unwrap();
        assert_eq!(stats.sample_size, 3);
        assert_eq!(stats.win_rate, 1.0);
    }

    #[tokio::test]
    async fn test_rejects_non_finite() {
        let ledger = PerformanceLedger::default();
        assert!(ledger.record_outcome("BTCUSDT", "smc", f64::NAN).await.is_err());
    }
}
