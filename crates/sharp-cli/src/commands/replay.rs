//! 리플레이 명령어.
//!
//! 타임프레임별 CSV 캔들 파일을 마감 시각 순서로 병합해 엔진에 공급하고,
//! 발행된 시그널을 JSON Lines로 기록합니다. 같은 입력과 설정이면 항상 같은
//! 출력이 나옵니다.
//!
//! # 사용 예시
//!
//! ```bash
//! # 1시간봉/4시간봉/일봉으로 BTCUSDT 리플레이
//! sharp replay -s BTCUSDT -d 1h=data/btc_1h.csv -d 4h=data/btc_4h.csv -d 1d=data/btc_1d.csv
//!
//! # 시그널을 파일로 저장
//! sharp replay -c config/default.toml -d 1h=data/btc_1h.csv -o signals.jsonl
//! ```

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use sharp_analytics::{CandleIndicatorProvider, PerformanceLedger, TimeframeAligner};
use sharp_core::{
    Candle, PerformanceProvider, PerformanceStats, SharpError, SignalState, Timeframe,
};
use sharp_strategy::{CandleEvent, Collaborators, EngineConfig, LoggingSink, SignalEngine};
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::commands::candles::load_candles;

/// `<timeframe>=<path>` 형식의 타임프레임 입력 파일.
#[derive(Debug, Clone, PartialEq)]
pub struct TierInput {
    pub timeframe: Timeframe,
    pub path: PathBuf,
}

impl FromStr for TierInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tf, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <timeframe>=<path>, got '{}'", s))?;
        let path = path.trim();
        if path.is_empty() {
            return Err(format!("missing path for timeframe '{}'", tf));
        }
        Ok(Self {
            timeframe: tf.parse()?,
            path: PathBuf::from(path),
        })
    }
}

/// 리플레이 옵션.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// 리플레이할 심볼 (없으면 설정의 첫 번째 심볼)
    pub symbol: Option<String>,
    /// 타임프레임별 입력 파일
    pub inputs: Vec<TierInput>,
    /// 진행률 표시 여부
    pub progress: bool,
}

/// 리플레이 결과 요약.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    pub symbol: String,
    /// 병합된 전체 캔들 수
    pub candles: usize,
    pub reruns: u64,
    pub signals: u64,
    pub degraded: u64,
    pub duplicates: u64,
    pub closed_win: usize,
    pub closed_loss: usize,
    pub invalidated: usize,
    /// 종료 시그널의 R 합계 (리스크 플랜이 있는 것만)
    pub total_r: f64,
    /// 데이터 부족 외 에러 수 (시퀀스 결함, 정지된 파이프라인)
    pub errors: usize,
    /// 입력 파일에서 발견된 누락 구간 수
    pub gaps: usize,
    pub open_signals: usize,
    pub performance: Option<PerformanceStats>,
}

impl ReplaySummary {
    /// 사람이 읽는 요약을 씁니다.
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "\n📊 리플레이 결과: {}", self.symbol)?;
        writeln!(w, "캔들: {} (재전송 {})", self.candles, self.reruns)?;
        writeln!(
            w,
            "시그널: {} (degraded {}, 중복 건너뜀 {})",
            self.signals, self.degraded, self.duplicates
        )?;
        writeln!(
            w,
            "종료: 익절 {} / 손절 {} / 무효화 {} (미결 {})",
            self.closed_win, self.closed_loss, self.invalidated, self.open_signals
        )?;
        writeln!(w, "누적 R: {:+.2}", self.total_r)?;
        if let Some(stats) = &self.performance {
            writeln!(
                w,
                "승률: {:.1}% (표본 {}, 평균 익절 {:.2}R, 평균 손절 {:.2}R)",
                stats.win_rate * 100.0,
                stats.sample_size,
                stats.avg_win_r,
                stats.avg_loss_r
            )?;
        }
        if self.gaps > 0 {
            writeln!(w, "⚠️  누락 구간: {}", self.gaps)?;
        }
        if self.errors > 0 {
            writeln!(w, "⚠️  에러: {}", self.errors)?;
        }
        Ok(())
    }
}

/// 연속된 캔들 사이에 한 봉 이상 비어 있는 구간 수.
///
/// 누락은 에러가 아닙니다. 파이프라인은 다음 캔들을 그대로 이어 붙입니다.
pub fn count_gaps(candles: &[Candle], timeframe: Timeframe) -> usize {
    candles
        .windows(2)
        .filter(|pair| {
            TimeframeAligner::count_candles_between(pair[0].timestamp, pair[1].timestamp, timeframe) > 1
        })
        .count()
}

/// 리플레이를 실행하고 발행된 시그널을 `out`에 JSON Lines로 씁니다.
pub async fn run_replay<W: Write>(
    mut config: EngineConfig,
    options: &ReplayOptions,
    out: &mut W,
) -> Result<ReplaySummary> {
    if options.inputs.is_empty() {
        bail!("at least one --data <timeframe>=<path> input is required");
    }

    let symbol = match &options.symbol {
        Some(symbol) => symbol.clone(),
        None => config
            .pipeline
            .symbols
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("no symbol configured"))?,
    };
    config.pipeline.symbols = vec![symbol.clone()];

    let mut series = Vec::with_capacity(options.inputs.len());
    let mut total_gaps = 0;
    for input in &options.inputs {
        if config.confluence.tier_for(input.timeframe).is_none() {
            bail!(
                "timeframe {} is not a configured confluence tier",
                input.timeframe
            );
        }
        if series.iter().any(|(tf, _)| *tf == input.timeframe) {
            bail!("duplicate input for timeframe {}", input.timeframe);
        }
        let candles = load_candles(&input.path)?;
        let gaps = count_gaps(&candles, input.timeframe);
        info!(
            timeframe = %input.timeframe,
            path = %input.path.display(),
            count = candles.len(),
            gaps,
            "캔들 파일 로드"
        );
        total_gaps += gaps;
        series.push((input.timeframe, candles));
    }
    for tier in &config.confluence.tiers {
        if !series.iter().any(|(tf, _)| *tf == tier.timeframe) {
            warn!(timeframe = %tier.timeframe, "입력 파일 없음, 해당 계층은 중립으로 집계됩니다");
        }
    }

    let merged = TimeframeAligner::merge(series);
    let strategy = config.pipeline.strategy_name.clone();
    let ledger = PerformanceLedger::default();
    let collaborators =
        Collaborators::new(Arc::new(CandleIndicatorProvider::new(config.indicator.clone())))
            .with_performance(Arc::new(ledger.clone()))
            .with_sink(Arc::new(LoggingSink));
    let mut engine = SignalEngine::new(config, collaborators).context("invalid engine config")?;

    let pb = if options.progress {
        let pb = ProgressBar::new(merged.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )?
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut summary = ReplaySummary {
        symbol: symbol.clone(),
        candles: merged.len(),
        gaps: total_gaps,
        ..Default::default()
    };

    for timed in merged {
        let event = CandleEvent::new(symbol.as_str(), timed.timeframe, timed.candle);
        match engine.on_candle(event).await {
            Ok(report) => {
                if let Some(signal) = &report.emitted {
                    serde_json::to_writer(&mut *out, signal)?;
                    writeln!(out)?;
                }
                for closed in &report.closed {
                    match closed.signal.state {
                        SignalState::ClosedWin => summary.closed_win += 1,
                        SignalState::ClosedLoss => summary.closed_loss += 1,
                        SignalState::Invalidated => summary.invalidated += 1,
                        _ => {}
                    }
                    summary.total_r += closed.r_multiple.unwrap_or(0.0);
                }
            }
            Err(SharpError::DataInsufficient { .. }) => {}
            Err(e @ SharpError::PipelineHalted { .. }) => {
                summary.errors += 1;
                debug!(error = %e, "정지된 파이프라인 캔들 건너뜀");
            }
            Err(e) => {
                summary.errors += 1;
                warn!(error = %e, timeframe = %timed.timeframe, "캔들 처리 실패");
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Replay completed");
    out.flush()?;

    if let Some(symbol_engine) = engine.symbol(&symbol) {
        let stats = symbol_engine.stats();
        summary.reruns = stats.reruns;
        summary.signals = stats.signals_emitted;
        summary.degraded = stats.degraded_signals;
        summary.duplicates = stats.duplicates_skipped;
        summary.open_signals = symbol_engine.tracker().open_signals().len();
    }
    summary.performance = ledger
        .stats(&symbol, &strategy)
        .await
        .map_err(|e| anyhow!("performance ledger: {}", e))?;

    info!(
        symbol = %summary.symbol,
        candles = summary.candles,
        signals = summary.signals,
        "리플레이 완료"
    );
    Ok(summary)
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_input_parsing() {
        let input: TierInput = "4h=data/btc_4h.csv".parse().unwrap();
        assert_eq!(input.timeframe, Timeframe::H4);
        assert_eq!(input.path, PathBuf::from("data/btc_4h.csv"));

        assert!("data/btc_4h.csv".parse::<TierInput>().is_err());
        assert!("4h=".parse::<TierInput>().is_err());
        assert!("7x=data.csv".parse::<TierInput>().is_err());
    }

    #[test]
    fn test_count_gaps() {
        use chrono::{Duration, TimeZone, Utc};
        use rust_decimal_macros::dec;

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles: Vec<Candle> = [0, 1, 2, 5, 6, 9]
            .iter()
            .map(|h| {
                Candle::new(
                    start + Duration::hours(*h),
                    dec!(100),
                    dec!(101),
                    dec!(99),
                    dec!(100),
                    dec!(1),
                )
            })
            .collect();

        assert_eq!(count_gaps(&candles, Timeframe::H1), 2);
        assert_eq!(count_gaps(&candles[..3], Timeframe::H1), 0);
        assert_eq!(count_gaps(&[], Timeframe::H1), 0);
    }

    #[tokio::test]
    async fn test_replay_requires_input() {
        let mut out = Vec::new();
        let err = run_replay(EngineConfig::default(), &ReplayOptions::default(), &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--data"));
    }

    #[tokio::test]
    async fn test_unconfigured_timeframe_is_rejected() {
        let options = ReplayOptions {
            inputs: vec!["15m=missing.csv".parse().unwrap()],
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = run_replay(EngineConfig::default(), &options, &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("15m"));
    }
}
