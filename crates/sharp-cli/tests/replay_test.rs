//! CSV 리플레이 통합 테스트.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sharp_cli::commands::replay::{run_replay, ReplayOptions, ReplaySummary, TierInput};
use sharp_core::{Candle, Signal, Timeframe};
use sharp_strategy::EngineConfig;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// 선형 합동 생성기 기반 랜덤 워크 1시간봉.
fn lcg_series(seed: u64, count: usize) -> Vec<Candle> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };

    let mut close = dec!(40000);
    (0..count)
        .map(|i| {
            let open = close;
            let step = (next() % 401) as i64 - 200;
            close = (open + Decimal::from(step)).max(dec!(1000));
            let high = open.max(close) + Decimal::from(next() % 60);
            let low = open.min(close) - Decimal::from(next() % 60);
            let volume = Decimal::from(50 + next() % 200);
            Candle::new(start() + Duration::hours(i as i64), open, high, low, close, volume)
        })
        .collect()
}

fn aggregate(h1: &[Candle], hours: usize) -> Vec<Candle> {
    h1.chunks_exact(hours)
        .map(|chunk| {
            let first = &chunk[0];
            let last = &chunk[chunk.len() - 1];
            Candle::new(
                first.timestamp,
                first.open,
                chunk.iter().map(|c| c.high).max().unwrap(),
                chunk.iter().map(|c| c.low).min().unwrap(),
                last.close,
                chunk.iter().map(|c| c.volume).sum(),
            )
        })
        .collect()
}

fn write_csv(path: &Path, candles: &[Candle], epoch_millis: bool) {
    let mut body = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        let ts = if epoch_millis {
            c.timestamp.timestamp_millis().to_string()
        } else {
            c.timestamp.to_rfc3339()
        };
        writeln!(body, "{},{},{},{},{},{}", ts, c.open, c.high, c.low, c.close, c.volume).unwrap();
    }
    std::fs::write(path, body).unwrap();
}

/// 1h/4h/1d 파일을 만들고 입력 목록을 돌려줍니다.
fn write_tiers(dir: &Path, h1: &[Candle], epoch_millis: bool) -> Vec<TierInput> {
    let files = [
        (Timeframe::H1, "btc_1h.csv", h1.to_vec()),
        (Timeframe::H4, "btc_4h.csv", aggregate(h1, 4)),
        (Timeframe::D1, "btc_1d.csv", aggregate(h1, 24)),
    ];
    files
        .into_iter()
        .map(|(timeframe, name, candles)| {
            let path: PathBuf = dir.join(name);
            write_csv(&path, &candles, epoch_millis);
            TierInput { timeframe, path }
        })
        .collect()
}

fn replay_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.scoring.threshold = 5.0;
    config.confluence.allow_unaligned = true;
    config
}

async fn replay(inputs: Vec<TierInput>) -> (ReplaySummary, String) {
    let options = ReplayOptions {
        symbol: Some("BTCUSDT".to_string()),
        inputs,
        progress: false,
    };
    let mut out = Vec::new();
    let summary = run_replay(replay_config(), &options, &mut out).await.unwrap();
    (summary, String::from_utf8(out).unwrap())
}

// ============================================================================
// 리플레이
// ============================================================================

#[tokio::test]
async fn test_replay_writes_json_lines_deterministically() {
    let dir = tempfile::tempdir().unwrap();
    let h1 = lcg_series(42, 24 * 90);
    let inputs = write_tiers(dir.path(), &h1, false);

    let (summary, first) = replay(inputs.clone()).await;
    let (_, second) = replay(inputs).await;

    assert_eq!(first, second);
    assert_eq!(summary.candles, 24 * 90 + 6 * 90 + 90);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.gaps, 0);

    let signals: Vec<Signal> = first
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(!signals.is_empty());
    assert_eq!(signals.len() as u64, summary.signals);
    for pair in signals.windows(2) {
        assert!(pair[0].generated_at <= pair[1].generated_at);
    }
    assert_eq!(
        summary.closed_win + summary.closed_loss + summary.invalidated + summary.open_signals,
        signals.len()
    );
}

#[tokio::test]
async fn test_epoch_millis_and_rfc3339_inputs_agree() {
    let rfc_dir = tempfile::tempdir().unwrap();
    let ms_dir = tempfile::tempdir().unwrap();
    let h1 = lcg_series(7, 24 * 30);

    let (_, rfc) = replay(write_tiers(rfc_dir.path(), &h1, false)).await;
    let (_, millis) = replay(write_tiers(ms_dir.path(), &h1, true)).await;

    assert_eq!(rfc, millis);
}

#[tokio::test]
async fn test_conflicting_duplicate_halts_tier_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let mut h1 = lcg_series(3, 24 * 10);
    h1[101].timestamp = h1[100].timestamp;
    let inputs = write_tiers(dir.path(), &h1, false);

    let (summary, _) = replay(inputs).await;

    // 결함 캔들에서 정지하고 이후 1시간봉은 모두 거부
    assert_eq!(summary.errors, h1.len() - 101);
    assert_eq!(summary.candles, 24 * 10 + 6 * 10 + 10);
}
