//! CSV 캔들 파일 로더.
//!
//! 헤더가 있는 `timestamp,open,high,low,close,volume` 형식을 읽습니다.
//! `timestamp`는 캔들 시작 시각이며 RFC3339 문자열이나 epoch 밀리초를 받습니다.
//!
//! ```text
//! timestamp,open,high,low,close,volume
//! 2024-01-01T00:00:00Z,42000.5,42150,41980,42100,153.2
//! 1704070800000,42100,42230,42050,42190,98.7
//! ```
//!
//! 순서와 중복은 검사하지 않습니다. 시퀀스 결함은 파이프라인이 판정합니다.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sharp_core::Candle;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// CSV 한 줄.
#[derive(Debug, Deserialize)]
struct CandleRecord {
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

impl CandleRecord {
    fn into_candle(self) -> Result<Candle> {
        Ok(Candle {
            timestamp: parse_timestamp(&self.timestamp)?,
            open: parse_decimal("open", &self.open)?,
            high: parse_decimal("high", &self.high)?,
            low: parse_decimal("low", &self.low)?,
            close: parse_decimal("close", &self.close)?,
            volume: parse_decimal("volume", &self.volume)?,
        })
    }
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| anyhow!("invalid {} value '{}': {}", field, raw, e))
}

/// RFC3339 또는 epoch 밀리초 타임스탬프를 파싱합니다.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| anyhow!("timestamp out of range: {}", raw));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp '{}' (expected RFC3339 or epoch ms)", raw))
}

/// 임의의 리더에서 캔들을 읽습니다. 파일 순서를 그대로 유지합니다.
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut candles = Vec::new();
    for (idx, record) in rdr.deserialize::<CandleRecord>().enumerate() {
        // 헤더가 1행
        let line = idx + 2;
        let record = record.with_context(|| format!("malformed CSV row at line {}", line))?;
        let candle = record
            .into_candle()
            .with_context(|| format!("invalid candle at line {}", line))?;
        candles.push(candle);
    }
    Ok(candles)
}

/// 파일에서 캔들을 읽습니다.
pub fn load_candles(path: &Path) -> Result<Vec<Candle>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_candles(file).with_context(|| format!("failed to parse {}", path.display()))
}

// =============================================================================
// 테스트
// =============================================================================
