//! 캔들 타임프레임 정의.
//!
//! 파이프라인은 (심볼, 타임프레임) 단위로 분리되며, 캔들 종료 시각 계산과
//! 상위/하위 타임프레임 정렬에 이 타입을 사용합니다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 캔들 타임프레임.
///
/// `Ord`는 기간 순서를 따르므로 상위 타임프레임이 더 큰 값입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1분봉
    #[serde(rename = "1m")]
    M1,
    /// 5분봉
    #[serde(rename = "5m")]
    M5,
    /// 15분봉
    #[serde(rename = "15m")]
    M15,
    /// 30분봉
    #[serde(rename = "30m")]
    M30,
    /// 1시간봉
    #[serde(rename = "1h")]
    H1,
    /// 4시간봉
    #[serde(rename = "4h")]
    H4,
    /// 12시간봉
    #[serde(rename = "12h")]
    H12,
    /// 일봉
    #[serde(rename = "1d")]
    D1,
    /// 주봉
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    /// 지원하는 모든 타임프레임 (짧은 순).
    pub const ALL: [Timeframe; 9] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::W1,
    ];

    /// 타임프레임의 초 단위 길이.
    pub fn as_secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::M30 => 30 * 60,
            Timeframe::H1 => 60 * 60,
            Timeframe::H4 => 4 * 60 * 60,
            Timeframe::H12 => 12 * 60 * 60,
            Timeframe::D1 => 24 * 60 * 60,
            Timeframe::W1 => 7 * 24 * 60 * 60,
        }
    }

    /// chrono 기간으로 변환합니다.
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.as_secs())
    }

    /// 주어진 시작 시각의 캔들이 마감되는 시각.
    pub fn close_time(&self, open_time: DateTime<Utc>) -> DateTime<Utc> {
        open_time + self.duration()
    }

    /// 설정 파일과 CSV에서 사용하는 라벨 ("1h", "4h", "1d").
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let tf = match normalized.as_str() {
            "1m" | "m1" => Timeframe::M1,
            "5m" | "m5" => Timeframe::M5,
            "15m" | "m15" => Timeframe::M15,
            "30m" | "m30" => Timeframe::M30,
            "1h" | "h1" | "60m" => Timeframe::H1,
            "4h" | "h4" => Timeframe::H4,
            "12h" | "h12" => Timeframe::H12,
            "1d" | "d1" | "24h" => Timeframe::D1,
            "1w" | "w1" => Timeframe::W1,
            _ => return Err(format!("알 수 없는 타임프레임: {}", s)),
        };
        Ok(tf)
    }
}
