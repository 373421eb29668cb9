//! 스윙 포인트, 구조 이벤트, 추세 상태.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Price, Timeframe};

/// 가격 진행 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// 반대 방향.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// 상승 +1.0, 하락 -1.0.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// 타임프레임별 방향성 바이어스.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Up,
    Down,
    Neutral,
}

impl Bias {
    /// 바이어스의 부호 (중립은 0.0).
    pub fn sign(self) -> f64 {
        match self {
            Bias::Up => 1.0,
            Bias::Down => -1.0,
            Bias::Neutral => 0.0,
        }
    }

    /// 주어진 방향과 일치하는지 확인합니다.
    pub fn agrees_with(self, direction: Direction) -> bool {
        self == Bias::from(direction)
    }
}

impl From<Direction> for Bias {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => Bias::Up,
            Direction::Down => Bias::Down,
        }
    }
}

/// 스윙 포인트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwingKind {
    High,
    Low,
}

impl SwingKind {
    /// 반대 종류.
    pub fn opposite(self) -> Self {
        match self {
            SwingKind::High => SwingKind::Low,
            SwingKind::Low => SwingKind::High,
        }
    }
}

/// 확정된 스윙 포인트 (국지적 고점/저점).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingPoint {
    /// 파이프라인 내 캔들 인덱스 (0부터, 전체 이력 기준)
    pub index: usize,
    /// 해당 캔들 시작 시각
    pub timestamp: DateTime<Utc>,
    /// 고점이면 고가, 저점이면 저가
    pub price: Price,
    /// 종류
    pub kind: SwingKind,
}

/// 추세 상태 머신의 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendState {
    /// 아직 확정된 돌파가 없음
    #[default]
    Undefined,
    Uptrend,
    Downtrend,
    /// 일정 기간 돌파가 없어 방향성이 소멸됨
    Ranging,
}

impl TrendState {
    /// 외부에 보고되는 상태. UNDEFINED는 RANGING으로 보고됩니다.
    pub fn reported(self) -> Self {
        match self {
            TrendState::Undefined => TrendState::Ranging,
            other => other,
        }
    }

    /// 추세 방향 (방향성이 없으면 `None`).
    pub fn direction(self) -> Option<Direction> {
        match self {
            TrendState::Uptrend => Some(Direction::Up),
            TrendState::Downtrend => Some(Direction::Down),
            TrendState::Undefined | TrendState::Ranging => None,
        }
    }

    /// 방향으로부터 추세 상태를 만듭니다.
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Up => TrendState::Uptrend,
            Direction::Down => TrendState::Downtrend,
        }
    }

    /// 타임프레임 바이어스.
    pub fn bias(self) -> Bias {
        self.direction().map(Bias::from).unwrap_or(Bias::Neutral)
    }
}

/// 구조 이벤트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    /// Break of Structure: 추세 지속
    #[serde(rename = "BOS")]
    Bos,
    /// Change of Character: 추세 전환
    #[serde(rename = "CHOCH")]
    Choch,
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureKind::Bos => write!(f, "BOS"),
            StructureKind::Choch => write!(f, "CHoCH"),
        }
    }
}

/// BOS/CHoCH 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureEvent {
    /// 파이프라인 내 단조 증가 시퀀스 (중복 제거 키)
    pub id: u64,
    pub kind: StructureKind,
    pub direction: Direction,
    /// 돌파된 스윙 가격
    pub price: Price,
    /// 돌파를 만든 종가
    pub close_price: Price,
    /// 돌파된 스윙 포인트의 캔들 인덱스
    pub swing_index: usize,
    pub timeframe: Timeframe,
    /// 돌파 캔들 인덱스
    pub index: usize,
    /// 돌파 캔들 시작 시각
    pub timestamp: DateTime<Utc>,
    /// 돌파 강도 (0.0 ~ 1.0)
    pub strength: f64,
}
