//! 스윙 포인트 탐지.
//!
//! 캔들 `i`는 `i + k` 캔들이 마감될 때 평가됩니다.
//! - 스윙 고점: 앞 k개 고가 이상이고 뒤 k개 고가보다 엄격히 높음
//! - 스윙 저점: 대칭 규칙
//!
//! 뒤쪽 비교가 엄격하므로 같은 고가가 이어지는 구간은 가장 최근 캔들로 결정됩니다.
//! 새 캔들마다 최근 `2k + 1`개 창만 재평가합니다.
//!
//! 출력 시퀀스는 고점과 저점이 항상 번갈아 나타납니다. 같은 종류가 연속으로
//! 확정되면 더 극단적인 쪽만 남깁니다 (동률이면 나중 캔들).

use chrono::{DateTime, Utc};
use sharp_core::{Candle, Price, SwingKind, SwingPoint};
use std::collections::VecDeque;

use crate::config::SwingConfig;

/// 스윙 시퀀스 변경 내역.
#[derive(Debug, Clone, PartialEq)]
pub enum SwingUpdate {
    /// 새 스윙 포인트가 시퀀스 끝에 추가됨
    Confirmed(SwingPoint),
    /// 마지막 스윙 포인트가 같은 종류의 더 극단적인 포인트로 교체됨
    Replaced {
        previous: SwingPoint,
        current: SwingPoint,
    },
}

impl SwingUpdate {
    /// 변경 후 시퀀스 끝의 스윙 포인트.
    pub fn point(&self) -> &SwingPoint {
        match self {
            SwingUpdate::Confirmed(point) => point,
            SwingUpdate::Replaced { current, .. } => current,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bar {
    index: usize,
    timestamp: DateTime<Utc>,
    high: Price,
    low: Price,
}

/// 증분 스윙 포인트 탐지기.
#[derive(Debug, Clone)]
pub struct SwingPointDetector {
    config: SwingConfig,
    window: VecDeque<Bar>,
    swings: VecDeque<SwingPoint>,
}

impl SwingPointDetector {
    pub fn new(config: SwingConfig) -> Self {
        let capacity = config.window * 2 + 1;
        Self {
            window: VecDeque::with_capacity(capacity),
            swings: VecDeque::with_capacity(config.max_swings),
            config,
        }
    }

    /// 확정된 스윙 포인트 (오래된 순).
    pub fn swings(&self) -> impl Iterator<Item = &SwingPoint> {
        self.swings.iter()
    }

    /// 마지막 스윙 포인트.
    pub fn last(&self) -> Option<&SwingPoint> {
        self.swings.back()
    }

    /// 주어진 종류의 가장 최근 스윙 포인트.
    pub fn last_of(&self, kind: SwingKind) -> Option<&SwingPoint> {
        self.swings.iter().rev().find(|s| s.kind == kind)
    }

    /// 새로 마감된 캔들을 반영합니다.
    ///
    /// `index`는 파이프라인 전체 이력 기준 캔들 번호이며 호출마다 1씩 증가해야 합니다.
    pub fn update(&mut self, index: usize, candle: &Candle) -> Option<SwingUpdate> {
        let k = self.config.window;
        let span = 2 * k + 1;

        self.window.push_back(Bar {
            index,
            timestamp: candle.timestamp,
            high: candle.high,
            low: candle.low,
        });
        if self.window.len() > span {
            self.window.pop_front();
        }
        if self.window.len() < span {
            return None;
        }

        let candidate = self.window[k];
        let before = || self.window.iter().take(k);
        let after = || self.window.iter().skip(k + 1);

        let is_high = before().all(|b| candidate.high >= b.high)
            && after().all(|b| candidate.high > b.high);
        let is_low = before().all(|b| candidate.low <= b.low)
            && after().all(|b| candidate.low < b.low);

        let kind = match (is_high, is_low) {
            (false, false) => return None,
            (true, false) => SwingKind::High,
            (false, true) => SwingKind::Low,
            (true, true) => self
                .swings
                .back()
                .map(|s| s.kind.opposite())
                .unwrap_or(SwingKind::High),
        };

        let point = SwingPoint {
            index: candidate.index,
            timestamp: candidate.timestamp,
            price: match kind {
                SwingKind::High => candidate.high,
                SwingKind::Low => candidate.low,
            },
            kind,
        };

        self.push(point)
    }

    fn push(&mut self, point: SwingPoint) -> Option<SwingUpdate> {
        if let Some(last) = self.swings.back_mut() {
            if last.kind == point.kind {
                let more_extreme = match point.kind {
                    SwingKind::High => point.price >= last.price,
                    SwingKind::Low => point.price <= last.price,
                };
                if !more_extreme {
                    return None;
                }
                let previous = std::mem::replace(last, point.clone());
                return Some(SwingUpdate::Replaced {
                    previous,
                    current: point,
                });
            }
        }

        self.swings.push_back(point.clone());
        while self.swings.len() > self.config.max_swings {
            self.swings.pop_front();
        }
        Some(SwingUpdate::Confirmed(point))
    }
}
