//! 발행된 시그널의 수명주기 추적.
//!
//! 진입 타임프레임 캔들 마감마다 추적 중인 시그널을 검사합니다.
//! 매수 기준으로 저가가 손절가에 닿으면 손실(먼저 검사), 고가가 TP1에 닿으면
//! 수익으로 종료합니다. 반대 방향 CHoCH가 발생하면 무효화합니다.
//! 종료된 시그널은 크기가 제한된 보관소로 이동합니다.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use sharp_core::{
    Candle, DecimalExt, Direction, SharpResult, Signal, SignalState, StructureEvent,
    StructureKind, Timeframe,
};
use tracing::{debug, info};

/// 종료된 시그널과 R 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSignal {
    pub signal: Signal,
    /// 손익을 R 단위로 환산한 값 (손실은 음수). 리스크 플랜이 없으면 `None`.
    pub r_multiple: Option<f64>,
}

/// 시그널 추적기.
#[derive(Debug, Clone)]
pub struct SignalTracker {
    open: Vec<Signal>,
    archive: VecDeque<Signal>,
    archive_capacity: usize,
}

impl SignalTracker {
    pub fn new(archive_capacity: usize) -> Self {
        Self {
            open: Vec::new(),
            archive: VecDeque::with_capacity(archive_capacity.min(1024)),
            archive_capacity: archive_capacity.max(1),
        }
    }

    /// 시그널 추적을 시작합니다 (`Tracked`로 전이).
    pub fn track(&mut self, mut signal: Signal) -> SharpResult<Signal> {
        signal.transition(SignalState::Tracked)?;
        debug!(signal_id = %signal.id, symbol = %signal.symbol, "시그널 추적 시작");
        self.open.push(signal.clone());
        Ok(signal)
    }

    /// 추적 중인 시그널.
    pub fn open_signals(&self) -> &[Signal] {
        &self.open
    }

    /// 종료된 시그널 (오래된 순).
    pub fn archived(&self) -> impl Iterator<Item = &Signal> {
        self.archive.iter()
    }

    /// 마감된 캔들로 추적 중인 시그널을 검사합니다.
    ///
    /// `timeframe`과 같은 타임프레임에서 생성된 시그널만 대상입니다.
    pub fn on_candle(
        &mut self,
        timeframe: Timeframe,
        candle: &Candle,
        event: Option<&StructureEvent>,
    ) -> SharpResult<Vec<ClosedSignal>> {
        let mut closed = Vec::new();
        let mut still_open = Vec::with_capacity(self.open.len());

        let mut pending = std::mem::take(&mut self.open).into_iter();
        while let Some(mut signal) = pending.next() {
            if signal.timeframe != timeframe {
                still_open.push(signal);
                continue;
            }
            let Some(direction) = signal.direction.direction() else {
                still_open.push(signal);
                continue;
            };

            match Self::resolve(&signal, direction, candle, event) {
                Some((state, r_multiple)) => {
                    if let Err(err) = signal.transition(state) {
                        // 처리하지 못한 시그널은 추적 목록에 남깁니다
                        still_open.push(signal);
                        still_open.extend(pending);
                        self.open = still_open;
                        return Err(err);
                    }
                    info!(
                        signal_id = %signal.id,
                        symbol = %signal.symbol,
                        state = %signal.state,
                        r_multiple = ?r_multiple,
                        "시그널 종료"
                    );
                    closed.push(ClosedSignal {
                        signal: signal.clone(),
                        r_multiple,
                    });
                    self.archive(signal);
                }
                None => still_open.push(signal),
            }
        }

        self.open = still_open;
        Ok(closed)
    }

    fn resolve(
        signal: &Signal,
        direction: Direction,
        candle: &Candle,
        event: Option<&StructureEvent>,
    ) -> Option<(SignalState, Option<f64>)> {
        if let Some(plan) = &signal.risk_plan {
            let stop_hit = match direction {
                Direction::Up => candle.low <= plan.stop_loss,
                Direction::Down => candle.high >= plan.stop_loss,
            };
            if stop_hit {
                return Some((SignalState::ClosedLoss, Some(-1.0)));
            }

            if let Some(tp1) = plan.take_profits.first() {
                let target_hit = match direction {
                    Direction::Up => candle.high >= tp1.price,
                    Direction::Down => candle.low <= tp1.price,
                };
                if target_hit {
                    return Some((SignalState::ClosedWin, Some(tp1.r_multiple.to_f64_lossy())));
                }
            }
        }

        let reversed = event
            .is_some_and(|e| e.kind == StructureKind::Choch && e.direction == direction.opposite());
        if reversed {
            let r = signal.risk_plan.as_ref().and_then(|plan| {
                if plan.stop_distance <= Decimal::ZERO {
                    return None;
                }
                let pnl = match direction {
                    Direction::Up => candle.close - plan.entry_price,
                    Direction::Down => plan.entry_price - candle.close,
                };
                Some((pnl / plan.stop_distance).round_price(2).to_f64_lossy())
            });
            return Some((SignalState::Invalidated, r));
        }

        None
    }

    fn archive(&mut self, signal: Signal) {
        if self.archive.len() >= self.archive_capacity {
            self.archive.pop_front();
        }
        self.archive.push_back(signal);
    }
}

// =============================================================================
// 테스트
// =============================================================================
