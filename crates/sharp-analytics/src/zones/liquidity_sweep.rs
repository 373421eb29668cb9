//! Liquidity Sweep: 직전 스윙을 윅으로 넘긴 뒤 같은 캔들 또는 다음 캔들에서
//! 범위 안으로 되돌아온 종가. 방향은 윅의 반대입니다.

use rust_decimal::Decimal;
use sharp_core::{decimal_from_f64, Candle, DecimalExt, Direction, Price, SweepStatus, SwingKind, SwingPoint, Zone, ZoneKind, ZoneTransitionError};
use std::collections::HashSet;

use super::{volume_score, ZoneDraft};
use crate::config::ZoneConfig;

#[derive(Debug, Clone)]
struct PendingSweep {
    swing: SwingPoint,
    extreme: Price,
    index: usize,
}

/// 스윕 후보와 이미 스윕된 스윙을 추적합니다.
#[derive(Debug, Clone, Default)]
pub(crate) struct SweepTracker {
    pending: Option<PendingSweep>,
    swept: HashSet<(SwingKind, usize)>,
}

impl SweepTracker {
    /// 마감된 캔들을 관찰하고 확정된 스윕 존을 반환합니다.
    pub(crate) fn observe(
        &mut self,
        candle: &Candle,
        index: usize,
        swings: [Option<&SwingPoint>; 2],
        config: &ZoneConfig,
        avg_volume: Decimal,
    ) -> Vec<ZoneDraft> {
        let mut drafts = Vec::new();

        if let Some(pending) = self.pending.take() {
            self.swept.insert((pending.swing.kind, pending.swing.index));
            if pending.index + 1 == index && closed_inside(&pending.swing, candle) {
                let extreme = match pending.swing.kind {
                    SwingKind::High => pending.extreme.max(candle.high),
                    SwingKind::Low => pending.extreme.min(candle.low),
                };
                drafts.push(draft(&pending.swing, extreme, candle, avg_volume));
            }
        }

        let threshold = decimal_from_f64(config.sweep_threshold_pct).unwrap_or(Decimal::ZERO);

        for swing in swings.into_iter().flatten() {
            if swing.index >= index || self.swept.contains(&(swing.kind, swing.index)) {
                continue;
            }
            let (wicked, extreme) = match swing.kind {
                SwingKind::High => (candle.high > swing.price * (Decimal::ONE + threshold), candle.high),
                SwingKind::Low => (candle.low < swing.price * (Decimal::ONE - threshold), candle.low),
            };
            if !wicked {
                continue;
            }

            if closed_inside(swing, candle) {
                self.swept.insert((swing.kind, swing.index));
                drafts.push(draft(swing, extreme, candle, avg_volume));
            } else if self.pending.is_none() {
                self.pending = Some(PendingSweep {
                    swing: swing.clone(),
                    extreme,
                    index,
                });
            }
        }

        drafts
    }

    /// 오래된 스윕 기록을 제거합니다.
    pub(crate) fn forget_before(&mut self, index: usize) {
        self.swept.retain(|(_, swing_index)| *swing_index >= index);
    }
}

fn closed_inside(swing: &SwingPoint, candle: &Candle) -> bool {
    match swing.kind {
        SwingKind::High => candle.close < swing.price,
        SwingKind::Low => candle.close > swing.price,
    }
}

fn draft(swing: &SwingPoint, extreme: Price, candle: &Candle, avg_volume: Decimal) -> ZoneDraft {
    let (direction, low, high) = match swing.kind {
        SwingKind::High => (Direction::Down, swing.price, extreme),
        SwingKind::Low => (Direction::Up, extreme, swing.price),
    };

    let range = candle.range();
    let rejection = if range > Decimal::ZERO {
        ((extreme - candle.close).abs() / range).to_f64_lossy().clamp(0.0, 1.0)
    } else {
        0.0
    };
    let strength = (0.5 * rejection + 0.5 * volume_score(candle.volume, avg_volume)).clamp(0.0, 1.0);

    ZoneDraft {
        kind: ZoneKind::LiquiditySweep {
            status: SweepStatus::Confirmed,
            level: swing.price,
        },
        direction,
        price_high: high,
        price_low: low,
        strength,
        source_event: None,
    }
}

/// 종가가 윅 극단을 넘어서면 스윕을 무효화합니다. 이번 캔들에서 무효화되었으면 `true`.
pub(crate) fn update(zone: &mut Zone, candle: &Candle, index: usize) -> Result<bool, ZoneTransitionError> {
    if zone.is_resolved() {
        return Ok(false);
    }
    let invalidated = match zone.direction {
        Direction::Down => candle.close > zone.price_high,
        Direction::Up => candle.close < zone.price_low,
    };
    if invalidated {
        zone.invalidate_sweep(index)?;
    }
    Ok(invalidated)
}
