//! Order Block: 임펄스성 BOS/CHoCH 직전의 마지막 반대 색 캔들.

use rust_decimal::Decimal;
use sharp_core::{BlockStatus, Candle, DecimalExt, Direction, StructureEvent, Zone, ZoneKind, ZoneTransitionError};

use super::{volume_score, ZoneDraft};
use crate::config::ZoneConfig;

/// 구조 이벤트가 발생한 캔들(`history`의 마지막)에서 Order Block을 찾습니다.
pub(crate) fn detect(
    history: &[Candle],
    event: &StructureEvent,
    config: &ZoneConfig,
    avg_volume: Decimal,
) -> Option<ZoneDraft> {
    let current = history.last()?;
    let end = history.len() - 1;
    let start = end.saturating_sub(config.order_block_lookback);

    let block = history[start..end].iter().rev().find(|c| {
        let opposite = match event.direction {
            Direction::Up => c.is_bearish(),
            Direction::Down => c.is_bullish(),
        };
        opposite && c.high > c.low
    })?;

    let mid = block.mid().to_f64_lossy();
    let move_score = if mid > 0.0 {
        let displacement = (current.close.to_f64_lossy() - mid).abs() / mid;
        (displacement / config.strong_move_pct).min(1.0)
    } else {
        0.0
    };
    let strength = (0.6 * move_score + 0.4 * volume_score(block.volume, avg_volume)).clamp(0.0, 1.0);

    Some(ZoneDraft {
        kind: ZoneKind::OrderBlock {
            status: BlockStatus::Untested,
        },
        direction: event.direction,
        price_high: block.high,
        price_low: block.low,
        strength,
        source_event: Some(event.id),
    })
}

/// 블록 계열 존(Order Block, Breaker Block)의 상태를 캔들 하나만큼 진행합니다.
///
/// 한 캔들 안에서 두 번의 합법 전이(예: Untested → Reacted → Mitigated)가
/// 순서대로 적용될 수 있습니다. 이번 캔들에서 Mitigated가 되었으면 `true`.
pub(crate) fn advance(zone: &mut Zone, candle: &Candle, index: usize) -> Result<bool, ZoneTransitionError> {
    let Some(mut status) = zone.kind.block_status() else {
        return Ok(false);
    };

    let (entered, closed_through, held) = match zone.direction {
        Direction::Up => (
            candle.low <= zone.price_high,
            candle.close < zone.price_low,
            candle.close > zone.price_high,
        ),
        Direction::Down => (
            candle.high >= zone.price_low,
            candle.close > zone.price_high,
            candle.close < zone.price_low,
        ),
    };

    if status == BlockStatus::Untested {
        if !entered {
            return Ok(false);
        }
        zone.advance_block(BlockStatus::Reacted, index)?;
        status = BlockStatus::Reacted;
    }

    match status {
        BlockStatus::Reacted if closed_through => {
            zone.advance_block(BlockStatus::Mitigated, index)?;
            Ok(true)
        }
        BlockStatus::Reacted if held => {
            zone.advance_block(BlockStatus::Active, index)?;
            Ok(false)
        }
        BlockStatus::Active if closed_through => {
            zone.advance_block(BlockStatus::Mitigated, index)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}
