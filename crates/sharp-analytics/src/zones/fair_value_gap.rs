//! Fair Value Gap: 세 캔들 불균형.
//!
//! - 상승: candle₁.high < candle₃.low, 가운데 캔들이 양봉
//! - 하락: candle₁.low > candle₃.high, 가운데 캔들이 음봉
//!
//! 채움 상태는 `Unfilled → Filled`로만 진행합니다.

use rust_decimal::Decimal;
use sharp_core::{decimal_from_f64, Candle, DecimalExt, Direction, FillStatus, Zone, ZoneKind, ZoneTransitionError};

use super::ZoneDraft;
use crate::config::ZoneConfig;

/// `history`의 마지막 세 캔들로 FVG를 판정합니다.
pub(crate) fn detect(history: &[Candle], config: &ZoneConfig) -> Option<ZoneDraft> {
    let n = history.len();
    if n < 3 {
        return None;
    }
    let (first, middle, third) = (&history[n - 3], &history[n - 2], &history[n - 1]);
    let min_gap = third.close * decimal_from_f64(config.fvg_min_gap_pct).unwrap_or(Decimal::ZERO);

    let (direction, low, high) = if first.high < third.low && middle.is_bullish() {
        (Direction::Up, first.high, third.low)
    } else if first.low > third.high && middle.is_bearish() {
        (Direction::Down, third.high, first.low)
    } else {
        return None;
    };

    let gap = high - low;
    if gap <= min_gap {
        return None;
    }

    let middle_range = middle.range();
    let strength = if middle_range > Decimal::ZERO {
        (gap / middle_range).to_f64_lossy().clamp(0.0, 1.0)
    } else {
        0.0
    };

    Some(ZoneDraft {
        kind: ZoneKind::FairValueGap {
            fill: FillStatus::Unfilled,
        },
        direction,
        price_high: high,
        price_low: low,
        strength,
        source_event: None,
    })
}

/// 가격이 갭 전체를 통과하면 채움으로 표시합니다. 이번 캔들에서 채워졌으면 `true`.
pub(crate) fn update(zone: &mut Zone, candle: &Candle, index: usize) -> Result<bool, ZoneTransitionError> {
    if zone.is_resolved() {
        return Ok(false);
    }
    let filled = match zone.direction {
        Direction::Up => candle.low <= zone.price_low,
        Direction::Down => candle.high >= zone.price_high,
    };
    if filled {
        zone.mark_filled(index)?;
    }
    Ok(filled)
}
