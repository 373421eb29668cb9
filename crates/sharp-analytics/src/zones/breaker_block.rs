//! Breaker Block: 종가로 돌파되어 무효화된 Order Block이 반대 역할로 전환된 존.

use rust_decimal::Decimal;
use sharp_core::{decimal_from_f64, BlockStatus, Candle, Direction, Zone, ZoneKind};

use super::{volume_ratio, ZoneDraft};
use crate::config::ZoneConfig;

/// 방금 Mitigated 된 Order Block에서 Breaker Block을 만듭니다.
///
/// 종가가 블록 경계를 `breaker_break_pct` 이상 넘어선 경우에만 생성합니다.
pub(crate) fn spawn(origin: &Zone, candle: &Candle, config: &ZoneConfig, avg_volume: Decimal) -> Option<ZoneDraft> {
    if !matches!(origin.kind, ZoneKind::OrderBlock { .. }) {
        return None;
    }
    let margin = decimal_from_f64(config.breaker_break_pct).unwrap_or(Decimal::ZERO);

    let broke_decisively = match origin.direction {
        Direction::Up => candle.close < origin.price_low * (Decimal::ONE - margin),
        Direction::Down => candle.close > origin.price_high * (Decimal::ONE + margin),
    };
    if !broke_decisively {
        return None;
    }

    let participation = (0.7 + 0.3 * volume_ratio(candle.volume, avg_volume)).min(1.0);

    Some(ZoneDraft {
        kind: ZoneKind::BreakerBlock {
            status: BlockStatus::Untested,
            origin_zone: origin.id,
        },
        direction: origin.direction.opposite(),
        price_high: origin.price_high,
        price_low: origin.price_low,
        strength: (origin.strength * participation).clamp(0.0, 1.0),
        source_event: origin.source_event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bullish_block() -> Zone {
        Zone {
            id: 3,
            kind: ZoneKind::OrderBlock {
                status: BlockStatus::Mitigated,
            },
            direction: Direction::Up,
            price_high: dec!(43250),
            price_low: dec!(43150),
            strength: 0.8,
            created_index: 10,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            resolved_index: Some(20),
            source_event: Some(4),
        }
    }

    fn close_at(close: Decimal, volume: Decimal) -> Candle {
        Candle::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap(),
            dec!(43200),
            dec!(43210),
            close - dec!(10),
            close,
            volume,
        )
    }

    #[test]
    fn test_breaker_flips_direction() {
        let breaker = spawn(&bullish_block(), &close_at(dec!(43050), dec!(200)), &ZoneConfig::default(), dec!(100)).unwrap();
        assert_eq!(breaker.direction, Direction::Down);
        assert_eq!((breaker.price_low, breaker.price_high), (dec!(43150), dec!(43250)));
        assert_eq!(
            breaker.kind,
            ZoneKind::BreakerBlock {
                status: BlockStatus::Untested,
                origin_zone: 3
            }
        );
        // 거래량 2배: 참여도 1.0 상한
        assert!((breaker.strength - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_shallow_break_spawns_nothing() {
        // 43150 × 0.999 = 43106.85 위의 종가
        assert!(spawn(&bullish_block(), &close_at(dec!(43120), dec!(100)), &ZoneConfig::default(), dec!(100)).is_none());
    }

    #[test]
    fn test_low_volume_scales_strength() {
        let breaker = spawn(&bullish_block(), &close_at(dec!(43000), dec!(0)), &ZoneConfig::default(), dec!(100)).unwrap();
        assert!((breaker.strength - 0.8 * 0.7).abs() < 1e-9);
    }
}
