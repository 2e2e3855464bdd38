use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{HistoryPoint, HistoryRange};

const WALK_START_PRICE: f64 = 150.0;
const WALK_MIN_PRICE: f64 = 1.0;

/// FNV-1a over `symbol|range` so the same chart request always draws the
/// same walk.
fn walk_seed(symbol: &str, range: HistoryRange) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in symbol
        .bytes()
        .chain(std::iter::once(b'|'))
        .chain(range.as_str().bytes())
    {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Random-walk closes for `range`, one per calendar day, ending on `today`.
pub fn synthetic_history(symbol: &str, range: HistoryRange, today: NaiveDate) -> Vec<HistoryPoint> {
    let days = range.trading_days();
    let mut rng = StdRng::seed_from_u64(walk_seed(symbol, range));
    let mut price = WALK_START_PRICE;

    (0..=days)
        .rev()
        .map(|back| {
            price = (price + rng.gen_range(-1.0..1.0)).max(WALK_MIN_PRICE);
            HistoryPoint {
                date: today - Duration::days(i64::from(back)),
                close: round_cents(price),
            }
        })
        .collect()
}

/// Drop non-finite closes and order ascending by date.
pub fn normalize_history(mut points: Vec<HistoryPoint>) -> Vec<HistoryPoint> {
    points.retain(|p| p.close.is_finite());
    points.sort_by_key(|p| p.date);
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    #[test]
    fn test_one_month_walk_shape() {
        let points = synthetic_history("AAPL", HistoryRange::OneMonth, today());
        assert_eq!(points.len(), 23);
        assert_eq!(points.last().unwrap().date, today());
        assert_eq!(
            points.first().unwrap().date,
            today() - Duration::days(22)
        );
        for w in points.windows(2) {
            assert_eq!(w[1].date - w[0].date, Duration::days(1));
        }
        assert!(points.iter().all(|p| p.close >= 1.0));
    }

    #[test]
    fn test_walk_lengths_per_range() {
        for (range, len) in [
            (HistoryRange::ThreeMonths, 67),
            (HistoryRange::OneYear, 253),
            (HistoryRange::FiveYears, 1261),
        ] {
            assert_eq!(synthetic_history("MSFT", range, today()).len(), len);
        }
    }

    #[test]
    fn test_walk_steps_are_bounded() {
        let points = synthetic_history("TSLA", HistoryRange::FiveYears, today());
        // rounding can widen a step by at most a cent
        assert!((points[0].close - WALK_START_PRICE).abs() <= 1.01);
        for w in points.windows(2) {
            assert!((w[1].close - w[0].close).abs() <= 1.01);
        }
        assert!(points.iter().all(|p| p.close >= WALK_MIN_PRICE));
    }

    #[test]
    fn test_walk_is_deterministic() {
        let a = synthetic_history("NVDA", HistoryRange::OneYear, today());
        let b = synthetic_history("NVDA", HistoryRange::OneYear, today());
        assert_eq!(a, b);
        let c = synthetic_history("META", HistoryRange::OneYear, today());
        assert_ne!(a, c);
    }

    #[test]
    fn test_closes_have_two_decimals() {
        for p in synthetic_history("XOM", HistoryRange::OneMonth, today()) {
            assert!((p.close * 100.0 - (p.close * 100.0).round()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_history() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let points = vec![
            HistoryPoint { date: d(3), close: 12.0 },
            HistoryPoint { date: d(1), close: 10.0 },
            HistoryPoint { date: d(2), close: f64::NAN },
        ];
        let out = normalize_history(points);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date, d(1));
        assert_eq!(out[1].date, d(3));
    }
}
