//! As-of resolution over append-only market series.
//!
//! Every report resolves "the rate in force on date D" the same way: the
//! entry with the greatest date not after D. Input order is irrelevant
//! except as a tie-break, where the earliest input entry wins.

use crate::core::market::{ForwardCurveSnapshot, MarketData, SpotRateObservation};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::trace;

/// A series entry stamped with the date it was observed.
pub trait Observed {
    fn observed_on(&self) -> NaiveDate;
}

impl Observed for SpotRateObservation {
    fn observed_on(&self) -> NaiveDate {
        self.date
    }
}

impl Observed for ForwardCurveSnapshot {
    fn observed_on(&self) -> NaiveDate {
        self.observed_on
    }
}

/// Latest entry with `observed_on <= as_of`, or `None` when the series
/// has nothing that early.
///
/// # Examples
///
/// ```
/// use hedge_mtm_engine::core::market::SpotRateObservation;
/// use hedge_mtm_engine::valuation::resolver::resolve_as_of;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
/// let series = vec![
///     SpotRateObservation::new(day(10), dec!(1000)),
///     SpotRateObservation::new(day(5), dec!(990)),
/// ];
/// assert_eq!(resolve_as_of(&series, day(7)).unwrap().rate, dec!(990));
/// assert!(resolve_as_of(&series, day(1)).is_none());
/// ```
pub fn resolve_as_of<T: Observed>(series: &[T], as_of: NaiveDate) -> Option<&T> {
    let found = series
        .iter()
        .filter(|entry| entry.observed_on() <= as_of)
        .fold(None::<&T>, |best, entry| match best {
            Some(b) if b.observed_on() >= entry.observed_on() => Some(b),
            _ => Some(entry),
        });
    trace!(
        "as-of {} resolved to {:?}",
        as_of,
        found.map(|e| e.observed_on())
    );
    found
}

/// Parse a caller-supplied as-of date.
///
/// Accepts `YYYY-MM-DD`, an RFC 3339 timestamp or a local date-time;
/// only the date part is kept.
/// Anything else is treated as absent.
pub fn parse_as_of(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(stamp.date_naive());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|stamp| stamp.date())
}

/// Local date-time shapes accepted besides RFC 3339.
const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A pre-sorted index over a series for repeated as-of lookups.
///
/// Answers exactly what [`resolve_as_of`] answers, in `O(log n)`.
#[derive(Debug, Clone)]
pub struct SeriesIndex<'a, T> {
    /// Ascending by date, one entry per date.
    entries: Vec<(NaiveDate, &'a T)>,
}

impl<'a, T: Observed> SeriesIndex<'a, T> {
    pub fn new(series: &'a [T]) -> Self {
        let mut entries: Vec<(NaiveDate, &'a T)> =
            series.iter().map(|e| (e.observed_on(), e)).collect();
        // Stable sort, so dedup keeps the earliest input entry per date.
        entries.sort_by_key(|(date, _)| *date);
        entries.dedup_by_key(|(date, _)| *date);
        Self { entries }
    }

    pub fn resolve(&self, as_of: NaiveDate) -> Option<&'a T> {
        let idx = self.entries.partition_point(|(date, _)| *date <= as_of);
        if idx == 0 {
            None
        } else {
            Some(self.entries[idx - 1].1)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest date for which anything resolves.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.entries.first().map(|(date, _)| *date)
    }
}

/// As-of access to both market series.
pub trait MarketLookup {
    fn spot_as_of(&self, date: NaiveDate) -> Option<&SpotRateObservation>;
    fn curve_as_of(&self, date: NaiveDate) -> Option<&ForwardCurveSnapshot>;
}

impl MarketLookup for MarketData {
    fn spot_as_of(&self, date: NaiveDate) -> Option<&SpotRateObservation> {
        resolve_as_of(self.spot_rates(), date)
    }

    fn curve_as_of(&self, date: NaiveDate) -> Option<&ForwardCurveSnapshot> {
        resolve_as_of(self.forward_curves(), date)
    }
}

/// Market data indexed once for multi-date reports.
#[derive(Debug, Clone)]
pub struct IndexedMarket<'a> {
    spot: SeriesIndex<'a, SpotRateObservation>,
    curves: SeriesIndex<'a, ForwardCurveSnapshot>,
}

impl<'a> IndexedMarket<'a> {
    pub fn new(market: &'a MarketData) -> Self {
        Self {
            spot: SeriesIndex::new(market.spot_rates()),
            curves: SeriesIndex::new(market.forward_curves()),
        }
    }
}

impl<'a> MarketLookup for IndexedMarket<'a> {
    fn spot_as_of(&self, date: NaiveDate) -> Option<&SpotRateObservation> {
        self.spot.resolve(date)
    }

    fn curve_as_of(&self, date: NaiveDate) -> Option<&ForwardCurveSnapshot> {
        self.curves.resolve(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn series() -> Vec<SpotRateObservation> {
        vec![
            SpotRateObservation::new(day(3), dec!(1003)),
            SpotRateObservation::new(day(10), dec!(1010)),
            SpotRateObservation::new(day(1), dec!(1001)),
        ]
    }

    #[test]
    fn test_exact_date() {
        assert_eq!(resolve_as_of(&series(), day(10)).unwrap().rate, dec!(1010));
    }

    #[test]
    fn test_gap_uses_previous_observation() {
        assert_eq!(resolve_as_of(&series(), day(9)).unwrap().rate, dec!(1003));
        assert_eq!(resolve_as_of(&series(), day(31)).unwrap().rate, dec!(1010));
    }

    #[test]
    fn test_before_first_observation() {
        let s = vec![SpotRateObservation::new(day(5), dec!(1))];
        assert!(resolve_as_of(&s, day(4)).is_none());
        assert!(resolve_as_of::<SpotRateObservation>(&[], day(4)).is_none());
    }

    #[test]
    fn test_tie_keeps_first_input() {
        let s = vec![
            SpotRateObservation::new(day(5), dec!(1)),
            SpotRateObservation::new(day(5), dec!(2)),
        ];
        assert_eq!(resolve_as_of(&s, day(6)).unwrap().rate, dec!(1));
        assert_eq!(SeriesIndex::new(&s).resolve(day(6)).unwrap().rate, dec!(1));
    }

    #[test]
    fn test_index_matches_linear_scan() {
        let s = series();
        let index = SeriesIndex::new(&s);
        assert_eq!(index.len(), 3);
        assert_eq!(index.first_date(), Some(day(1)));
        for d in 1..=31 {
            assert_eq!(
                index.resolve(day(d)).map(|o| o.rate),
                resolve_as_of(&s, day(d)).map(|o| o.rate),
                "mismatch on day {}",
                d
            );
        }
        assert!(index.resolve(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()).is_none());
    }

    #[test]
    fn test_indexed_market_agrees_with_market_data() {
        use crate::core::market::CurvePoint;

        let market = MarketData::new(
            series(),
            vec![
                ForwardCurveSnapshot::new(day(2), vec![CurvePoint::new(day(30), dec!(1050))]),
                ForwardCurveSnapshot::new(day(8), vec![CurvePoint::new(day(30), dec!(1040))]),
            ],
        )
        .unwrap();
        let indexed = IndexedMarket::new(&market);
        for d in 1..=31 {
            assert_eq!(
                market.curve_as_of(day(d)).map(|c| c.observed_on),
                indexed.curve_as_of(day(d)).map(|c| c.observed_on)
            );
            assert_eq!(
                market.spot_as_of(day(d)).map(|s| s.rate),
                indexed.spot_as_of(day(d)).map(|s| s.rate)
            );
        }
        assert!(indexed.curve_as_of(day(1)).is_none());
    }

    #[test]
    fn test_parse_as_of() {
        assert_eq!(parse_as_of("2024-01-10"), Some(day(10)));
        assert_eq!(parse_as_of("2024-01-10T15:30:00Z"), Some(day(10)));
        assert_eq!(parse_as_of(" 2024-01-10 "), Some(day(10)));
        assert_eq!(parse_as_of("2024-01-10T23:30:00-03:00"), Some(day(10)));
        assert_eq!(parse_as_of("2024-01-10 15:30:00"), Some(day(10)));
        assert_eq!(parse_as_of("2024-01-10T15:30"), Some(day(10)));
        assert_eq!(parse_as_of("2024-01-10Tgarbage"), None);
        assert_eq!(parse_as_of("2024-01-10 not a time"), None);
        assert_eq!(parse_as_of("2024-01-10T25:00:00Z"), None);
        assert_eq!(parse_as_of("2024-13-10"), None);
        assert_eq!(parse_as_of("yesterday"), None);
        assert_eq!(parse_as_of(""), None);
    }
}
