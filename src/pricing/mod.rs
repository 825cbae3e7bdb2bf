//! Nightly rate computation.
//!
//! A night's rate is `base(room type) × season(month) × weekend(weekday)`, rounded
//! to cents. A stay's total is the sum over `[check_in, check_out)`.

mod quoter;

pub use quoter::{FallbackQuoter, LocalQuoter, Quote, QuoteError, QuoteSource, RateQuoter, RemoteQuoter};

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::limits::MAX_STAY_NIGHTS;
use crate::model::{DateRange, Money, RoomType, UnknownVariant};

/// Flat rate used when the pricing service can't be reached.
pub const FALLBACK_NIGHTLY_RATE: Decimal = dec!(100);

const PEAK: Decimal = dec!(1.25);
const OFF_PEAK: Decimal = dec!(0.85);
const WEEKEND: Decimal = dec!(1.15);

pub fn base_rate(room_type: RoomType) -> Money {
    let amount = match room_type {
        RoomType::Standard => dec!(100),
        RoomType::Deluxe => dec!(180),
        RoomType::Suite => dec!(320),
    };
    Money::new(amount).unwrap_or(Money::ZERO)
}

/// Peak: June to August and December. Off-peak: January to March.
pub fn season_multiplier(night: NaiveDate) -> Decimal {
    match night.month() {
        6..=8 | 12 => PEAK,
        1..=3 => OFF_PEAK,
        _ => Decimal::ONE,
    }
}

/// Friday and Saturday nights.
pub fn weekend_multiplier(night: NaiveDate) -> Decimal {
    match night.weekday() {
        Weekday::Fri | Weekday::Sat => WEEKEND,
        _ => Decimal::ONE,
    }
}

pub fn nightly_multiplier(night: NaiveDate) -> Decimal {
    season_multiplier(night) * weekend_multiplier(night)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightRate {
    pub date: NaiveDate,
    pub rate: Money,
    pub multiplier: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingResult {
    pub room_type: RoomType,
    /// Average over the stay, rounded to cents.
    pub price_per_night: Money,
    pub total: Money,
    pub nights: u32,
    pub breakdown: Vec<NightRate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    UnknownRoomType(String),
    InvalidDates {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    StayTooLong(u32),
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::UnknownRoomType(name) => write!(f, "unknown room type: {name}"),
            PricingError::InvalidDates { check_in, check_out } => {
                write!(f, "checkout {check_out} must be after checkin {check_in}")
            }
            PricingError::StayTooLong(nights) => {
                write!(f, "stay of {nights} nights exceeds {MAX_STAY_NIGHTS}")
            }
        }
    }
}

impl std::error::Error for PricingError {}

impl From<UnknownVariant> for PricingError {
    fn from(e: UnknownVariant) -> Self {
        PricingError::UnknownRoomType(e.value)
    }
}

pub fn calculate(room_type: RoomType, range: &DateRange) -> Result<PricingResult, PricingError> {
    let nights = range.nights();
    if nights > MAX_STAY_NIGHTS {
        return Err(PricingError::StayTooLong(nights));
    }
    let base = base_rate(room_type);
    let breakdown: Vec<NightRate> = range
        .nights_iter()
        .map(|date| {
            let multiplier = nightly_multiplier(date);
            NightRate {
                date,
                rate: base.times(multiplier).round_cents(),
                multiplier,
            }
        })
        .collect();
    let total: Money = breakdown.iter().map(|n| n.rate).sum();
    Ok(PricingResult {
        room_type,
        price_per_night: total.split(nights),
        total,
        nights,
        breakdown,
    })
}

/// Entry point for untyped callers (HTTP query strings).
pub fn calculate_for(
    room_type: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<PricingResult, PricingError> {
    let room_type: RoomType = room_type.parse()?;
    let range = DateRange::new(check_in, check_out)
        .map_err(|e| PricingError::InvalidDates { check_in: e.check_in, check_out: e.check_out })?;
    calculate(room_type, &range)
}

// ── Wire format ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResponse {
    pub room_type: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_night: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub nights: u32,
    pub breakdown: Vec<BreakdownLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub multiplier: Decimal,
}

impl From<&PricingResult> for PricingResponse {
    fn from(r: &PricingResult) -> Self {
        Self {
            room_type: r.room_type.to_string(),
            price_per_night: r.price_per_night.amount(),
            total_price: r.total.amount(),
            nights: r.nights,
            breakdown: r
                .breakdown
                .iter()
                .map(|n| BreakdownLine {
                    date: n.date,
                    rate: n.rate.amount(),
                    multiplier: n.multiplier,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stay(a: NaiveDate, b: NaiveDate) -> DateRange {
        DateRange::new(a, b).unwrap()
    }

    #[test]
    fn plain_weekday_nights_cost_the_base_rate() {
        // Mon 2026-05-11 .. Thu 2026-05-14: three shoulder-season weeknights.
        let r = calculate(RoomType::Standard, &stay(day(2026, 5, 11), day(2026, 5, 14))).unwrap();
        assert_eq!(r.nights, 3);
        assert_eq!(r.total.amount(), dec!(300));
        assert_eq!(r.price_per_night.amount(), dec!(100));
        assert!(r.breakdown.iter().all(|n| n.multiplier == Decimal::ONE));
    }

    #[test]
    fn friday_in_june_stacks_both_multipliers() {
        // 2026-06-05 is a Friday.
        assert_eq!(day(2026, 6, 5).weekday(), Weekday::Fri);
        let r = calculate(RoomType::Standard, &stay(day(2026, 6, 5), day(2026, 6, 6))).unwrap();
        assert_eq!(r.total.amount(), dec!(143.75));
        assert_eq!(r.breakdown[0].multiplier, dec!(1.4375));
    }

    #[test]
    fn sunday_night_is_not_weekend() {
        // 2026-05-10 is a Sunday; the night starts Sunday so no surcharge.
        assert_eq!(weekend_multiplier(day(2026, 5, 10)), Decimal::ONE);
        assert_eq!(weekend_multiplier(day(2026, 5, 9)), WEEKEND);
    }

    #[test]
    fn season_boundaries() {
        assert_eq!(season_multiplier(day(2026, 1, 1)), OFF_PEAK);
        assert_eq!(season_multiplier(day(2026, 3, 31)), OFF_PEAK);
        assert_eq!(season_multiplier(day(2026, 4, 1)), Decimal::ONE);
        assert_eq!(season_multiplier(day(2026, 5, 31)), Decimal::ONE);
        assert_eq!(season_multiplier(day(2026, 6, 1)), PEAK);
        assert_eq!(season_multiplier(day(2026, 8, 31)), PEAK);
        assert_eq!(season_multiplier(day(2026, 9, 1)), Decimal::ONE);
        assert_eq!(season_multiplier(day(2026, 12, 24)), PEAK);
    }

    #[test]
    fn week_long_stay_sums_each_night() {
        // Mon 2026-02-02 .. Mon 2026-02-09, Deluxe, off-peak.
        let r = calculate(RoomType::Deluxe, &stay(day(2026, 2, 2), day(2026, 2, 9))).unwrap();
        // 5 weeknights at 180×0.85 = 153, Fri+Sat at 153×1.15 = 175.95
        assert_eq!(r.total.amount(), dec!(1116.90));
        assert_eq!(r.nights, 7);
        assert_eq!(r.price_per_night.amount(), dec!(159.56));
        let sum: Money = r.breakdown.iter().map(|n| n.rate).sum();
        assert_eq!(sum, r.total);
    }

    #[test]
    fn untyped_entry_rejects_bad_input() {
        assert_eq!(
            calculate_for("Penthouse", day(2026, 5, 1), day(2026, 5, 2)),
            Err(PricingError::UnknownRoomType("Penthouse".into()))
        );
        assert!(matches!(
            calculate_for("suite", day(2026, 5, 2), day(2026, 5, 2)),
            Err(PricingError::InvalidDates { .. })
        ));
        assert!(calculate_for("suite", day(2026, 5, 1), day(2026, 5, 2)).is_ok());
    }

    #[test]
    fn overly_long_stay_rejected() {
        let r = calculate(RoomType::Suite, &stay(day(2026, 1, 1), day(2028, 1, 1)));
        assert!(matches!(r, Err(PricingError::StayTooLong(_))));
    }

    #[test]
    fn response_uses_camel_case_numbers() {
        let r = calculate(RoomType::Standard, &stay(day(2026, 6, 5), day(2026, 6, 6))).unwrap();
        let json = serde_json::to_value(PricingResponse::from(&r)).unwrap();
        assert_eq!(json["roomType"], "Standard");
        assert_eq!(json["totalPrice"], 143.75);
        assert_eq!(json["pricePerNight"], 143.75);
        assert_eq!(json["nights"], 1);
        assert_eq!(json["breakdown"][0]["date"], "2026-06-05");
    }
}
