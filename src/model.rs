use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

// ── Value objects ────────────────────────────────────────────────

/// Half-open stay `[check_in, check_out)` in calendar days (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = DateRangeError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.check_in, raw.check_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRangeError {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl fmt::Display for DateRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "check-out {} must be after check-in {}",
            self.check_out, self.check_in
        )
    }
}

impl std::error::Error for DateRangeError {}

impl DateRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, DateRangeError> {
        if check_in >= check_out {
            return Err(DateRangeError { check_in, check_out });
        }
        Ok(Self { check_in, check_out })
    }

    /// Normalize two instants to their UTC calendar dates.
    pub fn from_instants(
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
    ) -> Result<Self, DateRangeError> {
        Self::new(check_in.date_naive(), check_out.date_naive())
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days() as u32
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in < other.check_out && self.check_out > other.check_in
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.check_in <= day && day < self.check_out
    }

    /// Each night of the stay, keyed by the date the night starts on.
    pub fn nights_iter(&self) -> impl Iterator<Item = NaiveDate> {
        self.check_in.iter_days().take(self.nights() as usize)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

/// Non-negative USD amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Money(Decimal);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyError(pub Decimal);

impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amount must not be negative: {}", self.0)
    }
}

impl std::error::Error for MoneyError {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError(amount));
        }
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn whole_units(&self) -> u64 {
        self.0.trunc().to_u64().unwrap_or(0)
    }

    /// Banker's rounding to cents.
    pub fn round_cents(self) -> Money {
        Money(self.0.round_dp(2))
    }

    /// Scale by a rate multiplier. Negative factors clamp to zero.
    pub fn times(self, factor: Decimal) -> Money {
        Money((self.0 * factor).max(Decimal::ZERO))
    }

    /// Even split over `parts`, rounded to cents. Zero parts yields zero.
    pub fn split(self, parts: u32) -> Money {
        if parts == 0 {
            return Money::ZERO;
        }
        Money(self.0 / Decimal::from(parts)).round_cents()
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, rhs: u32) -> Money {
        Money(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} USD", self.0.round_dp(2))
    }
}

// Decimal strings survive both JSON and the journal's bincode encoding.
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let amount = Decimal::from_str(&raw).map_err(serde::de::Error::custom)?;
        Money::new(amount).map_err(serde::de::Error::custom)
    }
}

// ── Enumerations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    Standard,
    Deluxe,
    Suite,
}

impl RoomType {
    pub const ALL: [RoomType; 3] = [RoomType::Standard, RoomType::Deluxe, RoomType::Suite];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Standard => "Standard",
            RoomType::Deluxe => "Deluxe",
            RoomType::Suite => "Suite",
        }
    }
}

impl FromStr for RoomType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(RoomType::Standard),
            "deluxe" => Ok(RoomType::Deluxe),
            "suite" => Ok(RoomType::Suite),
            _ => Err(UnknownVariant::new("room type", s)),
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::CheckedIn => "CheckedIn",
            BookingStatus::CheckedOut => "CheckedOut",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    /// Still holding the room (keys and concierge allowed).
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::CheckedIn)
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "checkedin" => Ok(BookingStatus::CheckedIn),
            "checkedout" => Ok(BookingStatus::CheckedOut),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            _ => Err(UnknownVariant::new("booking status", s)),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string that didn't name any variant of the expected enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.what, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

// ── Entities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub guest_id: Ulid,
    pub room_id: Ulid,
    pub range: DateRange,
    pub total: Money,
    pub status: BookingStatus,
    pub created_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: Ulid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub number: String,
    pub room_type: RoomType,
    /// Max guests per stay.
    pub capacity: u32,
    /// Every booking ever made for the room, sorted by check-in.
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(id: Ulid, number: String, room_type: RoomType, capacity: u32) -> Self {
        Self {
            id,
            number,
            room_type,
            capacity,
            bookings: Vec::new(),
        }
    }

    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.range.check_in() <= booking.range.check_in());
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Non-cancelled bookings sharing at least one night with `query`.
    /// Bookings starting at or after `query.check_out` are skipped by binary search.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.check_in() < query.check_out());
        self.bookings[..right_bound].iter().filter(move |b| {
            b.status != BookingStatus::Cancelled && b.range.check_out() > query.check_in()
        })
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            number: self.number.clone(),
            room_type: self.room_type,
            capacity: self.capacity,
        }
    }
}

// ── Amenities ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConciergeService {
    pub id: Ulid,
    pub name: String,
    pub price: Money,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConciergeStatus {
    Requested,
    Confirmed,
    Completed,
    Cancelled,
}

impl ConciergeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConciergeStatus::Completed | ConciergeStatus::Cancelled)
    }

    pub fn can_become(&self, next: ConciergeStatus) -> bool {
        use ConciergeStatus::*;
        match (self, next) {
            (Requested, Confirmed) | (Confirmed, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl FromStr for ConciergeStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requested" => Ok(ConciergeStatus::Requested),
            "confirmed" => Ok(ConciergeStatus::Confirmed),
            "completed" => Ok(ConciergeStatus::Completed),
            "cancelled" | "canceled" => Ok(ConciergeStatus::Cancelled),
            _ => Err(UnknownVariant::new("concierge status", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConciergeReservation {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub service_id: Ulid,
    pub scheduled_for: NaiveDateTime,
    pub party_size: u32,
    pub status: ConciergeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyStatus {
    Active,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalKey {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub code: String,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub status: KeyStatus,
}

impl DigitalKey {
    /// Usable on `day`: active, and within `[valid_from, valid_until]`
    /// (the checkout morning still opens the door).
    pub fn opens_on(&self, day: NaiveDate) -> bool {
        self.status == KeyStatus::Active && self.valid_from <= day && day <= self.valid_until
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub fn for_lifetime_points(points: u64) -> Self {
        match points {
            p if p >= 10_000 => LoyaltyTier::Platinum,
            p if p >= 5_000 => LoyaltyTier::Gold,
            p if p >= 1_000 => LoyaltyTier::Silver,
            _ => LoyaltyTier::Bronze,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub guest_id: Ulid,
    /// Spendable balance.
    pub points: u64,
    /// Everything ever credited; drives the tier.
    pub lifetime_points: u64,
    pub tier: LoyaltyTier,
}

impl LoyaltyAccount {
    pub fn empty(guest_id: Ulid) -> Self {
        Self {
            guest_id,
            points: 0,
            lifetime_points: 0,
            tier: LoyaltyTier::Bronze,
        }
    }

    pub fn credit(&mut self, points: u64) {
        self.points += points;
        self.lifetime_points += points;
        self.tier = LoyaltyTier::for_lifetime_points(self.lifetime_points);
    }

    pub fn debit(&mut self, points: u64) {
        self.points = self.points.saturating_sub(points);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BedPreference {
    King,
    Queen,
    Twin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloorPreference {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayPreference {
    pub guest_id: Ulid,
    pub bed: Option<BedPreference>,
    pub floor: Option<FloorPreference>,
    pub quiet_room: bool,
    pub notes: Option<String>,
}

// ── Journal records ──────────────────────────────────────────────

/// Everything that changes state is one of these; the journal stores them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomAdded {
        id: Ulid,
        number: String,
        room_type: RoomType,
        capacity: u32,
    },
    RoomUpdated {
        id: Ulid,
        room_type: RoomType,
        capacity: u32,
    },
    GuestRegistered {
        id: Ulid,
        name: String,
        email: String,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingRescheduled {
        id: Ulid,
        room_id: Ulid,
        range: DateRange,
        total: Money,
    },
    BookingStatusChanged {
        id: Ulid,
        room_id: Ulid,
        status: BookingStatus,
    },
    ServiceListed {
        service: ConciergeService,
    },
    ServiceAvailabilityChanged {
        id: Ulid,
        available: bool,
    },
    ConciergeReserved {
        reservation: ConciergeReservation,
    },
    ConciergeStatusChanged {
        id: Ulid,
        status: ConciergeStatus,
    },
    KeyIssued {
        key: DigitalKey,
    },
    KeyStatusChanged {
        id: Ulid,
        status: KeyStatus,
    },
    /// The booking moved; its active keys follow the new stay.
    KeyWindowChanged {
        id: Ulid,
        valid_from: NaiveDate,
        valid_until: NaiveDate,
    },
    PointsCredited {
        guest_id: Ulid,
        booking_id: Ulid,
        points: u64,
    },
    PointsRedeemed {
        guest_id: Ulid,
        points: u64,
    },
    PreferencesSet {
        preference: StayPreference,
    },
    /// Written only by compaction; replaces the credit/redeem history.
    LoyaltyRestored {
        account: LoyaltyAccount,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: Ulid,
    pub number: String,
    pub room_type: RoomType,
    pub capacity: u32,
}
