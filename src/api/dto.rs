use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;
use crate::pricing::{Quote, QuoteSource};
use crate::seed::{DemoUser, Role};

use super::error::ApiError;

pub fn stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<DateRange, ApiError> {
    DateRange::new(check_in, check_out).map_err(|e| ApiError::bad_request(e.to_string()))
}

// ── Requests ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub guest_id: Ulid,
    pub room_id: Ulid,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ChangeDatesRequest {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingListQuery {
    pub guest_id: Option<Ulid>,
    pub room_id: Option<Ulid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub room_type: Option<String>,
    pub guests: Option<u32>,
}

/// Pricing takes raw strings so unknown room types and bad dates get our message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuery {
    pub room_type: Option<String>,
    pub checkin: Option<String>,
    pub checkout: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRoomRequest {
    pub number: String,
    pub room_type: String,
    pub capacity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    pub room_type: String,
    pub capacity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RegisterGuestRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConciergeRequest {
    pub service_id: Ulid,
    pub scheduled_for: NaiveDateTime,
    pub party_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub points: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRequest {
    pub bed: Option<BedPreference>,
    pub floor: Option<FloorPreference>,
    #[serde(default)]
    pub quiet_room: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeyCheckQuery {
    pub code: String,
    pub date: Option<NaiveDate>,
}

// ── Responses ────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: Ulid,
    pub guest_id: Ulid,
    pub room_id: Ulid,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub nights: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_on: NaiveDate,
}

impl From<Booking> for BookingView {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            guest_id: b.guest_id,
            room_id: b.room_id,
            checkin: b.range.check_in(),
            checkout: b.range.check_out(),
            nights: b.range.nights(),
            total_price: b.total.amount(),
            status: b.status,
            created_on: b.created_on,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: Ulid,
    pub number: String,
    pub room_type: RoomType,
    pub capacity: u32,
}

impl From<RoomInfo> for RoomView {
    fn from(r: RoomInfo) -> Self {
        Self {
            id: r.id,
            number: r.number,
            room_type: r.room_type,
            capacity: r.capacity,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GuestView {
    pub id: Ulid,
    pub name: String,
    pub email: String,
}

impl From<Guest> for GuestView {
    fn from(g: Guest) -> Self {
        Self {
            id: g.id,
            name: g.name,
            email: g.email,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyView {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub code: String,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub status: KeyStatus,
}

impl From<DigitalKey> for KeyView {
    fn from(k: DigitalKey) -> Self {
        Self {
            id: k.id,
            booking_id: k.booking_id,
            code: k.code,
            valid_from: k.valid_from,
            valid_until: k.valid_until,
            status: k.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct KeyCheckView {
    pub valid: bool,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub service_id: Ulid,
    pub scheduled_for: NaiveDateTime,
    pub party_size: u32,
    pub status: ConciergeStatus,
}

impl From<ConciergeReservation> for ReservationView {
    fn from(r: ConciergeReservation) -> Self {
        Self {
            id: r.id,
            booking_id: r.booking_id,
            service_id: r.service_id,
            scheduled_for: r.scheduled_for,
            party_size: r.party_size,
            status: r.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceView {
    pub id: Ulid,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub available: bool,
}

impl From<ConciergeService> for ServiceView {
    fn from(s: ConciergeService) -> Self {
        Self {
            id: s.id,
            name: s.name,
            price: s.price.amount(),
            available: s.available,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyView {
    pub guest_id: Ulid,
    pub points: u64,
    pub lifetime_points: u64,
    pub tier: LoyaltyTier,
}

impl From<LoyaltyAccount> for LoyaltyView {
    fn from(a: LoyaltyAccount) -> Self {
        Self {
            guest_id: a.guest_id,
            points: a.points,
            lifetime_points: a.lifetime_points,
            tier: a.tier,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesView {
    pub guest_id: Ulid,
    pub bed: Option<BedPreference>,
    pub floor: Option<FloorPreference>,
    pub quiet_room: bool,
    pub notes: Option<String>,
}

impl From<StayPreference> for PreferencesView {
    fn from(p: StayPreference) -> Self {
        Self {
            guest_id: p.guest_id,
            bed: p.bed,
            floor: p.floor,
            quiet_room: p.quiet_room,
            notes: p.notes,
        }
    }
}

/// What the booking flow would charge, including where the price came from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteView {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_night: Decimal,
    pub nights: u32,
    pub source: &'static str,
}

impl From<Quote> for QuoteView {
    fn from(q: Quote) -> Self {
        Self {
            total_price: q.total.amount(),
            price_per_night: q.price_per_night.amount(),
            nights: q.nights,
            source: match q.source {
                QuoteSource::Engine => "engine",
                QuoteSource::Remote => "remote",
                QuoteSource::Fallback => "fallback",
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&DemoUser> for UserView {
    fn from(u: &DemoUser) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
        }
    }
}
