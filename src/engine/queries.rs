use ulid::Ulid;

use crate::cache::availability_key;
use crate::limits::*;
use crate::model::*;
use crate::pricing::Quote;

use super::{Engine, EngineError, Entity};

/// Narrows `list_bookings`; `Default` lists everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingFilter {
    pub guest_id: Option<Ulid>,
    pub room_id: Option<Ulid>,
}

impl BookingFilter {
    fn matches(&self, booking: &Booking) -> bool {
        self.guest_id.is_none_or(|g| g == booking.guest_id)
            && self.room_id.is_none_or(|r| r == booking.room_id)
    }
}

impl Engine {
    pub async fn get_room(&self, id: Ulid) -> Result<RoomInfo, EngineError> {
        let rs = self.store.room(&id).ok_or(EngineError::NotFound(Entity::Room, id))?;
        let guard = rs.read().await;
        Ok(guard.info())
    }

    /// Every room, ordered by room number.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut rooms = Vec::new();
        for rs in self.store.room_handles() {
            rooms.push(rs.read().await.info());
        }
        rooms.sort_by(|a, b| a.number.cmp(&b.number));
        rooms
    }

    pub fn get_guest(&self, id: Ulid) -> Result<Guest, EngineError> {
        self.store
            .guests
            .get(&id)
            .map(|g| g.value().clone())
            .ok_or(EngineError::NotFound(Entity::Guest, id))
    }

    pub fn list_guests(&self) -> Vec<Guest> {
        let mut guests: Vec<Guest> = self.store.guests.iter().map(|g| g.value().clone()).collect();
        guests.sort_by(|a, b| a.id.cmp(&b.id));
        guests
    }

    pub fn find_guest_by_email(&self, email: &str) -> Option<Guest> {
        let id = *self.store.guest_emails.get(&email.trim().to_ascii_lowercase())?;
        self.get_guest(id).ok()
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let room_id = self
            .store
            .room_for_booking(&id)
            .ok_or(EngineError::NotFound(Entity::Booking, id))?;
        let rs = self
            .store
            .room(&room_id)
            .ok_or(EngineError::NotFound(Entity::Room, room_id))?;
        let guard = rs.read().await;
        guard
            .booking(id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Booking, id))
    }

    /// Matching bookings, newest check-in first.
    pub async fn list_bookings(&self, filter: BookingFilter) -> Vec<Booking> {
        let handles = match filter.room_id {
            Some(room_id) => self.store.room(&room_id).into_iter().collect(),
            None => self.store.room_handles(),
        };
        let mut bookings = Vec::new();
        for rs in handles {
            let guard = rs.read().await;
            bookings.extend(guard.bookings.iter().filter(|b| filter.matches(b)).cloned());
        }
        bookings.sort_by(|a, b| {
            b.range
                .check_in()
                .cmp(&a.range.check_in())
                .then_with(|| a.id.cmp(&b.id))
        });
        bookings
    }

    /// Rooms free for every night of `range`, optionally narrowed by class and
    /// minimum capacity. Answers are cached until the next booking mutation.
    pub async fn search_available(
        &self,
        range: DateRange,
        room_type: Option<RoomType>,
        min_capacity: Option<u32>,
    ) -> Result<Vec<RoomInfo>, EngineError> {
        if range.nights() > MAX_SEARCH_NIGHTS {
            return Err(EngineError::LimitExceeded("search window too wide"));
        }
        let key = availability_key(&range, room_type, min_capacity);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let mut free = Vec::new();
        for rs in self.store.room_handles() {
            let guard = rs.read().await;
            if room_type.is_some_and(|t| t != guard.room_type) {
                continue;
            }
            if min_capacity.is_some_and(|c| guard.capacity < c) {
                continue;
            }
            if guard.overlapping(&range).next().is_none() {
                free.push(guard.info());
            }
        }
        free.sort_by(|a, b| a.number.cmp(&b.number));
        self.cache.put(key, free.clone());
        Ok(free)
    }

    /// Price a prospective stay through the configured quoter.
    pub async fn quote(&self, room_type: RoomType, range: &DateRange) -> Result<Quote, EngineError> {
        Ok(self.quoter.quote(room_type, range).await?)
    }

    pub fn list_concierge_services(&self) -> Vec<ConciergeService> {
        let mut services: Vec<ConciergeService> =
            self.store.services.iter().map(|s| s.value().clone()).collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    pub fn list_concierge_reservations(&self, booking_id: Ulid) -> Result<Vec<ConciergeReservation>, EngineError> {
        if self.store.room_for_booking(&booking_id).is_none() {
            return Err(EngineError::NotFound(Entity::Booking, booking_id));
        }
        let mut out: Vec<ConciergeReservation> = self
            .store
            .reservations
            .iter()
            .filter(|r| r.booking_id == booking_id)
            .map(|r| r.value().clone())
            .collect();
        out.sort_by_key(|r| r.scheduled_for);
        Ok(out)
    }

    pub fn list_digital_keys(&self, booking_id: Ulid) -> Result<Vec<DigitalKey>, EngineError> {
        if self.store.room_for_booking(&booking_id).is_none() {
            return Err(EngineError::NotFound(Entity::Booking, booking_id));
        }
        let mut out: Vec<DigitalKey> = self
            .store
            .keys
            .iter()
            .filter(|k| k.booking_id == booking_id)
            .map(|k| k.value().clone())
            .collect();
        out.sort_by_key(|k| k.id);
        Ok(out)
    }

    /// Zeroed Bronze account for guests who never earned points.
    pub fn loyalty_account(&self, guest_id: Ulid) -> Result<LoyaltyAccount, EngineError> {
        if !self.store.guests.contains_key(&guest_id) {
            return Err(EngineError::NotFound(Entity::Guest, guest_id));
        }
        Ok(self.account_or_empty(guest_id))
    }

    pub fn get_preferences(&self, guest_id: Ulid) -> Result<Option<StayPreference>, EngineError> {
        if !self.store.guests.contains_key(&guest_id) {
            return Err(EngineError::NotFound(Entity::Guest, guest_id));
        }
        Ok(self.store.preferences.get(&guest_id).map(|p| p.value().clone()))
    }

    pub fn room_count(&self) -> usize {
        self.store.rooms.len()
    }
}
