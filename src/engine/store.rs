use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::SharedRoomState;

/// All in-memory hotel state. Bookings live inside their room's lock;
/// everything else sits in flat maps keyed by id.
#[derive(Default)]
pub struct Store {
    pub(super) rooms: DashMap<Ulid, SharedRoomState>,
    /// Room number → room id; numbers are unique.
    pub(super) room_numbers: DashMap<String, Ulid>,
    pub(super) guests: DashMap<Ulid, Guest>,
    /// Lower-cased email → guest id.
    pub(super) guest_emails: DashMap<String, Ulid>,
    /// Booking id → room id.
    pub(super) booking_rooms: DashMap<Ulid, Ulid>,
    pub(super) services: DashMap<Ulid, ConciergeService>,
    pub(super) reservations: DashMap<Ulid, ConciergeReservation>,
    pub(super) keys: DashMap<Ulid, DigitalKey>,
    pub(super) loyalty: DashMap<Ulid, LoyaltyAccount>,
    pub(super) preferences: DashMap<Ulid, StayPreference>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_rooms.get(booking_id).map(|e| *e.value())
    }

    /// Snapshot of every room handle, so callers can await locks without
    /// holding a map shard.
    pub fn room_handles(&self) -> Vec<SharedRoomState> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    /// Apply a room-scoped event. Caller holds the room's write lock.
    pub fn apply_to_room(&self, rs: &mut RoomState, event: &Event) {
        match event {
            Event::RoomUpdated {
                room_type, capacity, ..
            } => {
                rs.room_type = *room_type;
                rs.capacity = *capacity;
            }
            Event::BookingCreated { booking } => {
                rs.insert_booking(booking.clone());
                self.booking_rooms.insert(booking.id, rs.id);
            }
            Event::BookingRescheduled { id, range, total, .. } => {
                // Re-insert to keep the check-in ordering.
                if let Some(mut booking) = rs.remove_booking(*id) {
                    booking.range = *range;
                    booking.total = *total;
                    rs.insert_booking(booking);
                }
            }
            Event::BookingStatusChanged { id, status, .. } => {
                if let Some(booking) = rs.booking_mut(*id) {
                    booking.status = *status;
                }
            }
            _ => {}
        }
    }

    /// Apply an event that touches no room lock.
    pub fn apply_global(&self, event: &Event) {
        match event {
            Event::RoomAdded {
                id,
                number,
                room_type,
                capacity,
            } => {
                let rs = RoomState::new(*id, number.clone(), *room_type, *capacity);
                self.rooms.insert(*id, Arc::new(RwLock::new(rs)));
                self.room_numbers.insert(number.clone(), *id);
            }
            Event::GuestRegistered { id, name, email } => {
                self.guests.insert(
                    *id,
                    Guest {
                        id: *id,
                        name: name.clone(),
                        email: email.clone(),
                    },
                );
                self.guest_emails.insert(email.to_ascii_lowercase(), *id);
            }
            Event::ServiceListed { service } => {
                self.services.insert(service.id, service.clone());
            }
            Event::ServiceAvailabilityChanged { id, available } => {
                if let Some(mut service) = self.services.get_mut(id) {
                    service.available = *available;
                }
            }
            Event::ConciergeReserved { reservation } => {
                self.reservations.insert(reservation.id, reservation.clone());
            }
            Event::ConciergeStatusChanged { id, status } => {
                if let Some(mut reservation) = self.reservations.get_mut(id) {
                    reservation.status = *status;
                }
            }
            Event::KeyIssued { key } => {
                self.keys.insert(key.id, key.clone());
            }
            Event::KeyStatusChanged { id, status } => {
                if let Some(mut key) = self.keys.get_mut(id) {
                    key.status = *status;
                }
            }
            Event::KeyWindowChanged {
                id,
                valid_from,
                valid_until,
            } => {
                if let Some(mut key) = self.keys.get_mut(id) {
                    key.valid_from = *valid_from;
                    key.valid_until = *valid_until;
                }
            }
            Event::PointsCredited {
                guest_id, points, ..
            } => {
                self.loyalty
                    .entry(*guest_id)
                    .or_insert_with(|| LoyaltyAccount::empty(*guest_id))
                    .credit(*points);
            }
            Event::PointsRedeemed { guest_id, points } => {
                if let Some(mut account) = self.loyalty.get_mut(guest_id) {
                    account.debit(*points);
                }
            }
            Event::LoyaltyRestored { account } => {
                self.loyalty.insert(account.guest_id, account.clone());
            }
            Event::PreferencesSet { preference } => {
                self.preferences.insert(preference.guest_id, preference.clone());
            }
            _ => {}
        }
    }

    /// Rebuild from the journal on startup. Nothing else holds the room
    /// locks yet, so `try_write` never contends.
    pub fn replay(&self, event: &Event) {
        match room_of(event) {
            Some(room_id) => {
                if let Some(rs) = self.room(&room_id)
                    && let Ok(mut guard) = rs.try_write()
                {
                    self.apply_to_room(&mut guard, event);
                }
            }
            None => self.apply_global(event),
        }
    }
}

/// The room whose lock guards this event, if any.
pub(super) fn room_of(event: &Event) -> Option<Ulid> {
    match event {
        Event::RoomUpdated { id, .. } => Some(*id),
        Event::BookingCreated { booking } => Some(booking.room_id),
        Event::BookingRescheduled { room_id, .. } | Event::BookingStatusChanged { room_id, .. } => {
            Some(*room_id)
        }
        Event::RoomAdded { .. }
        | Event::GuestRegistered { .. }
        | Event::ServiceListed { .. }
        | Event::ServiceAvailabilityChanged { .. }
        | Event::ConciergeReserved { .. }
        | Event::ConciergeStatusChanged { .. }
        | Event::KeyIssued { .. }
        | Event::KeyStatusChanged { .. }
        | Event::KeyWindowChanged { .. }
        | Event::PointsCredited { .. }
        | Event::PointsRedeemed { .. }
        | Event::LoyaltyRestored { .. }
        | Event::PreferencesSet { .. } => None,
    }
}
