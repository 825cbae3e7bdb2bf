use dashmap::mapref::entry::Entry;
use tokio::sync::RwLockWriteGuard;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::Notification;
use crate::pricing::Quote;

use super::conflict::{check_no_overlap, check_not_in_past, today, validate_stay};
use super::lifecycle::{parse_status, transition};
use super::{Engine, EngineError, Entity, SharedRoomState};

/// Loyalty points credited per whole currency unit at checkout.
pub const POINTS_PER_UNIT: u64 = 10;

fn booking_op(op: &'static str) {
    metrics::counter!(crate::observability::BOOKING_OPS_TOTAL, "op" => op).increment(1);
}

fn validate_capacity(capacity: u32) -> Result<(), EngineError> {
    if capacity == 0 {
        return Err(EngineError::Validation("room capacity must be at least 1".into()));
    }
    if capacity > MAX_ROOM_CAPACITY {
        return Err(EngineError::LimitExceeded("room capacity too large"));
    }
    Ok(())
}

impl Engine {
    // ── Rooms & guests ───────────────────────────────────────

    /// Reserve `number` for room `id` before journalling, so concurrent adds
    /// of the same number can't both pass. The shard guard is dropped here.
    fn claim_room_number(&self, number: &str, id: Ulid) -> Result<(), EngineError> {
        match self.store.room_numbers.entry(number.to_string()) {
            Entry::Occupied(_) => Err(EngineError::AlreadyExists(format!("room number {number}"))),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    fn claim_guest_email(&self, key: &str, email: &str, id: Ulid) -> Result<(), EngineError> {
        match self.store.guest_emails.entry(key.to_string()) {
            Entry::Occupied(_) => Err(EngineError::AlreadyExists(format!("guest email {email}"))),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    pub async fn add_room(
        &self,
        id: Ulid,
        number: String,
        room_type: RoomType,
        capacity: u32,
    ) -> Result<RoomInfo, EngineError> {
        let _writing = self.gate.read().await;
        let number = number.trim().to_string();
        if number.is_empty() {
            return Err(EngineError::Validation("room number is required".into()));
        }
        if number.len() > MAX_ROOM_NUMBER_LEN {
            return Err(EngineError::LimitExceeded("room number too long"));
        }
        validate_capacity(capacity)?;
        if self.store.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if self.store.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(format!("room {id}")));
        }
        self.claim_room_number(&number, id)?;

        let event = Event::RoomAdded {
            id,
            number: number.clone(),
            room_type,
            capacity,
        };
        if let Err(e) = self.persist_global(&event).await {
            self.store.room_numbers.remove_if(&number, |_, owner| *owner == id);
            return Err(e);
        }
        metrics::gauge!(crate::observability::ROOMS_ACTIVE).set(self.store.rooms.len() as f64);
        self.availability_changed();
        info!(room = %id, %number, %room_type, "room added");
        Ok(RoomInfo {
            id,
            number,
            room_type,
            capacity,
        })
    }

    pub async fn update_room(&self, id: Ulid, room_type: RoomType, capacity: u32) -> Result<RoomInfo, EngineError> {
        let _writing = self.gate.read().await;
        validate_capacity(capacity)?;
        let rs = self.store.room(&id).ok_or(EngineError::NotFound(Entity::Room, id))?;
        let mut guard = rs.write().await;
        let event = Event::RoomUpdated {
            id,
            room_type,
            capacity,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        let info = guard.info();
        drop(guard);
        self.availability_changed();
        Ok(info)
    }

    pub async fn register_guest(&self, id: Ulid, name: String, email: String) -> Result<Guest, EngineError> {
        let _writing = self.gate.read().await;
        let name = name.trim().to_string();
        let email = email.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::Validation("guest name is required".into()));
        }
        if name.len() > MAX_NAME_LEN || email.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("guest name or email too long"));
        }
        if !email.contains('@') {
            return Err(EngineError::Validation(format!("not an email address: {email}")));
        }
        if self.store.guests.contains_key(&id) {
            return Err(EngineError::AlreadyExists(format!("guest {id}")));
        }
        let email_key = email.to_ascii_lowercase();
        self.claim_guest_email(&email_key, &email, id)?;

        let event = Event::GuestRegistered {
            id,
            name: name.clone(),
            email: email.clone(),
        };
        if let Err(e) = self.persist_global(&event).await {
            self.store.guest_emails.remove_if(&email_key, |_, owner| *owner == id);
            return Err(e);
        }
        info!(guest = %id, "guest registered");
        Ok(Guest { id, name, email })
    }

    // ── Bookings ─────────────────────────────────────────────

    /// Price outside the room lock (a remote quote can be slow), then lock.
    /// If the room changed class meanwhile, price again under the lock.
    async fn quote_and_lock<'a>(
        &self,
        rs: &'a SharedRoomState,
        range: &DateRange,
    ) -> Result<(RwLockWriteGuard<'a, RoomState>, Quote), EngineError> {
        let room_type = rs.read().await.room_type;
        let quote = self.quoter.quote(room_type, range).await?;
        let guard = rs.write().await;
        if guard.room_type == room_type {
            return Ok((guard, quote));
        }
        let quote = self.quoter.quote(guard.room_type, range).await?;
        Ok((guard, quote))
    }

    pub async fn create_booking(
        &self,
        id: Ulid,
        guest_id: Ulid,
        room_id: Ulid,
        range: DateRange,
    ) -> Result<Booking, EngineError> {
        let _writing = self.gate.read().await;
        validate_stay(&range)?;
        let today = today();
        check_not_in_past(&range, today)?;
        if !self.store.guests.contains_key(&guest_id) {
            return Err(EngineError::NotFound(Entity::Guest, guest_id));
        }
        if self.store.booking_rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(format!("booking {id}")));
        }
        let rs = self
            .store
            .room(&room_id)
            .ok_or(EngineError::NotFound(Entity::Room, room_id))?;

        let (mut guard, quote) = self.quote_and_lock(&rs, &range).await?;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }
        check_no_overlap(&guard, &range, None)?;

        let booking = Booking {
            id,
            guest_id,
            room_id,
            range,
            total: quote.total,
            status: BookingStatus::Confirmed,
            created_on: today,
        };
        let event = Event::BookingCreated {
            booking: booking.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(guard);

        self.availability_changed();
        booking_op("create");
        info!(booking = %id, room = %room_id, %range, total = %booking.total, "booking created");
        self.publish(Notification::BookingCreated {
            booking: booking.clone(),
        })
        .await;
        Ok(booking)
    }

    /// Move a confirmed booking to new dates and re-price it.
    pub async fn update_booking_dates(&self, id: Ulid, range: DateRange) -> Result<Booking, EngineError> {
        let _writing = self.gate.read().await;
        validate_stay(&range)?;
        let room_id = self
            .store
            .room_for_booking(&id)
            .ok_or(EngineError::NotFound(Entity::Booking, id))?;
        let rs = self
            .store
            .room(&room_id)
            .ok_or(EngineError::NotFound(Entity::Room, room_id))?;
        let (mut guard, quote) = self.quote_and_lock(&rs, &range).await?;
        let current = guard
            .booking(id)
            .ok_or(EngineError::NotFound(Entity::Booking, id))?;
        if current.status != BookingStatus::Confirmed {
            return Err(EngineError::Validation(format!(
                "only confirmed bookings can change dates (booking is {})",
                current.status
            )));
        }
        check_no_overlap(&guard, &range, Some(id))?;

        let event = Event::BookingRescheduled {
            id,
            room_id,
            range,
            total: quote.total,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        {
            let _amenities = self.amenities.lock().await;
            self.move_keys_for(id, &range).await?;
        }
        let updated = guard
            .booking(id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Booking, id))?;
        drop(guard);

        self.availability_changed();
        booking_op("reschedule");
        info!(booking = %id, %range, "booking rescheduled");
        Ok(updated)
    }

    pub async fn update_booking_status(&self, id: Ulid, target: &str) -> Result<Booking, EngineError> {
        let _writing = self.gate.read().await;
        let to = parse_status(target)?;
        self.change_status(id, to).await
    }

    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let _writing = self.gate.read().await;
        self.change_status(id, BookingStatus::Cancelled).await
    }

    /// Caller holds the gate.
    async fn change_status(&self, id: Ulid, to: BookingStatus) -> Result<Booking, EngineError> {
        let mut guard = self.resolve_booking_write(&id).await?;
        let current = guard
            .booking(id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Booking, id))?;
        let from = current.status;
        transition(from, to)?;
        if from == to {
            // Re-cancelling: nothing to record or announce.
            return Ok(current);
        }

        let event = Event::BookingStatusChanged {
            id,
            room_id: current.room_id,
            status: to,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        if matches!(to, BookingStatus::Cancelled | BookingStatus::CheckedOut) {
            let _amenities = self.amenities.lock().await;
            self.revoke_keys_for(id).await?;
            if to == BookingStatus::Cancelled {
                self.cancel_open_reservations(id).await?;
            } else {
                let points = current.total.whole_units() * POINTS_PER_UNIT;
                if points > 0 {
                    self.persist_global(&Event::PointsCredited {
                        guest_id: current.guest_id,
                        booking_id: id,
                        points,
                    })
                    .await?;
                }
            }
        }
        drop(guard);

        self.availability_changed();
        booking_op(to.as_str());
        info!(booking = %id, %from, %to, "booking status changed");
        if to == BookingStatus::Cancelled {
            self.publish(Notification::BookingCancelled {
                booking_id: id,
                room_id: current.room_id,
                guest_id: current.guest_id,
            })
            .await;
        }
        Ok(Booking { status: to, ..current })
    }

    // ── Compaction ───────────────────────────────────────────

    /// Rewrite the journal as the minimal event list that rebuilds current state.
    pub async fn compact_journal(&self) -> Result<usize, EngineError> {
        let _exclusive = self.gate.write().await;
        let mut events = Vec::new();

        let mut rooms = Vec::new();
        for rs in self.store.room_handles() {
            rooms.push(rs.read().await.clone());
        }
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        for room in &rooms {
            events.push(Event::RoomAdded {
                id: room.id,
                number: room.number.clone(),
                room_type: room.room_type,
                capacity: room.capacity,
            });
        }
        for entry in self.store.guests.iter() {
            let guest = entry.value();
            events.push(Event::GuestRegistered {
                id: guest.id,
                name: guest.name.clone(),
                email: guest.email.clone(),
            });
        }
        for entry in self.store.services.iter() {
            events.push(Event::ServiceListed {
                service: entry.value().clone(),
            });
        }
        for room in rooms {
            for booking in room.bookings {
                events.push(Event::BookingCreated { booking });
            }
        }
        for entry in self.store.reservations.iter() {
            events.push(Event::ConciergeReserved {
                reservation: entry.value().clone(),
            });
        }
        for entry in self.store.keys.iter() {
            events.push(Event::KeyIssued {
                key: entry.value().clone(),
            });
        }
        for entry in self.store.loyalty.iter() {
            events.push(Event::LoyaltyRestored {
                account: entry.value().clone(),
            });
        }
        for entry in self.store.preferences.iter() {
            events.push(Event::PreferencesSet {
                preference: entry.value().clone(),
            });
        }

        let count = events.len();
        self.rewrite_journal(events).await?;
        info!(events = count, "journal compacted");
        Ok(count)
    }

    /// Compact once enough appends have piled up since the last rewrite.
    pub async fn compact_if_needed(&self, threshold: u64) -> Result<bool, EngineError> {
        if self.appends_since_rewrite().await? < threshold {
            return Ok(false);
        }
        self.compact_journal().await?;
        Ok(true)
    }
}
