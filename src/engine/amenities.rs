use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError, Entity};

fn ensure_serviceable(booking: &Booking) -> Result<(), EngineError> {
    if booking.status.is_active() {
        Ok(())
    } else {
        Err(EngineError::Validation(format!("booking {} is {}", booking.id, booking.status)))
    }
}

impl Engine {
    // ── Concierge ────────────────────────────────────────────

    pub async fn list_concierge_service(
        &self,
        id: Ulid,
        name: String,
        price: Money,
        available: bool,
    ) -> Result<ConciergeService, EngineError> {
        let _writing = self.gate.read().await;
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::Validation("service name is required".into()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("service name too long"));
        }
        if self.store.services.contains_key(&id) {
            return Err(EngineError::AlreadyExists(format!("concierge service {id}")));
        }
        let service = ConciergeService {
            id,
            name,
            price,
            available,
        };
        self.persist_global(&Event::ServiceListed {
            service: service.clone(),
        })
        .await?;
        Ok(service)
    }

    pub async fn set_service_availability(&self, id: Ulid, available: bool) -> Result<ConciergeService, EngineError> {
        let _writing = self.gate.read().await;
        if !self.store.services.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Service, id));
        }
        self.persist_global(&Event::ServiceAvailabilityChanged { id, available })
            .await?;
        self.store
            .services
            .get(&id)
            .map(|s| s.value().clone())
            .ok_or(EngineError::NotFound(Entity::Service, id))
    }

    pub async fn reserve_concierge(
        &self,
        id: Ulid,
        booking_id: Ulid,
        service_id: Ulid,
        scheduled_for: NaiveDateTime,
        party_size: u32,
    ) -> Result<ConciergeReservation, EngineError> {
        let _writing = self.gate.read().await;
        if party_size == 0 {
            return Err(EngineError::Validation("party size must be at least 1".into()));
        }
        if party_size > MAX_PARTY_SIZE {
            return Err(EngineError::LimitExceeded("party too large"));
        }
        // Holding the room lock keeps the booking from being cancelled underneath us.
        let guard = self.resolve_booking_write(&booking_id).await?;
        let booking = guard
            .booking(booking_id)
            .ok_or(EngineError::NotFound(Entity::Booking, booking_id))?;
        ensure_serviceable(booking)?;
        let service_available = self
            .store
            .services
            .get(&service_id)
            .map(|s| s.available)
            .ok_or(EngineError::NotFound(Entity::Service, service_id))?;
        if !service_available {
            return Err(EngineError::Unavailable(service_id));
        }
        if self.store.reservations.contains_key(&id) {
            return Err(EngineError::AlreadyExists(format!("concierge reservation {id}")));
        }

        let reservation = ConciergeReservation {
            id,
            booking_id,
            service_id,
            scheduled_for,
            party_size,
            status: ConciergeStatus::Requested,
        };
        self.persist_global(&Event::ConciergeReserved {
            reservation: reservation.clone(),
        })
        .await?;
        drop(guard);
        info!(reservation = %id, booking = %booking_id, service = %service_id, "concierge reserved");
        Ok(reservation)
    }

    pub async fn update_concierge_status(&self, id: Ulid, status: &str) -> Result<ConciergeReservation, EngineError> {
        let _writing = self.gate.read().await;
        let next: ConciergeStatus = status.parse()?;
        let _amenities = self.amenities.lock().await;
        let current = self
            .store
            .reservations
            .get(&id)
            .map(|r| r.status)
            .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
        if !current.can_become(next) {
            return Err(EngineError::Validation(format!(
                "concierge reservation cannot move from {current:?} to {next:?}"
            )));
        }
        self.persist_global(&Event::ConciergeStatusChanged { id, status: next })
            .await?;
        self.store
            .reservations
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(EngineError::NotFound(Entity::Reservation, id))
    }

    /// Caller holds the booking's room lock and `amenities`.
    pub(super) async fn cancel_open_reservations(&self, booking_id: Ulid) -> Result<(), EngineError> {
        let open: Vec<Ulid> = self
            .store
            .reservations
            .iter()
            .filter(|r| r.booking_id == booking_id && !r.status.is_terminal())
            .map(|r| r.id)
            .collect();
        for id in open {
            self.persist_global(&Event::ConciergeStatusChanged {
                id,
                status: ConciergeStatus::Cancelled,
            })
            .await?;
        }
        Ok(())
    }

    // ── Digital keys ─────────────────────────────────────────

    pub async fn issue_digital_key(&self, id: Ulid, booking_id: Ulid) -> Result<DigitalKey, EngineError> {
        let _writing = self.gate.read().await;
        let guard = self.resolve_booking_write(&booking_id).await?;
        let booking = guard
            .booking(booking_id)
            .ok_or(EngineError::NotFound(Entity::Booking, booking_id))?;
        ensure_serviceable(booking)?;
        let range = booking.range;

        let _amenities = self.amenities.lock().await;
        let active = self
            .store
            .keys
            .iter()
            .filter(|k| k.booking_id == booking_id && k.status == KeyStatus::Active)
            .count();
        if active >= MAX_KEYS_PER_BOOKING {
            return Err(EngineError::LimitExceeded("too many active keys for booking"));
        }
        if self.store.keys.contains_key(&id) {
            return Err(EngineError::AlreadyExists(format!("digital key {id}")));
        }

        let key = DigitalKey {
            id,
            booking_id,
            code: Ulid::new().to_string(),
            valid_from: range.check_in(),
            valid_until: range.check_out(),
            status: KeyStatus::Active,
        };
        self.persist_global(&Event::KeyIssued { key: key.clone() }).await?;
        drop(guard);
        info!(key = %id, booking = %booking_id, "digital key issued");
        Ok(key)
    }

    pub async fn revoke_digital_key(&self, id: Ulid) -> Result<DigitalKey, EngineError> {
        let _writing = self.gate.read().await;
        let _amenities = self.amenities.lock().await;
        let status = self
            .store
            .keys
            .get(&id)
            .map(|k| k.status)
            .ok_or(EngineError::NotFound(Entity::Key, id))?;
        if status == KeyStatus::Active {
            self.persist_global(&Event::KeyStatusChanged {
                id,
                status: KeyStatus::Revoked,
            })
            .await?;
        }
        self.store
            .keys
            .get(&id)
            .map(|k| k.value().clone())
            .ok_or(EngineError::NotFound(Entity::Key, id))
    }

    /// Caller holds the booking's room lock and `amenities`.
    pub(super) async fn revoke_keys_for(&self, booking_id: Ulid) -> Result<(), EngineError> {
        let active: Vec<Ulid> = self
            .store
            .keys
            .iter()
            .filter(|k| k.booking_id == booking_id && k.status == KeyStatus::Active)
            .map(|k| k.id)
            .collect();
        for id in active {
            self.persist_global(&Event::KeyStatusChanged {
                id,
                status: KeyStatus::Revoked,
            })
            .await?;
        }
        Ok(())
    }

    /// Caller holds the booking's room lock and `amenities`.
    pub(super) async fn move_keys_for(&self, booking_id: Ulid, range: &DateRange) -> Result<(), EngineError> {
        let active: Vec<Ulid> = self
            .store
            .keys
            .iter()
            .filter(|k| k.booking_id == booking_id && k.status == KeyStatus::Active)
            .map(|k| k.id)
            .collect();
        for id in active {
            self.persist_global(&Event::KeyWindowChanged {
                id,
                valid_from: range.check_in(),
                valid_until: range.check_out(),
            })
            .await?;
        }
        Ok(())
    }

    /// Whether `code` opens a door on `on`.
    pub fn validate_digital_key(&self, code: &str, on: NaiveDate) -> bool {
        self.store
            .keys
            .iter()
            .any(|k| k.code == code && k.opens_on(on))
    }

    /// Mark every active key whose last valid day is before `today` as expired.
    pub async fn expire_keys(&self, today: NaiveDate) -> Result<Vec<Ulid>, EngineError> {
        let _writing = self.gate.read().await;
        let _amenities = self.amenities.lock().await;
        let stale: Vec<Ulid> = self
            .store
            .keys
            .iter()
            .filter(|k| k.status == KeyStatus::Active && k.valid_until < today)
            .map(|k| k.id)
            .collect();
        for id in &stale {
            self.persist_global(&Event::KeyStatusChanged {
                id: *id,
                status: KeyStatus::Expired,
            })
            .await?;
        }
        if stale.is_empty() {
            debug!("no digital keys to expire");
        } else {
            metrics::counter!(crate::observability::KEYS_EXPIRED_TOTAL).increment(stale.len() as u64);
            info!(count = stale.len(), "digital keys expired");
        }
        Ok(stale)
    }

    // ── Loyalty & preferences ────────────────────────────────

    pub async fn redeem_points(&self, guest_id: Ulid, points: u64) -> Result<LoyaltyAccount, EngineError> {
        let _writing = self.gate.read().await;
        if points == 0 {
            return Err(EngineError::Validation("redeem at least one point".into()));
        }
        if !self.store.guests.contains_key(&guest_id) {
            return Err(EngineError::NotFound(Entity::Guest, guest_id));
        }
        let _amenities = self.amenities.lock().await;
        let balance = self.store.loyalty.get(&guest_id).map_or(0, |a| a.points);
        if balance < points {
            return Err(EngineError::Validation(format!(
                "insufficient points: balance {balance}, requested {points}"
            )));
        }
        self.persist_global(&Event::PointsRedeemed { guest_id, points })
            .await?;
        Ok(self.account_or_empty(guest_id))
    }

    pub async fn set_preferences(&self, preference: StayPreference) -> Result<StayPreference, EngineError> {
        let _writing = self.gate.read().await;
        if !self.store.guests.contains_key(&preference.guest_id) {
            return Err(EngineError::NotFound(Entity::Guest, preference.guest_id));
        }
        if let Some(notes) = &preference.notes
            && notes.chars().count() > MAX_NOTES_LEN
        {
            return Err(EngineError::LimitExceeded("preference notes too long"));
        }
        self.persist_global(&Event::PreferencesSet {
            preference: preference.clone(),
        })
        .await?;
        Ok(preference)
    }

    pub(super) fn account_or_empty(&self, guest_id: Ulid) -> LoyaltyAccount {
        self.store
            .loyalty
            .get(&guest_id)
            .map(|a| a.value().clone())
            .unwrap_or_else(|| LoyaltyAccount::empty(guest_id))
    }
}
