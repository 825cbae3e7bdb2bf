use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rust_decimal_macros::dec;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use super::conflict::today;
use super::*;
use crate::cache::{MemoryCache, availability_key};
use crate::notify::BroadcastPublisher;
use crate::pricing::{self, FallbackQuoter, LocalQuoter, Quote, QuoteError, QuoteSource};

fn test_journal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("staybook_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn in_days(n: u64) -> NaiveDate {
    today().checked_add_days(Days::new(n)).unwrap()
}

fn stay(from: u64, to: u64) -> DateRange {
    DateRange::new(in_days(from), in_days(to)).unwrap()
}

fn local_engine(name: &str) -> Engine {
    Engine::open(test_journal_path(name), Collaborators::local()).unwrap()
}

/// One guest, one room of the given class.
async fn hotel(engine: &Engine, room_type: RoomType) -> (Ulid, Ulid) {
    let guest = Ulid::new();
    let room = Ulid::new();
    engine
        .register_guest(guest, "Ada Lovelace".into(), format!("{guest}@example.com"))
        .await
        .unwrap();
    engine
        .add_room(room, format!("R{}", &room.to_string()[20..]), room_type, 2)
        .await
        .unwrap();
    (guest, room)
}

struct BrokenQuoter;

#[async_trait]
impl RateQuoter for BrokenQuoter {
    async fn quote(&self, _room_type: RoomType, _range: &DateRange) -> Result<Quote, QuoteError> {
        Err(QuoteError::Transport("connection refused".into()))
    }
}

/// Holds the first quote until released; later quotes go straight through.
#[derive(Default)]
struct GatedQuoter {
    held: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl RateQuoter for GatedQuoter {
    async fn quote(&self, room_type: RoomType, range: &DateRange) -> Result<Quote, QuoteError> {
        if !self.held.swap(true, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        LocalQuoter.quote(room_type, range).await
    }
}

// ── Rooms & guests ───────────────────────────────────────

#[tokio::test]
async fn duplicate_room_number_rejected() {
    let engine = local_engine("dup_room.journal");
    engine.add_room(Ulid::new(), "101".into(), RoomType::Standard, 2).await.unwrap();
    let err = engine
        .add_room(Ulid::new(), " 101 ".into(), RoomType::Suite, 4)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn guest_email_validated_and_unique() {
    let engine = local_engine("guest_email.journal");
    let bad = engine
        .register_guest(Ulid::new(), "Bob".into(), "bob-at-example".into())
        .await;
    assert_eq!(bad.unwrap_err().kind(), ErrorKind::Validation);

    engine
        .register_guest(Ulid::new(), "Bob".into(), "bob@example.com".into())
        .await
        .unwrap();
    let dup = engine
        .register_guest(Ulid::new(), "Robert".into(), "BOB@example.com".into())
        .await;
    assert_eq!(dup.unwrap_err().kind(), ErrorKind::Conflict);
    assert!(engine.find_guest_by_email("Bob@Example.com").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_room_number_one_wins() {
    let engine = Arc::new(local_engine("race_room_number.journal"));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine.add_room(Ulid::new(), "404".into(), RoomType::Standard, 2).await
            })
        })
        .collect();
    let mut won = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => won += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(engine.room_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_email_one_wins() {
    let engine = Arc::new(local_engine("race_email.journal"));
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let email = if i % 2 == 0 { "Eve@example.com" } else { "eve@EXAMPLE.com" };
                engine.register_guest(Ulid::new(), "Eve".into(), email.into()).await
            })
        })
        .collect();
    let mut won = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => won += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(engine.list_guests().len(), 1);
}

#[tokio::test]
async fn update_room_changes_class() {
    let engine = local_engine("update_room.journal");
    let (_, room) = hotel(&engine, RoomType::Standard).await;
    let info = engine.update_room(room, RoomType::Deluxe, 3).await.unwrap();
    assert_eq!(info.room_type, RoomType::Deluxe);
    assert_eq!(engine.get_room(room).await.unwrap().capacity, 3);
    assert_err!(engine.update_room(room, RoomType::Deluxe, 0).await);
}

// ── Booking overlap ──────────────────────────────────────

#[tokio::test]
async fn booking_priced_by_quoter() {
    let engine = local_engine("priced.journal");
    let (guest, room) = hotel(&engine, RoomType::Deluxe).await;
    let range = stay(10, 13);
    let booking = engine.create_booking(Ulid::new(), guest, room, range).await.unwrap();
    let expected = pricing::calculate(RoomType::Deluxe, &range).unwrap();
    assert_eq!(booking.total, expected.total);
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.created_on, today());
}

#[tokio::test]
async fn overlapping_booking_rejected_adjacent_accepted() {
    let engine = local_engine("overlap.journal");
    let (guest, room) = hotel(&engine, RoomType::Standard).await;
    let first = engine
        .create_booking(Ulid::new(), guest, room, stay(5, 8))
        .await
        .unwrap();

    match engine.create_booking(Ulid::new(), guest, room, stay(7, 9)).await {
        Err(EngineError::Conflict(id)) => assert_eq!(id, first.id),
        other => panic!("expected conflict, got {other:?}"),
    }
    // Checkout morning is the next guest's check-in.
    assert_ok!(engine.create_booking(Ulid::new(), guest, room, stay(8, 10)).await);
    assert_ok!(engine.create_booking(Ulid::new(), guest, room, stay(3, 5)).await);
}

#[tokio::test]
async fn past_check_in_rejected() {
    let engine = local_engine("past.journal");
    let (guest, room) = hotel(&engine, RoomType::Standard).await;
    let yesterday = today().checked_sub_days(Days::new(1)).unwrap();
    let range = DateRange::new(yesterday, in_days(2)).unwrap();
    let err = engine.create_booking(Ulid::new(), guest, room, range).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_ok!(engine.create_booking(Ulid::new(), guest, room, stay(0, 1)).await);
}

#[tokio::test]
async fn missing_guest_or_room_is_not_found() {
    let engine = local_engine("missing.journal");
    let (guest, room) = hotel(&engine, RoomType::Standard).await;
    let no_guest = engine.create_booking(Ulid::new(), Ulid::new(), room, stay(1, 2)).await;
    let no_room = engine.create_booking(Ulid::new(), guest, Ulid::new(), stay(1, 2)).await;
    assert!(matches!(no_guest, Err(EngineError::NotFound(Entity::Guest, _))));
    assert!(matches!(no_room, Err(EngineError::NotFound(Entity::Room, _))));
}

#[tokio::test]
async fn reschedule_ignores_itself_but_not_neighbours() {
    let engine = local_engine("reschedule.journal");
    let (guest, room) = hotel(&engine, RoomType::Suite).await;
    let a = engine.create_booking(Ulid::new(), guest, room, stay(10, 14)).await.unwrap();
    let b = engine.create_booking(Ulid::new(), guest, room, stay(20, 22)).await.unwrap();

    let moved = engine.update_booking_dates(a.id, stay(11, 15)).await.unwrap();
    assert_eq!(moved.range, stay(11, 15));
    assert_eq!(moved.total, pricing::calculate(RoomType::Suite, &stay(11, 15)).unwrap().total);

    match engine.update_booking_dates(a.id, stay(18, 21)).await {
        Err(EngineError::Conflict(id)) => assert_eq!(id, b.id),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn reschedule_moves_active_keys() {
    let path = test_journal_path("reschedule_keys.journal");
    let (booking, code) = {
        let engine = Engine::open(path.clone(), Collaborators::local()).unwrap();
        let (guest, room) = hotel(&engine, RoomType::Standard).await;
        let b = engine.create_booking(Ulid::new(), guest, room, stay(2, 4)).await.unwrap();
        let key = engine.issue_digital_key(Ulid::new(), b.id).await.unwrap();

        engine.update_booking_dates(b.id, stay(6, 9)).await.unwrap();
        assert!(engine.validate_digital_key(&key.code, in_days(7)));
        assert!(!engine.validate_digital_key(&key.code, in_days(3)));
        (b.id, key.code)
    };

    let engine = Engine::open(path, Collaborators::local()).unwrap();
    let keys = engine.list_digital_keys(booking).unwrap();
    assert_eq!((keys[0].valid_from, keys[0].valid_until), (in_days(6), in_days(9)));
    assert!(engine.validate_digital_key(&code, in_days(9)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn class_change_while_quoting_prices_the_new_class() {
    let quoter = Arc::new(GatedQuoter::default());
    let engine = Arc::new(
        Engine::open(
            test_journal_path("requote.journal"),
            Collaborators {
                quoter: quoter.clone(),
                ..Collaborators::local()
            },
        )
        .unwrap(),
    );
    let (guest, room) = hotel(&engine, RoomType::Standard).await;

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.create_booking(Ulid::new(), guest, room, stay(10, 12)).await }
    });
    quoter.entered.notified().await;
    engine.update_room(room, RoomType::Suite, 2).await.unwrap();
    quoter.release.notify_one();

    let booking = pending.await.unwrap().unwrap();
    let suite = pricing::calculate(RoomType::Suite, &stay(10, 12)).unwrap();
    assert_eq!(booking.total, suite.total);
}

#[tokio::test]
async fn reschedule_requires_confirmed() {
    let engine = local_engine("reschedule_status.journal");
    let (guest, room) = hotel(&engine, RoomType::Standard).await;
    let b = engine.create_booking(Ulid::new(), guest, room, stay(0, 3)).await.unwrap();
    engine.update_booking_status(b.id, "checked_in").await.unwrap();
    let err = engine.update_booking_dates(b.id, stay(1, 4)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_room_exactly_one_wins() {
    let engine = Arc::new(local_engine("race.journal"));
    let (guest, room) = hotel(&engine, RoomType::Standard).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.create_booking(Ulid::new(), guest, room, stay(30, 33)).await
        }));
    }
    let mut won = 0;
    let mut conflicts = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => won += 1,
            Err(EngineError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(engine.list_bookings(BookingFilter::default()).await.len(), 1);
}

// ── Lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn unknown_status_is_validation_error() {
    let engine = local_engine("unknown_status.journal");
    let (guest, room) = hotel(&engine, RoomType::Standard).await;
    let b = engine.create_booking(Ulid::new(), guest, room, stay(1, 2)).await.unwrap();
    let err = engine.update_booking_status(b.id, "teleported").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn invalid_transition_rejected() {
    let engine = local_engine("bad_transition.journal");
    let (guest, room) = hotel(&engine, RoomType::Standard).await;
    let b = engine.create_booking(Ulid::new(), guest, room, stay(1, 2)).await.unwrap();
    engine.update_booking_status(b.id, "CheckedOut").await.unwrap();
    assert!(matches!(
        engine.update_booking_status(b.id, "checked-in").await,
        Err(EngineError::InvalidTransition {
            from: BookingStatus::CheckedOut,
            to: BookingStatus::CheckedIn
        })
    ));
}

#[tokio::test]
async fn cancel_frees_dates() {
    let engine = local_engine("cancel_frees.journal");
    let (guest, room) = hotel(&engine, RoomType::Standard).await;
    let b = engine.create_booking(Ulid::new(), guest, room, stay(4, 6)).await.unwrap();
    let cancelled = engine.cancel_booking(b.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    // Cancelling again is a quiet no-op.
    assert_eq!(engine.cancel_booking(b.id).await.unwrap().status, BookingStatus::Cancelled);
    assert_ok!(engine.create_booking(Ulid::new(), guest, room, stay(4, 6)).await);
    // History kept.
    let all = engine
        .list_bookings(BookingFilter {
            room_id: Some(room),
            ..Default::default()
        })
        .await;
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn checkout_credits_points_and_revokes_keys() {
    let engine = local_engine("checkout.journal");
    let (guest, room) = hotel(&engine, RoomType::Suite).await;
    let b = engine.create_booking(Ulid::new(), guest, room, stay(0, 2)).await.unwrap();
    let key = engine.issue_digital_key(Ulid::new(), b.id).await.unwrap();
    assert!(engine.validate_digital_key(&key.code, in_days(1)));

    engine.update_booking_status(b.id, "checked_in").await.unwrap();
    engine.update_booking_status(b.id, "checked_out").await.unwrap();

    let account = engine.loyalty_account(guest).unwrap();
    assert_eq!(account.points, b.total.whole_units() * POINTS_PER_UNIT);
    assert_eq!(account.lifetime_points, account.points);
    assert!(!engine.validate_digital_key(&key.code, in_days(1)));
    let keys = engine.list_digital_keys(b.id).unwrap();
    assert_eq!(keys[0].status, KeyStatus::Revoked);
}

// ── Cache & notifications ────────────────────────────────

#[tokio::test]
async fn booking_mutation_invalidates_availability_cache() {
    let cache = Arc::new(MemoryCache::new(Duration::from_secs(300)));
    let collaborators = Collaborators {
        cache: cache.clone(),
        ..Collaborators::local()
    };
    let engine = Engine::open(test_journal_path("cache.journal"), collaborators).unwrap();
    let (guest, room) = hotel(&engine, RoomType::Standard).await;

    let range = stay(40, 42);
    let before = engine.search_available(range, None, None).await.unwrap();
    assert_eq!(before.len(), 1);
    assert!(cache.get(&availability_key(&range, None, None)).is_some());

    engine.create_booking(Ulid::new(), guest, room, range).await.unwrap();
    assert!(cache.is_empty());
    assert!(engine.search_available(range, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_filters_by_type_and_capacity() {
    let engine = local_engine("search.journal");
    engine.add_room(Ulid::new(), "101".into(), RoomType::Standard, 2).await.unwrap();
    engine.add_room(Ulid::new(), "201".into(), RoomType::Deluxe, 3).await.unwrap();
    engine.add_room(Ulid::new(), "301".into(), RoomType::Suite, 4).await.unwrap();
    let range = stay(3, 5);

    let deluxe = engine.search_available(range, Some(RoomType::Deluxe), None).await.unwrap();
    assert_eq!(deluxe.iter().map(|r| r.number.as_str()).collect::<Vec<_>>(), ["201"]);
    let big = engine.search_available(range, None, Some(3)).await.unwrap();
    assert_eq!(big.iter().map(|r| r.number.as_str()).collect::<Vec<_>>(), ["201", "301"]);

    let wide = engine.search_available(stay(1, 200), None, None).await;
    assert!(matches!(wide, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn created_and_cancelled_are_published() {
    let hub = Arc::new(BroadcastPublisher::new());
    let mut rx = hub.subscribe();
    let collaborators = Collaborators {
        events: hub.clone(),
        ..Collaborators::local()
    };
    let engine = Engine::open(test_journal_path("publish.journal"), collaborators).unwrap();
    let (guest, room) = hotel(&engine, RoomType::Standard).await;

    let b = engine.create_booking(Ulid::new(), guest, room, stay(2, 3)).await.unwrap();
    engine.cancel_booking(b.id).await.unwrap();

    assert_eq!(rx.recv().await.unwrap(), Notification::BookingCreated { booking: b.clone() });
    assert_eq!(
        rx.recv().await.unwrap(),
        Notification::BookingCancelled {
            booking_id: b.id,
            room_id: room,
            guest_id: guest
        }
    );
}

#[tokio::test]
async fn failing_quoter_falls_back_to_flat_rate() {
    let collaborators = Collaborators {
        quoter: Arc::new(FallbackQuoter::new(Arc::new(BrokenQuoter), Duration::from_millis(200))),
        ..Collaborators::local()
    };
    let engine = Engine::open(test_journal_path("fallback.journal"), collaborators).unwrap();
    let (guest, room) = hotel(&engine, RoomType::Suite).await;

    let b = engine.create_booking(Ulid::new(), guest, room, stay(1, 4)).await.unwrap();
    assert_eq!(b.total.amount(), dec!(300));
    let quote = engine.quote(RoomType::Suite, &stay(1, 4)).await.unwrap();
    assert_eq!(quote.source, QuoteSource::Fallback);
}

// ── Amenities ────────────────────────────────────────────

#[tokio::test]
async fn concierge_flow() {
    let engine = local_engine("concierge.journal");
    let (guest, room) = hotel(&engine, RoomType::Deluxe).await;
    let b = engine.create_booking(Ulid::new(), guest, room, stay(1, 3)).await.unwrap();
    let spa = Ulid::new();
    engine
        .list_concierge_service(spa, "Spa".into(), Money::new(dec!(80)).unwrap(), true)
        .await
        .unwrap();
    let at = in_days(1).and_hms_opt(15, 0, 0).unwrap();

    assert_err!(engine.reserve_concierge(Ulid::new(), b.id, spa, at, 0).await);
    let r = engine.reserve_concierge(Ulid::new(), b.id, spa, at, 2).await.unwrap();
    assert_eq!(r.status, ConciergeStatus::Requested);

    let confirmed = engine.update_concierge_status(r.id, "confirmed").await.unwrap();
    assert_eq!(confirmed.status, ConciergeStatus::Confirmed);
    assert_eq!(
        engine.update_concierge_status(r.id, "requested").await.unwrap_err().kind(),
        ErrorKind::Validation
    );

    engine.set_service_availability(spa, false).await.unwrap();
    assert!(matches!(
        engine.reserve_concierge(Ulid::new(), b.id, spa, at, 1).await,
        Err(EngineError::Unavailable(id)) if id == spa
    ));

    // Cancelling the stay cancels open reservations.
    engine.cancel_booking(b.id).await.unwrap();
    let list = engine.list_concierge_reservations(b.id).unwrap();
    assert_eq!(list[0].status, ConciergeStatus::Cancelled);
}

#[tokio::test]
async fn keys_need_live_booking_and_expire() {
    let engine = local_engine("keys.journal");
    let (guest, room) = hotel(&engine, RoomType::Standard).await;
    let b = engine.create_booking(Ulid::new(), guest, room, stay(0, 2)).await.unwrap();
    let key = engine.issue_digital_key(Ulid::new(), b.id).await.unwrap();
    assert_eq!(key.valid_from, in_days(0));
    assert_eq!(key.valid_until, in_days(2));
    assert!(!engine.validate_digital_key(&key.code, in_days(3)));
    assert!(!engine.validate_digital_key("not-a-key", in_days(1)));

    let expired = engine.expire_keys(in_days(3)).await.unwrap();
    assert_eq!(expired, vec![key.id]);
    assert!(engine.expire_keys(in_days(3)).await.unwrap().is_empty());

    engine.cancel_booking(b.id).await.unwrap();
    let err = engine.issue_digital_key(Ulid::new(), b.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn redeem_needs_balance() {
    let engine = local_engine("redeem.journal");
    let (guest, room) = hotel(&engine, RoomType::Standard).await;
    assert_eq!(engine.loyalty_account(guest).unwrap().tier, LoyaltyTier::Bronze);
    assert_err!(engine.redeem_points(guest, 1).await);

    let b = engine.create_booking(Ulid::new(), guest, room, stay(0, 1)).await.unwrap();
    engine.update_booking_status(b.id, "checkedout").await.unwrap();
    let earned = engine.loyalty_account(guest).unwrap().points;
    let after = engine.redeem_points(guest, earned).await.unwrap();
    assert_eq!(after.points, 0);
    assert_eq!(after.lifetime_points, earned);
}

#[tokio::test]
async fn preferences_roundtrip_and_limits() {
    let engine = local_engine("prefs.journal");
    let (guest, _) = hotel(&engine, RoomType::Standard).await;
    assert_eq!(engine.get_preferences(guest).unwrap(), None);
    let pref = StayPreference {
        guest_id: guest,
        bed: Some(BedPreference::King),
        floor: Some(FloorPreference::High),
        quiet_room: true,
        notes: Some("extra pillows".into()),
    };
    engine.set_preferences(pref.clone()).await.unwrap();
    assert_eq!(engine.get_preferences(guest).unwrap(), Some(pref.clone()));

    let noisy = StayPreference {
        notes: Some("x".repeat(crate::limits::MAX_NOTES_LEN + 1)),
        ..pref
    };
    assert!(matches!(engine.set_preferences(noisy).await, Err(EngineError::LimitExceeded(_))));
}

// ── Durability ───────────────────────────────────────────

async fn populate(engine: &Engine) -> (Ulid, Ulid, Ulid) {
    let (guest, room) = hotel(engine, RoomType::Deluxe).await;
    let kept = engine.create_booking(Ulid::new(), guest, room, stay(3, 5)).await.unwrap();
    let gone = engine.create_booking(Ulid::new(), guest, room, stay(6, 8)).await.unwrap();
    engine.cancel_booking(gone.id).await.unwrap();
    engine.update_booking_dates(kept.id, stay(2, 5)).await.unwrap();
    engine.issue_digital_key(Ulid::new(), kept.id).await.unwrap();
    let finished = engine.create_booking(Ulid::new(), guest, room, stay(10, 11)).await.unwrap();
    engine.update_booking_status(finished.id, "checked_out").await.unwrap();
    engine
        .set_preferences(StayPreference {
            guest_id: guest,
            bed: Some(BedPreference::Twin),
            floor: None,
            quiet_room: false,
            notes: None,
        })
        .await
        .unwrap();
    (guest, room, kept.id)
}

async fn assert_populated(engine: &Engine, guest: Ulid, room: Ulid, kept: Ulid) {
    assert_eq!(engine.get_room(room).await.unwrap().room_type, RoomType::Deluxe);
    assert_eq!(engine.get_guest(guest).unwrap().name, "Ada Lovelace");
    let bookings = engine
        .list_bookings(BookingFilter {
            guest_id: Some(guest),
            ..Default::default()
        })
        .await;
    assert_eq!(bookings.len(), 3);
    assert_eq!(engine.get_booking(kept).await.unwrap().range, stay(2, 5));
    assert_eq!(engine.list_digital_keys(kept).unwrap().len(), 1);
    assert!(engine.loyalty_account(guest).unwrap().points > 0);
    assert_eq!(
        engine.get_preferences(guest).unwrap().and_then(|p| p.bed),
        Some(BedPreference::Twin)
    );
    // The cancelled booking's nights are bookable again.
    assert_eq!(engine.search_available(stay(6, 8), None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn journal_replay_restores_state() {
    let path = test_journal_path("replay.journal");
    let (guest, room, kept) = {
        let engine = Engine::open(path.clone(), Collaborators::local()).unwrap();
        populate(&engine).await
    };
    let engine = Engine::open(path, Collaborators::local()).unwrap();
    assert_populated(&engine, guest, room, kept).await;
}

#[tokio::test]
async fn restart_after_torn_tail_keeps_later_writes() {
    let path = test_journal_path("torn_tail_restart.journal");
    let first = Ulid::new();
    {
        let engine = Engine::open(path.clone(), Collaborators::local()).unwrap();
        engine.add_room(first, "1".into(), RoomType::Standard, 2).await.unwrap();
    }
    {
        // Half a frame, as left by a crash mid-append.
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[40, 0, 0, 0, 1, 2, 3]).unwrap();
    }
    let second = Ulid::new();
    {
        let engine = Engine::open(path.clone(), Collaborators::local()).unwrap();
        assert_eq!(engine.room_count(), 1);
        engine.add_room(second, "2".into(), RoomType::Deluxe, 2).await.unwrap();
    }

    let engine = Engine::open(path, Collaborators::local()).unwrap();
    assert_eq!(engine.room_count(), 2);
    assert_ok!(engine.get_room(first).await);
    assert_eq!(engine.get_room(second).await.unwrap().room_type, RoomType::Deluxe);
}

#[tokio::test]
async fn compaction_preserves_state_and_shrinks_journal() {
    let path = test_journal_path("compact.journal");
    let (guest, room, kept) = {
        let engine = Engine::open(path.clone(), Collaborators::local()).unwrap();
        let ids = populate(&engine).await;
        let before = crate::journal::Journal::replay(&path).unwrap().len();
        assert!(!engine.compact_if_needed(10_000).await.unwrap());
        assert!(engine.compact_if_needed(1).await.unwrap());
        let after = crate::journal::Journal::replay(&path).unwrap().len();
        assert!(after < before, "{after} should be below {before}");
        ids
    };
    let engine = Engine::open(path, Collaborators::local()).unwrap();
    assert_populated(&engine, guest, room, kept).await;
}
