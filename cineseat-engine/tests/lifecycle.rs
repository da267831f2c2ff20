use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use cineseat_domain::booking::{Booking, BookingStatus, PaymentStatus};
use cineseat_domain::error::BookingError;
use cineseat_domain::events::BookingStateEvent;
use cineseat_domain::repository::{BookingRepository, EventPublisher, SessionClient};
use cineseat_domain::session::Session;
use cineseat_engine::memory::MemoryBookingRepository;
use cineseat_engine::service::BookingService;
use cineseat_engine::sweeper;

struct StubSessionClient {
    sessions: HashMap<Uuid, Session>,
}

#[async_trait]
impl SessionClient for StubSessionClient {
    async fn get_session(&self, session_id: Uuid) -> Result<Session, BookingError> {
        self.sessions
            .get(&session_id)
            .cloned()
            .ok_or(BookingError::SessionNotFound(session_id))
    }
}

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<BookingStateEvent>>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        event: &BookingStateEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(
        &self,
        _event: &BookingStateEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err("event bus unreachable".into())
    }
}

/// Wraps the in-memory repository and fails the seat-release operations for
/// one designated booking, simulating a record the sweep cannot process.
struct FaultyReleaseRepository {
    inner: MemoryBookingRepository,
    poisoned: Uuid,
}

#[async_trait]
impl BookingRepository for FaultyReleaseRepository {
    async fn create_with_seats(
        &self,
        booking: &Booking,
        seat_ids: &[Uuid],
    ) -> Result<Booking, BookingError> {
        self.inner.create_with_seats(booking, seat_ids).await
    }

    async fn get(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Booking>, BookingError> {
        self.inner.list().await
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment: Option<PaymentStatus>,
    ) -> Result<(), BookingError> {
        self.inner.set_status(id, status, payment).await
    }

    async fn release_seats_and_set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), BookingError> {
        if id == self.poisoned {
            return Err(BookingError::storage("deadlock detected"));
        }
        self.inner.release_seats_and_set_status(id, status).await
    }

    async fn release_seats_for_ended_session(&self, id: Uuid) -> Result<(), BookingError> {
        if id == self.poisoned {
            return Err(BookingError::storage("deadlock detected"));
        }
        self.inner.release_seats_for_ended_session(id).await
    }

    async fn held_seats(
        &self,
        session_id: Uuid,
        seat_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, BookingError> {
        self.inner.held_seats(session_id, seat_ids).await
    }

    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.inner.find_expired_pending(now).await
    }

    async fn find_for_ended_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.inner.find_for_ended_sessions(now).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), BookingError> {
        self.inner.delete(id).await
    }
}

fn session_starting_in(minutes: i64) -> Session {
    let start = Utc::now() + Duration::minutes(minutes);
    Session {
        id: Uuid::new_v4(),
        start_time: start,
        end_time: start + Duration::hours(2),
    }
}

struct Harness {
    service: Arc<BookingService>,
    repo: Arc<MemoryBookingRepository>,
    publisher: Arc<RecordingPublisher>,
}

fn harness(sessions: &[Session]) -> Harness {
    let repo = Arc::new(MemoryBookingRepository::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let client = StubSessionClient {
        sessions: sessions.iter().map(|s| (s.id, s.clone())).collect(),
    };
    let service = Arc::new(BookingService::new(
        repo.clone(),
        Arc::new(client),
        publisher.clone(),
        Duration::minutes(15),
    ));
    Harness {
        service,
        repo,
        publisher,
    }
}

fn stored_booking(
    session: &Session,
    status: BookingStatus,
    payment: PaymentStatus,
    expires_at: DateTime<Utc>,
) -> Booking {
    let now = Utc::now();
    Booking {
        id: Uuid::new_v4(),
        session_id: session.id,
        user_id: Uuid::new_v4(),
        booking_status: status,
        payment_status: payment,
        expires_at,
        session_start_time: session.start_time,
        session_end_time: session.end_time,
        created_at: now,
        updated_at: now,
        deleted_at: None,
        seats: Vec::new(),
    }
}

#[tokio::test]
async fn test_create_pending_booking_with_seats() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);
    let seats = vec![Uuid::new_v4(), Uuid::new_v4()];
    let user_id = Uuid::new_v4();

    let before = Utc::now();
    let booking = h
        .service
        .create(session.id, user_id, seats.clone())
        .await
        .unwrap();

    assert_eq!(booking.booking_status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, PaymentStatus::Pending);
    assert_eq!(booking.session_id, session.id);
    assert_eq!(booking.user_id, user_id);
    assert_eq!(booking.seats.len(), 2);
    assert!(booking.seats.iter().all(|s| seats.contains(&s.seat_id)));
    assert_eq!(booking.session_start_time, session.start_time);
    assert_eq!(booking.session_end_time, session.end_time);

    // Hold deadline is creation time plus the configured 15 minutes.
    assert!(booking.expires_at >= before + Duration::minutes(15));
    assert!(booking.expires_at <= Utc::now() + Duration::minutes(15));
}

#[tokio::test]
async fn test_create_requires_seats() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);

    let err = h
        .service
        .create(session.id, Uuid::new_v4(), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NoSeatsRequested));
}

#[tokio::test]
async fn test_create_collapses_duplicate_seats() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);
    let seat = Uuid::new_v4();

    let booking = h
        .service
        .create(session.id, Uuid::new_v4(), vec![seat, seat])
        .await
        .unwrap();
    assert_eq!(booking.seats.len(), 1);
}

#[tokio::test]
async fn test_create_unknown_session() {
    let h = harness(&[]);
    let session_id = Uuid::new_v4();

    let err = h
        .service
        .create(session_id, Uuid::new_v4(), vec![Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SessionNotFound(id) if id == session_id));
}

#[tokio::test]
async fn test_create_rejects_started_session() {
    let session = session_starting_in(-5);
    let h = harness(&[session.clone()]);

    let err = h
        .service
        .create(session.id, Uuid::new_v4(), vec![Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SessionAlreadyStarted(id) if id == session.id));
}

#[tokio::test]
async fn test_conflicting_create_names_overlap_and_succeeds_after_cancel() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);
    let seat_12 = Uuid::new_v4();
    let seat_13 = Uuid::new_v4();
    let seat_14 = Uuid::new_v4();

    let first = h
        .service
        .create(session.id, Uuid::new_v4(), vec![seat_12, seat_13])
        .await
        .unwrap();

    let err = h
        .service
        .create(session.id, Uuid::new_v4(), vec![seat_13, seat_14])
        .await
        .unwrap_err();
    match err {
        BookingError::SeatsAlreadyBooked(held) => assert_eq!(held, vec![seat_13]),
        other => panic!("expected seat conflict, got {other:?}"),
    }

    h.service.cancel(first.id).await.unwrap();

    let second = h
        .service
        .create(session.id, Uuid::new_v4(), vec![seat_13, seat_14])
        .await
        .unwrap();
    assert_eq!(second.seats.len(), 2);
}

#[tokio::test]
async fn test_concurrent_disjoint_creates_both_succeed() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);
    let a = vec![Uuid::new_v4(), Uuid::new_v4()];
    let b = vec![Uuid::new_v4(), Uuid::new_v4()];

    let (ra, rb) = tokio::join!(
        h.service.create(session.id, Uuid::new_v4(), a),
        h.service.create(session.id, Uuid::new_v4(), b),
    );
    assert!(ra.is_ok());
    assert!(rb.is_ok());
}

#[tokio::test]
async fn test_concurrent_overlapping_creates_have_one_winner() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);
    let shared = Uuid::new_v4();

    let (ra, rb) = tokio::join!(
        h.service
            .create(session.id, Uuid::new_v4(), vec![shared, Uuid::new_v4()]),
        h.service
            .create(session.id, Uuid::new_v4(), vec![shared, Uuid::new_v4()]),
    );

    let results = [ra, rb];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    match loser.as_ref().unwrap_err() {
        BookingError::SeatsAlreadyBooked(held) => assert_eq!(held, &vec![shared]),
        other => panic!("expected seat conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_confirm_marks_paid_and_publishes() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);

    let booking = h
        .service
        .create(session.id, Uuid::new_v4(), vec![Uuid::new_v4()])
        .await
        .unwrap();
    let confirmed = h.service.confirm(booking.id).await.unwrap();

    assert_eq!(confirmed.booking_status, BookingStatus::Confirmed);
    assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

    let events = h.publisher.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].booking_id, booking.id);
    assert_eq!(events[0].booking_status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_confirm_rejected_once_hold_expired() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);

    // Pending booking whose hold deadline already passed, as the sweeper
    // would see it between ticks.
    let stale = stored_booking(
        &session,
        BookingStatus::Pending,
        PaymentStatus::Pending,
        Utc::now() - Duration::minutes(1),
    );
    h.repo
        .create_with_seats(&stale, &[Uuid::new_v4()])
        .await
        .unwrap();

    let err = h.service.confirm(stale.id).await.unwrap_err();
    assert!(matches!(err, BookingError::BookingExpired));

    let unchanged = h.service.get(stale.id).await.unwrap();
    assert_eq!(unchanged.booking_status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_confirm_twice_is_rejected() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);

    let booking = h
        .service
        .create(session.id, Uuid::new_v4(), vec![Uuid::new_v4()])
        .await
        .unwrap();
    h.service.confirm(booking.id).await.unwrap();

    let err = h.service.confirm(booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::AlreadyConfirmed));
}

#[tokio::test]
async fn test_cancel_frees_seats_and_double_cancel_is_rejected() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);
    let seat = Uuid::new_v4();

    let booking = h
        .service
        .create(session.id, Uuid::new_v4(), vec![seat])
        .await
        .unwrap();
    let cancelled = h.service.cancel(booking.id).await.unwrap();
    assert_eq!(cancelled.booking_status, BookingStatus::Cancelled);
    assert!(cancelled.seats.is_empty());

    let err = h.service.cancel(booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::AlreadyCancelled));

    // The freed seat is immediately available to a new create.
    h.service
        .create(session.id, Uuid::new_v4(), vec![seat])
        .await
        .unwrap();

    let events = h.publisher.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].booking_status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_after_cancel_then_confirm_is_rejected() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);

    let booking = h
        .service
        .create(session.id, Uuid::new_v4(), vec![Uuid::new_v4()])
        .await
        .unwrap();
    h.service.cancel(booking.id).await.unwrap();

    let err = h.service.confirm(booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::AlreadyCancelled));
}

#[tokio::test]
async fn test_cancel_confirmed_booking_is_rejected() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);

    let booking = h
        .service
        .create(session.id, Uuid::new_v4(), vec![Uuid::new_v4()])
        .await
        .unwrap();
    h.service.confirm(booking.id).await.unwrap();

    let err = h.service.cancel(booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::AlreadyConfirmed));

    let booking = h.service.get(booking.id).await.unwrap();
    assert_eq!(booking.booking_status, BookingStatus::Confirmed);
    assert!(!booking.seats.is_empty());
}

#[tokio::test]
async fn test_publish_failure_does_not_fail_confirm() {
    let session = session_starting_in(60);
    let repo = Arc::new(MemoryBookingRepository::new());
    let client = StubSessionClient {
        sessions: HashMap::from([(session.id, session.clone())]),
    };
    let service = BookingService::new(
        repo,
        Arc::new(client),
        Arc::new(FailingPublisher),
        Duration::minutes(15),
    );

    let booking = service
        .create(session.id, Uuid::new_v4(), vec![Uuid::new_v4()])
        .await
        .unwrap();
    let confirmed = service.confirm(booking.id).await.unwrap();
    assert_eq!(confirmed.booking_status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_expiration_sweep_expires_and_frees_seats() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);
    let seat = Uuid::new_v4();

    let stale = stored_booking(
        &session,
        BookingStatus::Pending,
        PaymentStatus::Pending,
        Utc::now() - Duration::minutes(20),
    );
    h.repo.create_with_seats(&stale, &[seat]).await.unwrap();

    h.service.expire_old_bookings().await.unwrap();

    let swept = h.service.get(stale.id).await.unwrap();
    assert_eq!(swept.booking_status, BookingStatus::Expired);
    assert!(swept.seats.is_empty());

    // Seats are free again and a later confirm is rejected.
    h.service
        .create(session.id, Uuid::new_v4(), vec![seat])
        .await
        .unwrap();
    let err = h.service.confirm(stale.id).await.unwrap_err();
    assert!(matches!(err, BookingError::BookingExpired));

    // Second run with nothing newly expired is a no-op.
    h.service.expire_old_bookings().await.unwrap();
    let swept = h.service.get(stale.id).await.unwrap();
    assert_eq!(swept.booking_status, BookingStatus::Expired);
}

#[tokio::test]
async fn test_ended_session_sweep_expires_confirmed_booking() {
    let ended = Session {
        id: Uuid::new_v4(),
        start_time: Utc::now() - Duration::hours(3),
        end_time: Utc::now() - Duration::hours(1),
    };
    let h = harness(&[ended.clone()]);

    // Confirmed and paid; the backstop releases its seats regardless.
    let confirmed = stored_booking(
        &ended,
        BookingStatus::Confirmed,
        PaymentStatus::Paid,
        Utc::now() + Duration::minutes(5),
    );
    h.repo
        .create_with_seats(&confirmed, &[Uuid::new_v4()])
        .await
        .unwrap();

    let cancelled = stored_booking(
        &ended,
        BookingStatus::Cancelled,
        PaymentStatus::Pending,
        Utc::now() - Duration::hours(2),
    );
    h.repo.create_with_seats(&cancelled, &[]).await.unwrap();

    h.service.free_seats_for_ended_sessions().await.unwrap();

    let swept = h.service.get(confirmed.id).await.unwrap();
    assert_eq!(swept.booking_status, BookingStatus::Expired);
    assert!(swept.seats.is_empty());

    // Terminal bookings keep their status and are not rewritten at all.
    let untouched = h.service.get(cancelled.id).await.unwrap();
    assert_eq!(untouched.booking_status, BookingStatus::Cancelled);
    assert_eq!(untouched.updated_at, cancelled.updated_at);
}

#[tokio::test]
async fn test_expiration_sweep_skips_failing_booking_and_expires_the_rest() {
    let session = session_starting_in(60);
    let stale_deadline = Utc::now() - Duration::minutes(20);
    let broken = stored_booking(
        &session,
        BookingStatus::Pending,
        PaymentStatus::Pending,
        stale_deadline,
    );
    let healthy = stored_booking(
        &session,
        BookingStatus::Pending,
        PaymentStatus::Pending,
        stale_deadline,
    );

    let repo = Arc::new(FaultyReleaseRepository {
        inner: MemoryBookingRepository::new(),
        poisoned: broken.id,
    });
    let client = StubSessionClient {
        sessions: HashMap::from([(session.id, session.clone())]),
    };
    let service = BookingService::new(
        repo.clone(),
        Arc::new(client),
        Arc::new(RecordingPublisher::default()),
        Duration::minutes(15),
    );
    repo.create_with_seats(&broken, &[Uuid::new_v4()])
        .await
        .unwrap();
    repo.create_with_seats(&healthy, &[Uuid::new_v4()])
        .await
        .unwrap();

    // The failing record is logged and skipped; the pass still completes.
    service.expire_old_bookings().await.unwrap();

    let swept = service.get(healthy.id).await.unwrap();
    assert_eq!(swept.booking_status, BookingStatus::Expired);
    assert!(swept.seats.is_empty());

    let stuck = service.get(broken.id).await.unwrap();
    assert_eq!(stuck.booking_status, BookingStatus::Pending);
    assert!(!stuck.seats.is_empty());
}

#[tokio::test]
async fn test_ended_session_sweep_skips_failing_booking_and_expires_the_rest() {
    let ended = Session {
        id: Uuid::new_v4(),
        start_time: Utc::now() - Duration::hours(3),
        end_time: Utc::now() - Duration::hours(1),
    };
    let broken = stored_booking(
        &ended,
        BookingStatus::Confirmed,
        PaymentStatus::Paid,
        Utc::now() + Duration::minutes(5),
    );
    let healthy = stored_booking(
        &ended,
        BookingStatus::Confirmed,
        PaymentStatus::Paid,
        Utc::now() + Duration::minutes(5),
    );

    let repo = Arc::new(FaultyReleaseRepository {
        inner: MemoryBookingRepository::new(),
        poisoned: broken.id,
    });
    let client = StubSessionClient {
        sessions: HashMap::from([(ended.id, ended.clone())]),
    };
    let service = BookingService::new(
        repo.clone(),
        Arc::new(client),
        Arc::new(RecordingPublisher::default()),
        Duration::minutes(15),
    );
    repo.create_with_seats(&broken, &[Uuid::new_v4()])
        .await
        .unwrap();
    repo.create_with_seats(&healthy, &[Uuid::new_v4()])
        .await
        .unwrap();

    service.free_seats_for_ended_sessions().await.unwrap();

    let swept = service.get(healthy.id).await.unwrap();
    assert_eq!(swept.booking_status, BookingStatus::Expired);
    assert!(swept.seats.is_empty());

    let stuck = service.get(broken.id).await.unwrap();
    assert_eq!(stuck.booking_status, BookingStatus::Confirmed);
    assert!(!stuck.seats.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_expiration_sweeper_runs_immediately_at_startup() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);

    let stale = stored_booking(
        &session,
        BookingStatus::Pending,
        PaymentStatus::Pending,
        Utc::now() - Duration::minutes(20),
    );
    h.repo
        .create_with_seats(&stale, &[Uuid::new_v4()])
        .await
        .unwrap();

    let worker = tokio::spawn(sweeper::run_expiration_sweeper(
        h.service.clone(),
        StdDuration::from_secs(60),
    ));
    tokio::time::sleep(StdDuration::from_millis(50)).await;
    worker.abort();

    let swept = h.service.get(stale.id).await.unwrap();
    assert_eq!(swept.booking_status, BookingStatus::Expired);
}

#[tokio::test]
async fn test_delete_hides_booking_and_frees_seats() {
    let session = session_starting_in(60);
    let h = harness(&[session.clone()]);
    let seat = Uuid::new_v4();

    let booking = h
        .service
        .create(session.id, Uuid::new_v4(), vec![seat])
        .await
        .unwrap();
    h.service.delete(booking.id).await.unwrap();

    let err = h.service.get(booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::BookingNotFound(_)));

    h.service
        .create(session.id, Uuid::new_v4(), vec![seat])
        .await
        .unwrap();
}
