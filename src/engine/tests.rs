use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::model::{day_span, Span};

use super::*;

static TEST_ID: AtomicU64 = AtomicU64::new(0);

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("frontdesk_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let n = TEST_ID.fetch_add(1, Ordering::SeqCst);
    dir.join(format!("{}_{}_{}.wal", name, std::process::id(), n))
}

fn all() -> Page {
    Page {
        number: 1,
        size: 1000,
    }
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn nights(start: &str, end: &str) -> Span {
    day_span(date(start), date(end)).unwrap()
}

async fn seed_room(engine: &Engine) -> (Uuid, Uuid) {
    let category = engine
        .create_category("Standard".into(), "Basics".into(), 100_00, vec![])
        .await
        .unwrap();
    let room = engine
        .create_room("101".into(), category.id, true, "Floor 1".into())
        .await
        .unwrap();
    (category.id, room.id)
}

async fn seed_client(engine: &Engine) -> Uuid {
    engine
        .create_client("Avery Quinn".into(), "avery@example.com".into())
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn client_crud_and_unique_email() {
    let engine = Engine::new(test_wal_path("client_crud")).unwrap();

    let a = engine
        .create_client("Ada".into(), "ada@example.com".into())
        .await
        .unwrap();
    assert_eq!(engine.get_client(a.id).unwrap().name, "Ada");

    // Uniqueness is case-insensitive.
    let err = engine
        .create_client("Imposter".into(), "ADA@example.com".into())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmailTaken(_)));

    let updated = engine
        .update_client(
            a.id,
            ClientPatch {
                email: Some("ada2@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.email, "ada2@example.com");

    // Old address is free again.
    engine
        .create_client("Bea".into(), "ada@example.com".into())
        .await
        .unwrap();

    engine.delete_client(a.id).await.unwrap();
    assert!(matches!(
        engine.get_client(a.id),
        Err(EngineError::NotFound(_))
    ));
    assert_eq!(engine.list_clients(all()).len(), 1);
}

#[tokio::test]
async fn client_delete_cascades_reservations() {
    let engine = Engine::new(test_wal_path("client_cascade")).unwrap();
    let (_, room_id) = seed_room(&engine).await;
    let client_id = seed_client(&engine).await;
    let other = engine
        .create_client("Other".into(), "other@example.com".into())
        .await
        .unwrap();

    let doomed = engine
        .create_reservation(client_id, room_id, nights("2024-04-01", "2024-04-03"))
        .await
        .unwrap();
    let kept = engine
        .create_reservation(other.id, room_id, nights("2024-05-01", "2024-05-03"))
        .await
        .unwrap();

    engine.delete_client(client_id).await.unwrap();
    assert!(engine.get_reservation(doomed.id).await.is_err());
    assert!(engine.get_reservation(kept.id).await.is_ok());
}

#[tokio::test]
async fn employee_crud_and_unique_username() {
    let engine = Engine::new(test_wal_path("employee_crud")).unwrap();

    let e = engine
        .create_employee(
            "mgrant".into(),
            "hash".into(),
            "m.grant@example.com".into(),
            "Morgan".into(),
            "Grant".into(),
            "Receptionist".into(),
            "Front Desk".into(),
            Some(date("2020-01-15")),
            None,
            vec!["IT".into()],
        )
        .await
        .unwrap();

    let err = engine
        .create_employee(
            "mgrant".into(),
            "hash".into(),
            "dup@example.com".into(),
            "Dup".into(),
            "Dup".into(),
            "Clerk".into(),
            "Front Desk".into(),
            None,
            None,
            vec![],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UsernameTaken(_)));

    let updated = engine
        .update_employee(
            e.id,
            EmployeePatch {
                date_of_termination: Some(Some(date("2024-06-30"))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    // The termination date itself is still a working day.
    assert!(updated.is_terminated(date("2024-07-01")));
    assert!(!updated.is_terminated(date("2024-06-30")));

    // Clearing the date re-activates the account.
    let updated = engine
        .update_employee(
            e.id,
            EmployeePatch {
                date_of_termination: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.is_terminated(date("2024-07-01")));

    engine.delete_employee(e.id).await.unwrap();
    assert_eq!(
        engine.get_employee_by_username("mgrant").map(|e| e.id),
        None
    );
}

#[tokio::test]
async fn amenity_delete_detaches_from_categories() {
    let engine = Engine::new(test_wal_path("amenity_detach")).unwrap();
    let wifi = engine.create_amenity("WiFi".into()).await.unwrap();
    let tv = engine.create_amenity("TV".into()).await.unwrap();
    let category = engine
        .create_category(
            "Deluxe".into(),
            String::new(),
            200_00,
            vec![wifi.id, tv.id],
        )
        .await
        .unwrap();

    engine.delete_amenity(wifi.id).await.unwrap();
    assert_eq!(engine.get_category(category.id).unwrap().amenities, vec![tv.id]);
    assert!(engine.get_amenity(wifi.id).is_err());
}

#[tokio::test]
async fn category_rejects_unknown_amenity() {
    let engine = Engine::new(test_wal_path("category_unknown_amenity")).unwrap();
    let ghost = Uuid::new_v4();
    let err = engine
        .create_category("Suite".into(), String::new(), 300_00, vec![ghost])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnknownReference {
            field: "amenities",
            id
        } if id == ghost
    ));
}

#[tokio::test]
async fn category_delete_cascades_rooms_and_reservations() {
    let engine = Engine::new(test_wal_path("category_cascade")).unwrap();
    let (category_id, room_id) = seed_room(&engine).await;
    let client_id = seed_client(&engine).await;
    let reservation = engine
        .create_reservation(client_id, room_id, nights("2024-04-01", "2024-04-03"))
        .await
        .unwrap();

    engine.delete_category(category_id).await.unwrap();
    assert!(engine.get_room(room_id).await.is_err());
    assert!(engine.get_reservation(reservation.id).await.is_err());
    // The client survives the cascade.
    assert!(engine.get_client(client_id).is_ok());
}

#[tokio::test]
async fn room_rejects_unknown_category() {
    let engine = Engine::new(test_wal_path("room_unknown_category")).unwrap();
    let ghost = Uuid::new_v4();
    let err = engine
        .create_room("101".into(), ghost, true, String::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnknownReference {
            field: "room_standard",
            ..
        }
    ));
}

#[tokio::test]
async fn room_delete_cascades_reservations() {
    let engine = Engine::new(test_wal_path("room_cascade")).unwrap();
    let (_, room_id) = seed_room(&engine).await;
    let client_id = seed_client(&engine).await;
    let reservation = engine
        .create_reservation(client_id, room_id, nights("2024-04-01", "2024-04-03"))
        .await
        .unwrap();

    engine.delete_room(room_id).await.unwrap();
    assert!(engine.get_reservation(reservation.id).await.is_err());
    assert!(engine.list_reservations(all()).await.is_empty());
}

#[tokio::test]
async fn reservation_rejects_unknown_references() {
    let engine = Engine::new(test_wal_path("reservation_refs")).unwrap();
    let (_, room_id) = seed_room(&engine).await;
    let client_id = seed_client(&engine).await;
    let span = nights("2024-04-01", "2024-04-03");

    let err = engine
        .create_reservation(Uuid::new_v4(), room_id, span)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnknownReference { field: "client", .. }
    ));

    let err = engine
        .create_reservation(client_id, Uuid::new_v4(), span)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnknownReference { field: "room", .. }
    ));
}

#[tokio::test]
async fn reservation_conflicts_are_inclusive() {
    let engine = Engine::new(test_wal_path("reservation_conflict")).unwrap();
    let (_, room_id) = seed_room(&engine).await;
    let client_id = seed_client(&engine).await;

    let first = engine
        .create_reservation(client_id, room_id, nights("2024-04-01", "2024-04-05"))
        .await
        .unwrap();

    // Shares 2024-04-05 with the existing stay.
    let err = engine
        .create_reservation(client_id, room_id, nights("2024-04-05", "2024-04-08"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(id) if id == first.id));

    // The next day is free.
    engine
        .create_reservation(client_id, room_id, nights("2024-04-06", "2024-04-08"))
        .await
        .unwrap();
}

#[tokio::test]
async fn reservation_rejects_inverted_range() {
    let engine = Engine::new(test_wal_path("reservation_inverted")).unwrap();
    let (_, room_id) = seed_room(&engine).await;
    let client_id = seed_client(&engine).await;

    let err = engine
        .create_reservation(
            client_id,
            room_id,
            Span {
                start: 2_000,
                end: 1_000,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange));
}

#[tokio::test]
async fn reservation_reschedule_ignores_itself() {
    let engine = Engine::new(test_wal_path("reservation_reschedule")).unwrap();
    let (_, room_id) = seed_room(&engine).await;
    let client_id = seed_client(&engine).await;

    let r = engine
        .create_reservation(client_id, room_id, nights("2024-04-01", "2024-04-05"))
        .await
        .unwrap();

    // Shifting by one day overlaps the old slot, which must not count
    // against the reservation itself.
    let shifted = nights("2024-04-02", "2024-04-06");
    let updated = engine
        .update_reservation(
            r.id,
            ReservationPatch {
                start: Some(shifted.start),
                end: Some(shifted.end),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.span, shifted);
    assert_eq!(engine.get_reservation(r.id).await.unwrap().span, shifted);
}

#[tokio::test]
async fn reservation_moves_between_rooms() {
    let engine = Engine::new(test_wal_path("reservation_move")).unwrap();
    let (category_id, room_a) = seed_room(&engine).await;
    let room_b = engine
        .create_room("102".into(), category_id, true, "Floor 1".into())
        .await
        .unwrap()
        .id;
    let client_id = seed_client(&engine).await;

    let span = nights("2024-04-01", "2024-04-05");
    let r = engine
        .create_reservation(client_id, room_a, span)
        .await
        .unwrap();

    let moved = engine
        .update_reservation(
            r.id,
            ReservationPatch {
                room_id: Some(room_b),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.room_id, room_b);

    // Room A is free again, room B is taken.
    engine
        .create_reservation(client_id, room_a, span)
        .await
        .unwrap();
    let err = engine
        .create_reservation(client_id, room_b, span)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(id) if id == r.id));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_client_delete_never_orphans_reservations() {
    const DAY: i64 = 86_400_000;
    let engine = Arc::new(Engine::new(test_wal_path("client_delete_race")).unwrap());
    let (_, room_id) = seed_room(&engine).await;

    // Race a reservation insert against the client's delete cascade. Either
    // the insert loses (unknown client) or the cascade sweeps it; a booking
    // pointing at a deleted client must never survive.
    for i in 0..25i64 {
        let client = engine
            .create_client(format!("Client {i}"), format!("c{i}@example.com"))
            .await
            .unwrap();
        let span = Span::new((i * 10 + 1) * DAY, (i * 10 + 3) * DAY);

        let create = {
            let engine = engine.clone();
            let client_id = client.id;
            tokio::spawn(async move {
                let _ = engine.create_reservation(client_id, room_id, span).await;
            })
        };
        let delete = {
            let engine = engine.clone();
            let client_id = client.id;
            tokio::spawn(async move {
                let _ = engine.delete_client(client_id).await;
            })
        };
        create.await.unwrap();
        delete.await.unwrap();
    }

    for reservation in engine.list_reservations(all()).await {
        assert!(
            engine.get_client(reservation.client_id).is_ok(),
            "reservation {} references a deleted client",
            reservation.id
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_standard_delete_never_orphans_rooms() {
    let engine = Arc::new(Engine::new(test_wal_path("standard_delete_race")).unwrap());

    for i in 0..25u32 {
        let standard = engine
            .create_category(format!("Tier {i}"), String::new(), 100_00, vec![])
            .await
            .unwrap();

        let create = {
            let engine = engine.clone();
            let standard_id = standard.id;
            tokio::spawn(async move {
                let _ = engine
                    .create_room(format!("{}", 100 + i), standard_id, true, String::new())
                    .await;
            })
        };
        let delete = {
            let engine = engine.clone();
            let standard_id = standard.id;
            tokio::spawn(async move {
                let _ = engine.delete_category(standard_id).await;
            })
        };
        create.await.unwrap();
        delete.await.unwrap();
    }

    for room in engine.list_rooms(all()).await {
        assert!(
            engine.get_category(room.category_id).is_ok(),
            "room {} references a deleted standard",
            room.number
        );
    }
}

#[tokio::test]
async fn not_found_mutations_leave_state_unchanged() {
    let engine = Engine::new(test_wal_path("not_found")).unwrap();
    let (_, room_id) = seed_room(&engine).await;
    let client_id = seed_client(&engine).await;
    engine
        .create_reservation(client_id, room_id, nights("2024-04-01", "2024-04-03"))
        .await
        .unwrap();

    let ghost = Uuid::new_v4();
    assert!(engine.delete_client(ghost).await.is_err());
    assert!(engine.delete_room(ghost).await.is_err());
    assert!(engine.delete_reservation(ghost).await.is_err());
    assert!(engine
        .update_reservation(ghost, ReservationPatch::default())
        .await
        .is_err());

    assert_eq!(engine.list_clients(all()).len(), 1);
    assert_eq!(engine.list_rooms(all()).await.len(), 1);
    assert_eq!(engine.list_reservations(all()).await.len(), 1);
}

#[tokio::test]
async fn state_survives_replay() {
    let path = test_wal_path("replay");
    let reservation_id;
    let room_id;
    {
        let engine = Engine::new(path.clone()).unwrap();
        let (_, rid) = seed_room(&engine).await;
        room_id = rid;
        let client_id = seed_client(&engine).await;
        reservation_id = engine
            .create_reservation(client_id, rid, nights("2024-04-01", "2024-04-05"))
            .await
            .unwrap()
            .id;
    }

    let engine = Engine::new(path).unwrap();
    let r = engine.get_reservation(reservation_id).await.unwrap();
    assert_eq!(r.room_id, room_id);
    assert_eq!(r.span, nights("2024-04-01", "2024-04-05"));
    assert_eq!(engine.list_clients(all()).len(), 1);
    assert_eq!(engine.list_rooms(all()).await.len(), 1);
}

#[tokio::test]
async fn replay_honours_deletes_and_moves() {
    let path = test_wal_path("replay_deletes");
    let kept;
    {
        let engine = Engine::new(path.clone()).unwrap();
        let (category_id, room_a) = seed_room(&engine).await;
        let room_b = engine
            .create_room("102".into(), category_id, true, String::new())
            .await
            .unwrap()
            .id;
        let client_id = seed_client(&engine).await;

        let doomed = engine
            .create_reservation(client_id, room_a, nights("2024-04-01", "2024-04-03"))
            .await
            .unwrap();
        kept = engine
            .create_reservation(client_id, room_a, nights("2024-05-01", "2024-05-03"))
            .await
            .unwrap()
            .id;
        engine.delete_reservation(doomed.id).await.unwrap();
        engine
            .update_reservation(
                kept,
                ReservationPatch {
                    room_id: Some(room_b),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let engine = Engine::new(path).unwrap();
    assert_eq!(engine.list_reservations(all()).await.len(), 1);
    let r = engine.get_reservation(kept).await.unwrap();
    assert_eq!(engine.get_room(r.room_id).await.unwrap().number, "102");
}

#[tokio::test]
async fn compaction_preserves_state() {
    let path = test_wal_path("compaction");
    {
        let engine = Engine::new(path.clone()).unwrap();
        let (_, room_id) = seed_room(&engine).await;
        let client_id = seed_client(&engine).await;
        for month in 1..=6u32 {
            let start = NaiveDate::from_ymd_opt(2024, month, 1).unwrap();
            let end = NaiveDate::from_ymd_opt(2024, month, 5).unwrap();
            engine
                .create_reservation(client_id, room_id, day_span(start, end).unwrap())
                .await
                .unwrap();
        }
        assert!(engine.wal_appends_since_compact().await >= 8);
        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);
    }

    let engine = Engine::new(path).unwrap();
    assert_eq!(engine.list_reservations(all()).await.len(), 6);
    assert_eq!(engine.list_clients(all()).len(), 1);
    assert_eq!(engine.list_categories(all()).len(), 1);
}

#[tokio::test]
async fn listings_sort_and_paginate() {
    let engine = Engine::new(test_wal_path("pagination")).unwrap();
    for name in ["Cara", "Abe", "Bo", "Dee"] {
        engine
            .create_client(name.into(), format!("{}@example.com", name.to_lowercase()))
            .await
            .unwrap();
    }

    let page1 = engine.list_clients(Page { number: 1, size: 3 });
    let names: Vec<_> = page1.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Abe", "Bo", "Cara"]);

    let page2 = engine.list_clients(Page { number: 2, size: 3 });
    assert_eq!(page2.len(), 1);
    assert_eq!(page2[0].name, "Dee");

    assert!(engine.list_clients(Page { number: 3, size: 3 }).is_empty());
}

#[tokio::test]
async fn availability_end_to_end() {
    let engine = Engine::new(test_wal_path("availability")).unwrap();
    let standard = engine
        .create_category("Standard".into(), String::new(), 100_00, vec![])
        .await
        .unwrap();
    let deluxe = engine
        .create_category("Deluxe".into(), String::new(), 200_00, vec![])
        .await
        .unwrap();
    let r101 = engine
        .create_room("101".into(), standard.id, true, "Floor 1".into())
        .await
        .unwrap();
    let r201 = engine
        .create_room("201".into(), deluxe.id, true, "Floor 2".into())
        .await
        .unwrap();
    let offline = engine
        .create_room("102".into(), standard.id, false, "Floor 1".into())
        .await
        .unwrap();
    let client_id = seed_client(&engine).await;
    engine
        .create_reservation(client_id, r101.id, nights("2024-04-01", "2024-04-05"))
        .await
        .unwrap();

    // Window inside the stay: only the unbooked, in-service rooms remain.
    let free = engine
        .rooms_available(date("2024-04-02"), date("2024-04-03"), None)
        .await
        .unwrap();
    assert_eq!(free.iter().map(|r| r.id).collect::<Vec<_>>(), [r201.id]);

    // After checkout day, 101 is back; 102 stays hidden while out of service.
    let free = engine
        .rooms_available(date("2024-04-06"), date("2024-04-09"), None)
        .await
        .unwrap();
    assert_eq!(
        free.iter().map(|r| r.number.as_str()).collect::<Vec<_>>(),
        ["101", "201"]
    );
    assert!(!free.iter().any(|r| r.id == offline.id));

    // Narrowed by standard.
    let free = engine
        .rooms_available(date("2024-04-06"), date("2024-04-09"), Some(deluxe.id))
        .await
        .unwrap();
    assert_eq!(free.iter().map(|r| r.id).collect::<Vec<_>>(), [r201.id]);

    // Unknown standard yields nothing, not an error.
    let free = engine
        .rooms_available(date("2024-04-06"), date("2024-04-09"), Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(free.is_empty());

    // Inverted calendar window is rejected.
    let err = engine
        .rooms_available(date("2024-04-09"), date("2024-04-06"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange));
}
