//! Unit tests for the interrupt queue and chunk store.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use livecast_db::{create_lazy_pool, create_pool, DbRuntimeSettings};
use livecast_types::{
    AudioChunk, AudioKind, ChatMessage, Gift, InterruptEvent, InterruptKind, InterruptStatus,
    MessageKind, PriorityWeights, QueuePolicy, ScriptSegment, SynthesizedAudio,
};
use rusqlite::Connection;

use crate::chunks::{append_chunk, get_chunk, last_sequence, list_chunks, ChunkFilter};
use crate::messages::{insert_message, list_messages, message_count, revenue_totals};
use crate::queue::{
    dequeue_next, enqueue_interrupt, interrupt_status, mark_interrupt, pending_count,
    recover_in_service, EnqueueOutcome,
};
use crate::{ChunkStore, InterruptQueue, MessageLog, StoreError};

fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    livecast_db::run_migrations(&conn).expect("migrations should succeed");
    conn
}

fn event(kind: InterruptKind, message: &str) -> InterruptEvent {
    InterruptEvent::new(kind, "speed", message, None, &PriorityWeights::default())
}

fn superchat(message: &str, amount: Option<f64>) -> InterruptEvent {
    let weights = PriorityWeights::default();
    InterruptEvent::new(InterruptKind::Superchat, "speed", message, amount, &weights)
}

fn chunk(session: &str, seq: u64, kind: AudioKind) -> AudioChunk {
    AudioChunk::sequenced(
        session,
        seq,
        &ScriptSegment::new(format!("line {seq}"), "speed"),
        kind,
        SynthesizedAudio {
            persona: "speed".into(),
            mime_type: "audio/wav".into(),
            audio_bytes: vec![0u8; 16 + seq as usize],
        },
    )
}

fn drain(conn: &mut Connection) -> Vec<String> {
    let mut messages = Vec::new();
    while let Some(e) = dequeue_next(conn).expect("dequeue should succeed") {
        messages.push(e.message);
    }
    messages
}

// ── ordering ─────────────────────────────────────────────────────────

#[test]
fn gift_is_serviced_before_earlier_chat() {
    let mut conn = test_db();
    let policy = QueuePolicy::default();

    enqueue_interrupt(&mut conn, &event(InterruptKind::Chat, "hello"), &policy).unwrap();
    enqueue_interrupt(&mut conn, &event(InterruptKind::Gift, "rocket"), &policy).unwrap();
    enqueue_interrupt(&mut conn, &event(InterruptKind::Superchat, "shoutout"), &policy).unwrap();

    assert_eq!(drain(&mut conn), vec!["rocket", "shoutout", "hello"]);
}

#[test]
fn same_weight_is_fifo_even_with_identical_timestamps() {
    let mut conn = test_db();
    let policy = QueuePolicy::default();
    let at = Utc::now();

    for i in 0..5 {
        let mut e = event(InterruptKind::Chat, &format!("chat {i}"));
        e.arrival_time = at;
        enqueue_interrupt(&mut conn, &e, &policy).unwrap();
    }

    assert_eq!(
        drain(&mut conn),
        vec!["chat 0", "chat 1", "chat 2", "chat 3", "chat 4"]
    );
}

#[test]
fn ordering_ignores_client_arrival_time() {
    let mut conn = test_db();
    let policy = QueuePolicy::default();

    let mut late = event(InterruptKind::Chat, "first in");
    late.arrival_time = Utc::now() + ChronoDuration::hours(1);
    enqueue_interrupt(&mut conn, &late, &policy).unwrap();
    enqueue_interrupt(&mut conn, &event(InterruptKind::Chat, "second in"), &policy).unwrap();

    assert_eq!(drain(&mut conn), vec!["first in", "second in"]);
}

#[test]
fn larger_amount_wins_within_weight_class() {
    let mut conn = test_db();
    let policy = QueuePolicy::default();

    let small = superchat("small", Some(2.0));
    let large = superchat("large", Some(50.0));
    let none = superchat("none", None);
    enqueue_interrupt(&mut conn, &small, &policy).unwrap();
    enqueue_interrupt(&mut conn, &none, &policy).unwrap();
    enqueue_interrupt(&mut conn, &large, &policy).unwrap();

    assert_eq!(drain(&mut conn), vec!["large", "small", "none"]);
}

#[test]
fn amount_is_ignored_when_tiebreak_disabled() {
    let mut conn = test_db();
    let policy = QueuePolicy {
        amount_tiebreak: false,
        ..QueuePolicy::default()
    };

    let small = superchat("small", Some(2.0));
    let large = superchat("large", Some(50.0));
    enqueue_interrupt(&mut conn, &small, &policy).unwrap();
    enqueue_interrupt(&mut conn, &large, &policy).unwrap();

    assert_eq!(drain(&mut conn), vec!["small", "large"]);
}

#[test]
fn configured_weights_reorder_kinds() {
    let mut conn = test_db();
    let weights = PriorityWeights {
        chat: 1,
        superchat: 50,
        gift: 5,
    };
    let policy = QueuePolicy {
        weights,
        ..QueuePolicy::default()
    };

    let gift = InterruptEvent::new(InterruptKind::Gift, "speed", "gift", None, &weights);
    let paid = InterruptEvent::new(InterruptKind::Superchat, "speed", "superchat", None, &weights);
    enqueue_interrupt(&mut conn, &gift, &policy).unwrap();
    enqueue_interrupt(&mut conn, &paid, &policy).unwrap();

    assert_eq!(drain(&mut conn), vec!["superchat", "gift"]);
}

#[test]
fn empty_queue_dequeues_none() {
    let mut conn = test_db();
    assert!(dequeue_next(&mut conn).unwrap().is_none());
    assert_eq!(pending_count(&conn).unwrap(), 0);
}

#[test]
fn dequeued_event_round_trips_fields() {
    let mut conn = test_db();
    let policy = QueuePolicy::default();
    let original = InterruptEvent::new(
        InterruptKind::Superchat,
        "nova",
        "love the stream",
        Some(9.99),
        &PriorityWeights::default(),
    );
    enqueue_interrupt(&mut conn, &original, &policy).unwrap();

    let got = dequeue_next(&mut conn).unwrap().expect("event should be queued");
    assert_eq!(got.id, original.id);
    assert_eq!(got.persona, "nova");
    assert_eq!(got.amount, Some(9.99));
    assert_eq!(got.weight, 20);
    assert_eq!(got.arrival_time, original.arrival_time);
}

// ── overflow ─────────────────────────────────────────────────────────

#[test]
fn full_queue_evicts_oldest_chat() {
    let mut conn = test_db();
    let policy = QueuePolicy {
        capacity: 2,
        ..QueuePolicy::default()
    };

    let oldest = event(InterruptKind::Chat, "oldest");
    enqueue_interrupt(&mut conn, &oldest, &policy).unwrap();
    enqueue_interrupt(&mut conn, &event(InterruptKind::Chat, "newer"), &policy).unwrap();

    let outcome =
        enqueue_interrupt(&mut conn, &event(InterruptKind::Gift, "gift"), &policy).unwrap();
    assert_eq!(
        outcome,
        EnqueueOutcome::QueuedWithEviction {
            evicted_id: oldest.id.clone()
        }
    );
    assert_eq!(pending_count(&conn).unwrap(), 2);
    assert_eq!(
        interrupt_status(&conn, &oldest.id).unwrap(),
        Some(InterruptStatus::Dropped)
    );
    assert_eq!(drain(&mut conn), vec!["gift", "newer"]);
}

#[test]
fn full_queue_without_chats_drops_incoming_chat() {
    let mut conn = test_db();
    let policy = QueuePolicy {
        capacity: 1,
        ..QueuePolicy::default()
    };

    enqueue_interrupt(&mut conn, &event(InterruptKind::Gift, "gift"), &policy).unwrap();
    let chat = event(InterruptKind::Chat, "late chat");
    let outcome = enqueue_interrupt(&mut conn, &chat, &policy).unwrap();

    assert_eq!(outcome, EnqueueOutcome::Dropped);
    assert_eq!(pending_count(&conn).unwrap(), 1);
    assert_eq!(
        interrupt_status(&conn, &chat.id).unwrap(),
        Some(InterruptStatus::Dropped)
    );
}

#[test]
fn full_queue_never_drops_priority_events() {
    let mut conn = test_db();
    let policy = QueuePolicy {
        capacity: 1,
        ..QueuePolicy::default()
    };

    enqueue_interrupt(&mut conn, &event(InterruptKind::Gift, "gift"), &policy).unwrap();
    let outcome =
        enqueue_interrupt(&mut conn, &event(InterruptKind::Superchat, "sc"), &policy).unwrap();

    assert_eq!(outcome, EnqueueOutcome::Queued);
    assert_eq!(pending_count(&conn).unwrap(), 2);
}

// ── archive ──────────────────────────────────────────────────────────

#[test]
fn status_follows_event_through_service() {
    let mut conn = test_db();
    let e = event(InterruptKind::Superchat, "hi");
    enqueue_interrupt(&mut conn, &e, &QueuePolicy::default()).unwrap();
    assert_eq!(interrupt_status(&conn, &e.id).unwrap(), Some(InterruptStatus::Queued));

    dequeue_next(&mut conn).unwrap();
    assert_eq!(
        interrupt_status(&conn, &e.id).unwrap(),
        Some(InterruptStatus::InService)
    );

    assert!(mark_interrupt(&conn, &e.id, InterruptStatus::Serviced).unwrap());
    assert_eq!(
        interrupt_status(&conn, &e.id).unwrap(),
        Some(InterruptStatus::Serviced)
    );

    // Final states are not overwritten.
    assert!(!mark_interrupt(&conn, &e.id, InterruptStatus::Degraded).unwrap());
    assert_eq!(interrupt_status(&conn, "missing").unwrap(), None);
}

#[test]
fn stranded_in_service_events_become_degraded() {
    let mut conn = test_db();
    let e = event(InterruptKind::Gift, "gift");
    enqueue_interrupt(&mut conn, &e, &QueuePolicy::default()).unwrap();
    dequeue_next(&mut conn).unwrap();

    assert_eq!(recover_in_service(&conn).unwrap(), 1);
    assert_eq!(
        interrupt_status(&conn, &e.id).unwrap(),
        Some(InterruptStatus::Degraded)
    );
    assert!(dequeue_next(&mut conn).unwrap().is_none());
}

// ── chunks ───────────────────────────────────────────────────────────

#[test]
fn chunks_list_in_sequence_order() {
    let conn = test_db();
    for seq in [3, 1, 2] {
        append_chunk(&conn, &chunk("s1", seq, AudioKind::General)).unwrap();
    }

    let listed = list_chunks(&conn, &ChunkFilter::default()).unwrap();
    let seqs: Vec<u64> = listed.iter().map(|c| c.sequence_no).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(listed[0].byte_len, 17);
    assert_eq!(last_sequence(&conn, "s1").unwrap(), Some(3));
    assert_eq!(last_sequence(&conn, "s2").unwrap(), None);
}

#[test]
fn chunk_filter_applies_cursor_kind_and_limit() {
    let conn = test_db();
    append_chunk(&conn, &chunk("s1", 1, AudioKind::General)).unwrap();
    append_chunk(&conn, &chunk("s1", 2, AudioKind::Gift)).unwrap();
    append_chunk(&conn, &chunk("s1", 3, AudioKind::General)).unwrap();
    append_chunk(&conn, &chunk("s2", 1, AudioKind::General)).unwrap();

    let after = list_chunks(
        &conn,
        &ChunkFilter {
            session_id: Some("s1".into()),
            after: Some(1),
            ..ChunkFilter::default()
        },
    )
    .unwrap();
    assert_eq!(
        after.iter().map(|c| c.sequence_no).collect::<Vec<_>>(),
        vec![2, 3]
    );

    let gifts = list_chunks(
        &conn,
        &ChunkFilter {
            kind: Some(AudioKind::Gift),
            ..ChunkFilter::default()
        },
    )
    .unwrap();
    assert_eq!(gifts.len(), 1);
    assert_eq!(gifts[0].kind, AudioKind::Gift);

    let limited = list_chunks(
        &conn,
        &ChunkFilter {
            session_id: Some("s1".into()),
            limit: Some(2),
            ..ChunkFilter::default()
        },
    )
    .unwrap();
    assert_eq!(limited.len(), 2);
}

#[test]
fn duplicate_sequence_in_session_is_rejected() {
    let conn = test_db();
    append_chunk(&conn, &chunk("s1", 1, AudioKind::General)).unwrap();

    let err = append_chunk(&conn, &chunk("s1", 1, AudioKind::General)).unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));

    // A different session may reuse the number.
    append_chunk(&conn, &chunk("s2", 1, AudioKind::General)).unwrap();
}

#[test]
fn published_chunks_cannot_be_changed() {
    let conn = test_db();
    let c = chunk("s1", 1, AudioKind::General);
    append_chunk(&conn, &c).unwrap();

    assert!(conn
        .execute("UPDATE audio_chunks SET transcript = 'edited' WHERE id = ?1", [&c.id])
        .is_err());
    assert!(conn
        .execute("DELETE FROM audio_chunks WHERE id = ?1", [&c.id])
        .is_err());

    let stored = get_chunk(&conn, &c.id).unwrap().expect("chunk should exist");
    assert_eq!(stored.transcript, "line 1");
    assert_eq!(stored.audio_bytes, c.audio_bytes);
}

// ── chat log and revenue ─────────────────────────────────────────────

fn chat_message(username: &str, kind: MessageKind) -> ChatMessage {
    ChatMessage {
        id: format!("msg-{username}"),
        created_at: Utc::now(),
        username: username.into(),
        avatar_color: "#60A5FA".into(),
        kind,
        content: Some(format!("{username} says hi")),
        amount: None,
        pinned: None,
        gift: None,
    }
}

#[test]
fn chat_log_lists_oldest_first_and_keeps_gift_details() {
    let conn = test_db();
    let now = Utc::now();

    let mut late = chat_message("beamSearch", MessageKind::Normal);
    late.created_at = now;
    let mut early = chat_message("layer_norm", MessageKind::Gift);
    early.created_at = now - ChronoDuration::minutes(6);
    early.content = None;
    early.gift = Some(Gift {
        gift_key: "spark".into(),
        gift_name: "Quantum Spark".into(),
        value: 5,
        quantity: 5,
    });
    let mut pinned = chat_message("multi_head", MessageKind::Superchat);
    pinned.created_at = now - ChronoDuration::minutes(3);
    pinned.amount = Some(120.0);
    pinned.pinned = Some(true);

    insert_message(&conn, &late).unwrap();
    insert_message(&conn, &early).unwrap();
    insert_message(&conn, &pinned).unwrap();

    let listed = list_messages(&conn).unwrap();
    let names: Vec<&str> = listed.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, vec!["layer_norm", "multi_head", "beamSearch"]);
    assert_eq!(listed[0], early);
    assert_eq!(listed[1].amount, Some(120.0));
    assert_eq!(listed[1].pinned, Some(true));
    assert_eq!(message_count(&conn).unwrap(), 3);
}

#[test]
fn chat_log_rejects_duplicate_ids() {
    let conn = test_db();
    let message = chat_message("grad_descent", MessageKind::Normal);
    insert_message(&conn, &message).unwrap();
    assert!(insert_message(&conn, &message).is_err());
}

#[test]
fn revenue_counts_paid_events_once_across_their_lifecycle() {
    let mut conn = test_db();
    let policy = QueuePolicy::default();
    let paid = |kind, amount| {
        InterruptEvent::new(kind, "speed", "", amount, &PriorityWeights::default())
    };

    assert_eq!(revenue_totals(&conn).unwrap().total(), 0.0);

    let serviced = paid(InterruptKind::Superchat, Some(50.0));
    let queued = paid(InterruptKind::Superchat, Some(20.0));
    let gift = paid(InterruptKind::Gift, Some(12.5));
    let unpriced = paid(InterruptKind::Gift, None);
    let chat = paid(InterruptKind::Chat, Some(99.0));

    for e in [&serviced, &gift, &unpriced, &chat] {
        enqueue_interrupt(&mut conn, e, &policy).unwrap();
    }
    // Gifts outrank superchats: the first three dequeues take both gifts and
    // the superchat, leaving the chat queued.
    for _ in 0..3 {
        let e = dequeue_next(&mut conn).unwrap().expect("event");
        mark_interrupt(&conn, &e.id, InterruptStatus::Serviced).unwrap();
    }
    enqueue_interrupt(&mut conn, &queued, &policy).unwrap();

    let totals = revenue_totals(&conn).unwrap();
    assert_eq!(totals.superchat, 70.0);
    assert_eq!(totals.gifts, 12.5);
    assert_eq!(totals.total(), 82.5);
}

// ── async handles ────────────────────────────────────────────────────

fn memory_pool() -> livecast_db::DbPool {
    let pool = create_pool(
        ":memory:",
        DbRuntimeSettings {
            pool_max_size: 1,
            ..DbRuntimeSettings::default()
        },
    )
    .expect("pool should build");
    {
        let conn = pool.get().expect("connection");
        livecast_db::run_migrations(&conn).expect("migrations");
    }
    pool
}

#[tokio::test]
async fn handles_round_trip_through_pool() {
    let pool = memory_pool();
    let queue = InterruptQueue::new(pool.clone(), QueuePolicy::default());
    let store = ChunkStore::new(pool);

    let gift = event(InterruptKind::Gift, "rocket");
    queue.enqueue(event(InterruptKind::Chat, "hello")).await.unwrap();
    queue.enqueue(gift.clone()).await.unwrap();
    assert_eq!(queue.pending().await.unwrap(), 2);

    let first = queue.try_dequeue_next().await.unwrap().expect("event");
    assert_eq!(first.id, gift.id);
    assert!(queue.mark(&gift.id, InterruptStatus::Serviced).await.unwrap());
    assert_eq!(
        queue.status(&gift.id).await.unwrap(),
        Some(InterruptStatus::Serviced)
    );

    let c = chunk("s1", 1, AudioKind::Gift);
    store.append(c.clone()).await.unwrap();
    assert_eq!(store.last_sequence("s1").await.unwrap(), Some(1));
    let fetched = store.get(&c.id).await.unwrap().expect("chunk");
    assert_eq!(fetched.audio_bytes, c.audio_bytes);
    assert_eq!(store.list(ChunkFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_store_reports_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing").join("livecast.db");
    let pool = create_lazy_pool(
        path.to_str().expect("utf-8 path"),
        DbRuntimeSettings {
            connection_timeout_ms: 100,
            ..DbRuntimeSettings::default()
        },
    );
    let queue = InterruptQueue::new(
        pool.clone(),
        QueuePolicy {
            dequeue_timeout_ms: 1_000,
            ..QueuePolicy::default()
        },
    );

    let err = queue
        .enqueue(event(InterruptKind::Chat, "hello"))
        .await
        .unwrap_err();
    assert!(err.is_unavailable(), "unexpected error: {err}");

    let err = queue.try_dequeue_next().await.unwrap_err();
    assert!(err.is_unavailable());
    assert!(queue.dequeue_next().await.is_none());

    let err = ChunkStore::new(pool)
        .append(chunk("s1", 1, AudioKind::General))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn message_log_and_revenue_through_pool() {
    let pool = memory_pool();
    let log = MessageLog::new(pool.clone());
    let queue = InterruptQueue::new(pool, QueuePolicy::default());

    log.append(chat_message("token_talker", MessageKind::Normal))
        .await
        .unwrap();
    assert_eq!(log.count().await.unwrap(), 1);
    assert_eq!(log.list().await.unwrap()[0].username, "token_talker");

    let weights = PriorityWeights::default();
    queue
        .enqueue(InterruptEvent::new(
            InterruptKind::Superchat,
            "speed",
            "hype",
            Some(5.0),
            &weights,
        ))
        .await
        .unwrap();
    assert_eq!(queue.revenue().await.unwrap().superchat, 5.0);
}

/// Polls `status` until it reports `expected`; a dequeue abandoned by its
/// deadline settles on the blocking pool after the caller has moved on.
async fn settle_status(
    queue: &InterruptQueue,
    interrupt_id: &str,
    expected: InterruptStatus,
) -> Option<InterruptStatus> {
    let mut status = None;
    for _ in 0..200 {
        status = queue.status(interrupt_id).await.unwrap();
        if status == Some(expected) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    status
}

#[tokio::test]
async fn dequeue_past_its_deadline_is_archived_degraded() {
    let pool = memory_pool();
    let queue = InterruptQueue::new(
        pool.clone(),
        QueuePolicy {
            dequeue_timeout_ms: 50,
            ..QueuePolicy::default()
        },
    );
    let late = event(InterruptKind::Chat, "late");
    queue.enqueue(late.clone()).await.unwrap();

    // With the only connection checked out, the dequeue cannot start before
    // its deadline.
    let held = pool.get().expect("connection");
    let err = queue.try_dequeue_next().await.unwrap_err();
    assert!(err.is_unavailable(), "unexpected error: {err}");
    drop(held);

    assert_eq!(
        settle_status(&queue, &late.id, InterruptStatus::Degraded).await,
        Some(InterruptStatus::Degraded)
    );
    assert!(queue.try_dequeue_next().await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_deadlines_never_strand_events_in_service() {
    let pool = memory_pool();
    let queue = InterruptQueue::new(
        pool,
        QueuePolicy {
            dequeue_timeout_ms: 0,
            ..QueuePolicy::default()
        },
    );

    let mut ids = Vec::new();
    for i in 0..20 {
        let e = event(InterruptKind::Chat, &format!("chat {i}"));
        ids.push(e.id.clone());
        queue.enqueue(e).await.unwrap();
    }

    let mut delivered = HashSet::new();
    for _ in 0..1_000 {
        if queue.pending().await.unwrap() == 0 {
            break;
        }
        if let Ok(Some(e)) = queue.try_dequeue_next().await {
            assert!(delivered.insert(e.id), "event delivered twice");
        }
    }
    assert_eq!(queue.pending().await.unwrap(), 0);

    for id in &ids {
        let expected = if delivered.contains(id) {
            InterruptStatus::InService
        } else {
            InterruptStatus::Degraded
        };
        assert_eq!(settle_status(&queue, id, expected).await, Some(expected), "event {id}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dequeues_hand_out_each_event_once() {
    const EVENTS: usize = 40;
    const CONSUMERS: usize = 8;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("livecast.db");
    let pool = create_pool(
        path.to_str().expect("utf-8 path"),
        DbRuntimeSettings {
            pool_max_size: 4,
            ..DbRuntimeSettings::default()
        },
    )
    .expect("pool should build");
    {
        let conn = pool.get().expect("connection");
        livecast_db::run_migrations(&conn).expect("migrations");
    }
    let queue = InterruptQueue::new(
        pool,
        QueuePolicy {
            dequeue_timeout_ms: 10_000,
            ..QueuePolicy::default()
        },
    );

    let producers: Vec<_> = (0..EVENTS)
        .map(|i| {
            let queue = queue.clone();
            let kind = match i % 3 {
                0 => InterruptKind::Chat,
                1 => InterruptKind::Superchat,
                _ => InterruptKind::Gift,
            };
            let e = event(kind, &format!("event {i}"));
            let id = e.id.clone();
            (id, tokio::spawn(async move { queue.enqueue(e).await }))
        })
        .collect();

    let mut enqueued = HashSet::new();
    for (id, handle) in producers {
        let outcome = handle.await.expect("producer task").expect("enqueue");
        assert_eq!(outcome, EnqueueOutcome::Queued);
        enqueued.insert(id);
    }
    assert_eq!(queue.pending().await.unwrap(), EVENTS);

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Some(e) = queue.try_dequeue_next().await.expect("dequeue") {
                    taken.push(e.id);
                }
                taken
            })
        })
        .collect();

    let mut dequeued = Vec::new();
    for handle in consumers {
        dequeued.extend(handle.await.expect("consumer task"));
    }

    let unique: HashSet<String> = dequeued.iter().cloned().collect();
    assert_eq!(unique.len(), dequeued.len(), "an event was handed out twice");
    assert_eq!(unique, enqueued);
    for id in &unique {
        assert_eq!(
            queue.status(id).await.unwrap(),
            Some(InterruptStatus::InService)
        );
    }
}
