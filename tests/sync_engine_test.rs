//! Synchronization engine integration tests
//!
//! Drives the engine through the same dispatch entry point the gateway
//! uses, with mpsc receivers standing in for sockets. Covers the
//! externally observable protocol guarantees: bootstrap joins, broadcast
//! exclusion, save verification, patch atomicity, writer serialization,
//! presence symmetry, and identity sanitization.

mod common;

use collabfs::protocol::{ClientMessage, CursorPosition, PresenceAction, ServerEvent};
use collabfs::sync::patch::TextPatch;
use common::{drain, expect_one, TestServer};
use pretty_assertions::assert_eq;

fn join(path: &str, user_id: &str) -> ClientMessage {
    ClientMessage::JoinFile {
        path: path.into(),
        user_id: user_id.into(),
    }
}

fn save(path: &str, user_id: &str, content: &str) -> ClientMessage {
    ClientMessage::SaveFile {
        path: path.into(),
        user_id: user_id.into(),
        content: content.into(),
    }
}

fn patch(start: usize, delete: &str, insert: &str) -> TextPatch {
    TextPatch {
        start,
        delete: delete.into(),
        insert: insert.into(),
    }
}

#[tokio::test]
async fn test_join_absent_file_bootstraps_empty() {
    let server = TestServer::start().await;
    let (conn, mut rx) = server.attach();

    server.engine.dispatch(conn, join("fresh.md", "u1")).await;

    match expect_one(&mut rx) {
        ServerEvent::FileJoined {
            path,
            content,
            member_count,
        } => {
            assert_eq!(path, "fresh.md");
            assert_eq!(content, "");
            assert_eq!(member_count, 1);
        }
        other => panic!("expected file_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_save_then_rejoin_yields_saved_content() {
    let server = TestServer::start().await;
    let (conn, mut rx) = server.attach();

    server.engine.dispatch(conn, join("doc.md", "u1")).await;
    drain(&mut rx);

    server.engine.dispatch(conn, save("doc.md", "u1", "x")).await;
    drain(&mut rx);

    let (other, mut other_rx) = server.attach();
    server.engine.dispatch(other, join("doc.md", "u1")).await;

    match expect_one(&mut other_rx) {
        ServerEvent::FileJoined {
            content,
            member_count,
            ..
        } => {
            assert_eq!(content, "x");
            assert_eq!(member_count, 2);
        }
        other => panic!("expected file_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_save_round_trips_through_mirror_byte_identical() {
    let server = TestServer::start().await;
    let (conn, mut rx) = server.attach();

    let content = "line one\nline two\n\ttabbed, with unicode: héllo\n";
    server
        .engine
        .dispatch(conn, save("notes/roundtrip.txt", "u1", content))
        .await;

    let events = drain(&mut rx);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ServerEvent::FileSaved { .. })),
        "save must be acknowledged: {events:?}"
    );

    let on_disk = server.mirror.read("u1", "notes/roundtrip.txt").await.unwrap();
    assert_eq!(on_disk, content);
}

#[tokio::test]
async fn test_failed_save_emits_no_success_ack() {
    let server = TestServer::start().await;
    let (conn, mut rx) = server.attach();

    // Occupy the target path with a directory so the mirror write fails
    // after sanitization passes.
    server.mirror.ensure_user_dir("u1").await.unwrap();
    tokio::fs::create_dir_all(server.mirror.resolve("u1", "blocked.txt").unwrap())
        .await
        .unwrap();

    server
        .engine
        .dispatch(conn, save("blocked.txt", "u1", "content"))
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1, "only the failure event: {events:?}");
    assert!(matches!(events[0], ServerEvent::SaveError { .. }));
}

#[tokio::test]
async fn test_edit_broadcast_excludes_sender_and_outsiders() {
    let server = TestServer::start().await;
    let (a, mut rx_a) = server.attach();
    let (b, mut rx_b) = server.attach();
    let (c, mut rx_c) = server.attach();
    let (d, mut rx_d) = server.attach();

    for (conn, user) in [(a, "ua"), (b, "ub"), (c, "uc")] {
        server.engine.dispatch(conn, join("doc1.md", user)).await;
    }
    server.engine.dispatch(d, join("other.md", "ud")).await;
    for rx in [&mut rx_a, &mut rx_b, &mut rx_c, &mut rx_d] {
        drain(rx);
    }

    server
        .engine
        .dispatch(
            a,
            ClientMessage::FileEdit {
                path: "doc1.md".into(),
                changes: serde_json::json!({"op": "insert", "text": "hi"}),
            },
        )
        .await;

    for rx in [&mut rx_b, &mut rx_c] {
        match expect_one(rx) {
            ServerEvent::FileUpdate { path, sender, .. } => {
                assert_eq!(path, "doc1.md");
                assert_eq!(sender, a);
            }
            other => panic!("expected file_update, got {other:?}"),
        }
    }
    assert!(drain(&mut rx_a).is_empty(), "sender must not receive its own edit");
    assert!(drain(&mut rx_d).is_empty(), "other rooms must not receive the edit");
}

#[tokio::test]
async fn test_collab_edit_broadcasts_patches_not_content() {
    let server = TestServer::start().await;
    let (a, mut rx_a) = server.attach();
    let (b, mut rx_b) = server.attach();

    server.engine.dispatch(a, join("doc.md", "ua")).await;
    server.engine.dispatch(b, join("doc.md", "ub")).await;
    server.engine.dispatch(a, save("doc.md", "ua", "hello")).await;
    for rx in [&mut rx_a, &mut rx_b] {
        drain(rx);
    }

    server
        .engine
        .dispatch(
            b,
            ClientMessage::CollabEdit {
                path: "doc.md".into(),
                patches: vec![patch(0, "hello", "goodbye")],
                version: 7,
            },
        )
        .await;

    match expect_one(&mut rx_a) {
        ServerEvent::CollabPatch {
            patches,
            version,
            sender,
            ..
        } => {
            assert_eq!(version, 7);
            assert_eq!(sender, b);
            assert_eq!(patches, vec![patch(0, "hello", "goodbye")]);
        }
        other => panic!("expected collab_patch, got {other:?}"),
    }

    match expect_one(&mut rx_b) {
        ServerEvent::CollabApplied {
            version, applied, ..
        } => {
            assert_eq!(version, 7);
            assert_eq!(applied, 1);
        }
        other => panic!("expected collab_applied, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_patch_set_leaves_content_unchanged() {
    let server = TestServer::start().await;
    let (conn, mut rx) = server.attach();

    server.engine.dispatch(conn, join("doc.md", "u1")).await;
    server.engine.dispatch(conn, save("doc.md", "u1", "hello")).await;
    drain(&mut rx);

    // First patch is valid, second targets non-matching base text: the
    // whole set must be rejected.
    server
        .engine
        .dispatch(
            conn,
            ClientMessage::CollabEdit {
                path: "doc.md".into(),
                patches: vec![patch(0, "h", "H"), patch(1, "XYZ", "!")],
                version: 1,
            },
        )
        .await;

    match expect_one(&mut rx) {
        ServerEvent::CollabError { message } => {
            assert!(message.contains("Patch 1"), "message: {message}");
        }
        other => panic!("expected collab_error, got {other:?}"),
    }

    let (fresh, mut fresh_rx) = server.attach();
    server.engine.dispatch(fresh, join("doc.md", "u1")).await;
    match expect_one(&mut fresh_rx) {
        ServerEvent::FileJoined { content, .. } => assert_eq!(content, "hello"),
        other => panic!("expected file_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mirror_failure_does_not_reject_persisted_collab_edit() {
    let server = TestServer::start().await;
    let (a, mut rx_a) = server.attach();
    let (b, mut rx_b) = server.attach();

    server.engine.dispatch(a, join("doc.md", "ua")).await;
    server.engine.dispatch(b, join("doc.md", "ub")).await;
    server.engine.dispatch(a, save("doc.md", "ua", "hello")).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    // Break the editor's mirror copy: occupy its path with a directory
    // so the post-persist reconcile write fails.
    let mirror_path = server.mirror.resolve("ua", "doc.md").unwrap();
    tokio::fs::remove_file(&mirror_path).await.unwrap();
    tokio::fs::create_dir(&mirror_path).await.unwrap();

    server
        .engine
        .dispatch(
            a,
            ClientMessage::CollabEdit {
                path: "doc.md".into(),
                patches: vec![patch(0, "hello", "goodbye")],
                version: 1,
            },
        )
        .await;

    // Once persisted, the edit is accepted: the sender gets its ack,
    // never a rejection the room would not hear about.
    let sender_events = drain(&mut rx_a);
    assert!(
        sender_events
            .iter()
            .any(|e| matches!(e, ServerEvent::CollabApplied { .. })),
        "persisted edit must be acknowledged: {sender_events:?}"
    );
    assert!(
        !sender_events
            .iter()
            .any(|e| matches!(e, ServerEvent::CollabError { .. })),
        "persisted edit must not be rejected: {sender_events:?}"
    );
    assert!(matches!(
        expect_one(&mut rx_b),
        ServerEvent::CollabPatch { .. }
    ));

    // The store holds the merged content and fresh joins observe it.
    let (fresh, mut fresh_rx) = server.attach();
    server.engine.dispatch(fresh, join("doc.md", "uc")).await;
    match expect_one(&mut fresh_rx) {
        ServerEvent::FileJoined { content, .. } => assert_eq!(content, "goodbye"),
        other => panic!("expected file_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_concurrent_collab_edits_are_serialized_without_lost_updates() {
    let server = TestServer::start().await;
    let (a, mut rx_a) = server.attach();
    let (b, mut rx_b) = server.attach();

    server.engine.dispatch(a, join("doc.md", "ua")).await;
    server.engine.dispatch(b, join("doc.md", "ub")).await;
    server.engine.dispatch(a, save("doc.md", "ua", "hello world")).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    // Same-length replacements at disjoint ranges: each applies cleanly
    // regardless of order, but only if the second load observes the
    // first's completed write.
    let edit_a = ClientMessage::CollabEdit {
        path: "doc.md".into(),
        patches: vec![patch(0, "hello", "HELLO")],
        version: 1,
    };
    let edit_b = ClientMessage::CollabEdit {
        path: "doc.md".into(),
        patches: vec![patch(6, "world", "WORLD")],
        version: 1,
    };

    tokio::join!(
        server.engine.dispatch(a, edit_a),
        server.engine.dispatch(b, edit_b),
    );

    assert!(
        drain(&mut rx_a)
            .iter()
            .any(|e| matches!(e, ServerEvent::CollabApplied { .. })),
        "first writer must be accepted"
    );
    assert!(
        drain(&mut rx_b)
            .iter()
            .any(|e| matches!(e, ServerEvent::CollabApplied { .. })),
        "second writer must be accepted"
    );

    let (fresh, mut fresh_rx) = server.attach();
    server.engine.dispatch(fresh, join("doc.md", "uc")).await;
    match expect_one(&mut fresh_rx) {
        ServerEvent::FileJoined { content, .. } => assert_eq!(content, "HELLO WORLD"),
        other => panic!("expected file_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_save_notifies_room_and_same_user_devices() {
    let server = TestServer::start().await;
    let (laptop, mut rx_laptop) = server.attach();
    let (phone, mut rx_phone) = server.attach();
    let (peer, mut rx_peer) = server.attach();

    server.engine.dispatch(laptop, join("doc.md", "alice")).await;
    server.engine.dispatch(phone, join("unrelated.md", "alice")).await;
    server.engine.dispatch(peer, join("doc.md", "bob")).await;
    for rx in [&mut rx_laptop, &mut rx_phone, &mut rx_peer] {
        drain(rx);
    }

    server
        .engine
        .dispatch(laptop, save("doc.md", "alice", "draft"))
        .await;

    let laptop_events = drain(&mut rx_laptop);
    assert!(laptop_events
        .iter()
        .any(|e| matches!(e, ServerEvent::FileSaved { .. })));
    assert!(laptop_events
        .iter()
        .any(|e| matches!(e, ServerEvent::FileContentUpdated { .. })));

    // Same user, different device: raw-content remote update only.
    let phone_events = drain(&mut rx_phone);
    assert_eq!(phone_events.len(), 1);
    match &phone_events[0] {
        ServerEvent::FileUpdatedRemote { path, content } => {
            assert_eq!(path, "doc.md");
            assert_eq!(content, "draft");
        }
        other => panic!("expected file_updated_remote, got {other:?}"),
    }

    // Different user in the room: verified-content push only.
    let peer_events = drain(&mut rx_peer);
    assert_eq!(peer_events.len(), 1);
    assert!(matches!(
        peer_events[0],
        ServerEvent::FileContentUpdated { .. }
    ));
}

#[tokio::test]
async fn test_non_text_join_serves_store_snapshot() {
    let server = TestServer::start().await;
    let (conn, mut rx) = server.attach();

    server
        .engine
        .dispatch(conn, save("photo.png", "u1", "png bytes"))
        .await;
    drain(&mut rx);

    // Diverge the mirror copy: a binary-classified join must ignore it
    // and serve the store snapshot.
    server
        .mirror
        .write("u1", "photo.png", "stale mirror copy")
        .await
        .unwrap();

    server.engine.dispatch(conn, join("photo.png", "u1")).await;
    match expect_one(&mut rx) {
        ServerEvent::FileJoined { content, .. } => assert_eq!(content, "png bytes"),
        other => panic!("expected file_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cursor_updates_relay_to_room_only() {
    let server = TestServer::start().await;
    let (a, mut rx_a) = server.attach();
    let (b, mut rx_b) = server.attach();

    server.engine.dispatch(a, join("doc.md", "ua")).await;
    server.engine.dispatch(b, join("doc.md", "ub")).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    server
        .engine
        .dispatch(
            a,
            ClientMessage::CursorUpdate {
                path: "doc.md".into(),
                position: CursorPosition { line: 3, column: 14 },
            },
        )
        .await;

    match expect_one(&mut rx_b) {
        ServerEvent::FileCursor {
            sender, position, ..
        } => {
            assert_eq!(sender, a);
            assert_eq!(position, CursorPosition { line: 3, column: 14 });
        }
        other => panic!("expected file_cursor, got {other:?}"),
    }
    assert!(drain(&mut rx_a).is_empty());
}

#[tokio::test]
async fn test_presence_join_and_disconnect_leave_are_symmetric() {
    let server = TestServer::start().await;
    let (observer, mut rx_observer) = server.attach();
    server.engine.dispatch(observer, join("doc2.md", "obs")).await;
    drain(&mut rx_observer);

    let (visitor, mut rx_visitor) = server.attach();
    server.engine.dispatch(visitor, join("doc2.md", "vis")).await;
    server
        .engine
        .dispatch(
            visitor,
            ClientMessage::Presence {
                path: "doc2.md".into(),
                user_id: "vis".into(),
            },
        )
        .await;
    drain(&mut rx_visitor);

    server.engine.disconnect(visitor);

    let presence: Vec<_> = drain(&mut rx_observer)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::Presence {
                user_id, action, ..
            } => Some((user_id, action)),
            _ => None,
        })
        .collect();

    assert_eq!(
        presence,
        vec![
            ("vis".to_string(), PresenceAction::Join),
            ("vis".to_string(), PresenceAction::Leave),
        ]
    );
}

#[tokio::test]
async fn test_leave_acknowledges_sender_without_broadcast() {
    let server = TestServer::start().await;
    let (a, mut rx_a) = server.attach();
    let (b, mut rx_b) = server.attach();

    server.engine.dispatch(a, join("doc.md", "ua")).await;
    server.engine.dispatch(b, join("doc.md", "ub")).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    server
        .engine
        .dispatch(a, ClientMessage::LeaveFile { path: "doc.md".into() })
        .await;

    match expect_one(&mut rx_a) {
        ServerEvent::FileLeft { path } => assert_eq!(path, "doc.md"),
        other => panic!("expected file_left, got {other:?}"),
    }
    assert!(drain(&mut rx_b).is_empty());
}

#[tokio::test]
async fn test_leave_never_joined_room_is_noop() {
    let server = TestServer::start().await;
    let (a, mut rx_a) = server.attach();
    let (bystander, mut rx_bystander) = server.attach();
    server.engine.dispatch(bystander, join("ghost.md", "ub")).await;
    drain(&mut rx_bystander);

    server
        .engine
        .dispatch(a, ClientMessage::LeaveFile { path: "ghost.md".into() })
        .await;

    // The leaver still gets its ack; nobody else hears anything and no
    // error is raised.
    assert!(matches!(expect_one(&mut rx_a), ServerEvent::FileLeft { .. }));
    assert!(drain(&mut rx_bystander).is_empty());
}

#[tokio::test]
async fn test_traversal_identities_are_rejected_before_filesystem_access() {
    let server = TestServer::start().await;
    let (conn, mut rx) = server.attach();

    server
        .engine
        .dispatch(conn, save("ok.txt", "../root", "x"))
        .await;
    assert!(matches!(expect_one(&mut rx), ServerEvent::SaveError { .. }));

    server
        .engine
        .dispatch(conn, save("../../etc/passwd", "u1", "x"))
        .await;
    assert!(matches!(expect_one(&mut rx), ServerEvent::SaveError { .. }));

    server.engine.dispatch(conn, join("/abs.txt", "u1")).await;
    assert!(matches!(expect_one(&mut rx), ServerEvent::Error { .. }));

    // Nothing may have been created under the mirror root.
    let mut entries = tokio::fs::read_dir(server.mirror.root()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_error_detail_hidden_in_production_mode() {
    let server = TestServer::start_with_detail(false).await;
    let (conn, mut rx) = server.attach();

    server
        .engine
        .dispatch(conn, save("ok.txt", "../root", "x"))
        .await;

    match expect_one(&mut rx) {
        ServerEvent::SaveError { detail, .. } => assert!(detail.is_none()),
        other => panic!("expected save_error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_edit_without_join_is_still_serviced() {
    // The protocol is deliberately permissive: no join-before-edit check.
    let server = TestServer::start().await;
    let (member, mut rx_member) = server.attach();
    let (stranger, mut rx_stranger) = server.attach();

    server.engine.dispatch(member, join("doc.md", "um")).await;
    drain(&mut rx_member);

    server
        .engine
        .dispatch(
            stranger,
            ClientMessage::FileEdit {
                path: "doc.md".into(),
                changes: serde_json::json!({"text": "drive-by"}),
            },
        )
        .await;

    assert!(matches!(
        expect_one(&mut rx_member),
        ServerEvent::FileUpdate { .. }
    ));
    assert!(drain(&mut rx_stranger).is_empty());
}
