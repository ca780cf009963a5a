use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use wren_db::Database;
use wren_gateway::registry::SessionRegistry;
use wren_gateway::services::Services;
use wren_types::error::ServiceError;
use wren_types::events::{FriendStatus, NotificationKind, ServerEvent};

struct Harness {
    db: Arc<Database>,
    registry: SessionRegistry,
    services: Services,
}

impl Harness {
    fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = SessionRegistry::new();
        let services = Services::new(db.clone(), registry.clone());
        Self {
            db,
            registry,
            services,
        }
    }

    fn seed_user(&self, username: &str, balance: f64) -> i64 {
        self.db
            .create_user(
                username,
                Some(&format!("{}@example.com", username)),
                username,
                "Tester",
                balance,
            )
            .unwrap()
    }

    fn seed_conversation(&self, members: &[i64]) -> i64 {
        let conv = self.db.create_conversation(None, false, members[0]).unwrap();
        for &m in members {
            self.db.add_member(conv, m).unwrap();
        }
        conv
    }

    async fn connect(&self, user_id: i64) -> UnboundedReceiver<ServerEvent> {
        let (_conn, rx) = self.registry.bind(user_id).await;
        rx
    }
}

fn assert_no_event(rx: &mut UnboundedReceiver<ServerEvent>) {
    assert!(rx.try_recv().is_err(), "expected no pending events");
}

#[tokio::test]
async fn message_fanout_reaches_all_live_members_including_sender() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 0.0);
    let bob = h.seed_user("bob", 0.0);
    let carol = h.seed_user("carol", 0.0);
    let conv = h.seed_conversation(&[alice, bob, carol]);

    let mut alice_rx = h.connect(alice).await;
    let mut bob_rx = h.connect(bob).await;
    // carol stays offline

    h.services
        .messages
        .send(conv, alice, "hello everyone".to_string())
        .await
        .unwrap();

    for rx in [&mut alice_rx, &mut bob_rx] {
        match rx.recv().await.unwrap() {
            ServerEvent::NewMessage {
                conversation_id,
                sender_id,
                content,
            } => {
                assert_eq!(conversation_id, conv);
                assert_eq!(sender_id, alice);
                assert_eq!(content, "hello everyone");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    // Persisted regardless of who was online
    assert_eq!(h.db.messages_in(conv).unwrap().len(), 1);
}

#[tokio::test]
async fn non_members_cannot_post_and_nothing_is_delivered() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 0.0);
    let bob = h.seed_user("bob", 0.0);
    let outsider = h.seed_user("mallory", 0.0);
    let conv = h.seed_conversation(&[alice, bob]);

    let mut alice_rx = h.connect(alice).await;

    let err = h
        .services
        .messages
        .send(conv, outsider, "let me in".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotAMember));

    assert!(h.db.messages_in(conv).unwrap().is_empty());
    assert_no_event(&mut alice_rx);
}

#[tokio::test]
async fn transfer_notifies_sender_and_receiver() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 100.0);
    let bob = h.seed_user("bob", 0.0);
    let conv = h.seed_conversation(&[alice, bob]);

    let mut alice_rx = h.connect(alice).await;
    let mut bob_rx = h.connect(bob).await;

    h.services.transfers.transfer(alice, bob, 40.0, conv).await.unwrap();

    match alice_rx.recv().await.unwrap() {
        ServerEvent::MoneySent {
            success: true,
            amount: Some(amount),
            message: None,
        } => assert_eq!(amount, 40.0),
        other => panic!("unexpected event: {:?}", other),
    }

    match bob_rx.recv().await.unwrap() {
        ServerEvent::MoneyReceived {
            success: true,
            amount,
            conversation_id,
        } => {
            assert_eq!(amount, 40.0);
            assert_eq!(conversation_id, conv);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    // The receiver also gets a new_message so an open chat refreshes
    match bob_rx.recv().await.unwrap() {
        ServerEvent::NewMessage {
            conversation_id,
            sender_id,
            content,
        } => {
            assert_eq!(conversation_id, conv);
            assert_eq!(sender_id, alice);
            assert_eq!(content, "Sent $40");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    assert_eq!(h.db.balance_of(alice).unwrap(), Some(60.0));
    assert_eq!(h.db.balance_of(bob).unwrap(), Some(40.0));
}

#[tokio::test]
async fn insufficient_funds_is_reported_without_touching_balances() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 30.0);
    let bob = h.seed_user("bob", 0.0);
    let conv = h.seed_conversation(&[alice, bob]);

    let mut bob_rx = h.connect(bob).await;

    let err = h
        .services
        .transfers
        .transfer(alice, bob, 40.0, conv)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientFunds));

    assert_eq!(h.db.balance_of(alice).unwrap(), Some(30.0));
    assert_eq!(h.db.balance_of(bob).unwrap(), Some(0.0));
    assert_no_event(&mut bob_rx);
}

#[tokio::test]
async fn transfer_from_outside_the_conversation_is_refused() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 100.0);
    let bob = h.seed_user("bob", 0.0);
    let outsider = h.seed_user("mallory", 100.0);
    let conv = h.seed_conversation(&[alice, bob]);

    let mut bob_rx = h.connect(bob).await;

    let err = h
        .services
        .transfers
        .transfer(outsider, bob, 40.0, conv)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotAMember));

    assert_eq!(h.db.balance_of(outsider).unwrap(), Some(100.0));
    assert_eq!(h.db.balance_of(bob).unwrap(), Some(0.0));
    assert!(h.db.messages_in(conv).unwrap().is_empty());
    assert_no_event(&mut bob_rx);
}

#[tokio::test]
async fn non_positive_amounts_are_rejected_up_front() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 100.0);
    let bob = h.seed_user("bob", 0.0);
    let conv = h.seed_conversation(&[alice, bob]);

    for amount in [0.0, -5.0, f64::NAN] {
        let err = h
            .services
            .transfers
            .transfer(alice, bob, amount, conv)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAmount));
    }

    assert_eq!(h.db.balance_of(alice).unwrap(), Some(100.0));
}

#[tokio::test]
async fn offline_receiver_still_gets_paid() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 50.0);
    let bob = h.seed_user("bob", 0.0);
    let conv = h.seed_conversation(&[alice, bob]);

    let mut alice_rx = h.connect(alice).await;

    h.services.transfers.transfer(alice, bob, 25.0, conv).await.unwrap();

    assert!(matches!(
        alice_rx.recv().await.unwrap(),
        ServerEvent::MoneySent { success: true, .. }
    ));
    assert_eq!(h.db.balance_of(bob).unwrap(), Some(25.0));
}

#[tokio::test]
async fn friend_request_handshake_end_to_end() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 0.0);
    let bob = h.seed_user("bob", 0.0);

    let mut alice_rx = h.connect(alice).await;
    let mut bob_rx = h.connect(bob).await;

    h.services
        .friendships
        .send_request(alice, "bob".to_string())
        .await
        .unwrap();

    match alice_rx.recv().await.unwrap() {
        ServerEvent::FriendRequestResponse { success, .. } => assert!(success),
        other => panic!("unexpected event: {:?}", other),
    }
    match bob_rx.recv().await.unwrap() {
        ServerEvent::NewNotification { kind, sender_id } => {
            assert_eq!(kind, NotificationKind::FriendRequest);
            assert_eq!(sender_id, alice);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let request = h.db.pending_requests_for(bob).unwrap();
    assert_eq!(request.len(), 1);

    h.services.friendships.respond(request[0].id, true).await.unwrap();

    for rx in [&mut alice_rx, &mut bob_rx] {
        match rx.recv().await.unwrap() {
            ServerEvent::FriendStatusChanged { status } => {
                assert_eq!(status, FriendStatus::FriendAccepted);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    assert!(h.db.are_friends(alice, bob).unwrap());
    assert!(h.db.are_friends(bob, alice).unwrap());
    assert_eq!(h.db.conversations_for(alice).unwrap().len(), 1);
}

#[tokio::test]
async fn friend_request_validation_order() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 0.0);
    let _bob = h.seed_user("bob", 0.0);

    let err = h
        .services
        .friendships
        .send_request(alice, "nobody".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UserNotFound));

    let err = h
        .services
        .friendships
        .send_request(alice, "alice".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SelfRequest));

    // Email form resolves too
    h.services
        .friendships
        .send_request(alice, "bob@example.com".to_string())
        .await
        .unwrap();

    let err = h
        .services
        .friendships
        .send_request(alice, "bob".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicatePending));
}

#[tokio::test]
async fn already_friends_is_rejected() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 0.0);
    let bob = h.seed_user("bob", 0.0);

    h.services
        .friendships
        .send_request(alice, "bob".to_string())
        .await
        .unwrap();
    let request = h.db.pending_requests_for(bob).unwrap()[0].id;
    h.services.friendships.respond(request, true).await.unwrap();

    let err = h
        .services
        .friendships
        .send_request(alice, "bob".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyFriends));
}

#[tokio::test]
async fn responding_twice_yields_invalid_state() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 0.0);
    let bob = h.seed_user("bob", 0.0);

    h.services
        .friendships
        .send_request(alice, "bob".to_string())
        .await
        .unwrap();
    let request = h.db.pending_requests_for(bob).unwrap()[0].id;

    h.services.friendships.respond(request, true).await.unwrap();
    let err = h.services.friendships.respond(request, true).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState));

    // No duplicate friendship rows from the retry
    assert_eq!(h.db.friends_of(alice, false).unwrap().len(), 1);
}

#[tokio::test]
async fn events_follow_the_user_to_their_newest_session() {
    let h = Harness::new();
    let alice = h.seed_user("alice", 0.0);
    let bob = h.seed_user("bob", 0.0);
    let conv = h.seed_conversation(&[alice, bob]);

    // Bob reconnects: the first session is superseded
    let mut stale_rx = h.connect(bob).await;
    let mut fresh_rx = h.connect(bob).await;
    assert!(stale_rx.recv().await.is_none());

    h.services
        .messages
        .send(conv, alice, "hi bob".to_string())
        .await
        .unwrap();

    match fresh_rx.recv().await.unwrap() {
        ServerEvent::NewMessage { content, .. } => assert_eq!(content, "hi bob"),
        other => panic!("unexpected event: {:?}", other),
    }
}
