use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

use crate::client::Client;
use crate::notify::NotificationService;
use crate::presence::ThreadId;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::session::{Outcome, Session};

type Outbox = mpsc::UnboundedReceiver<WsMessage>;

fn session(service: &Arc<NotificationService>) -> (Session, Outbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Session::new(service.clone(), Arc::new(Client::new(tx))), rx)
}

fn next(rx: &mut Outbox) -> ServerMessage {
    match rx.try_recv().expect("expected a server message") {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected a text message, got {other:?}"),
    }
}

fn writers(msg: ServerMessage) -> Vec<String> {
    match msg {
        ServerMessage::Writers { writers, .. } => writers,
        other => panic!("Expected Writers, got {other:?}"),
    }
}

fn identify(session: &mut Session, rx: &mut Outbox, id: &str, name: &str) {
    let msg = json!({ "type": "identify", "user_id": id, "name": name }).to_string();
    assert_eq!(session.handle_text(&msg), Outcome::Continue);
    assert_eq!(next(rx), ServerMessage::Identified {});
}

#[test]
fn test_client_message_wire_format() {
    let msg: ClientMessage = serde_json::from_str(r#"{"type":"writing","thread":7}"#).unwrap();
    assert!(matches!(msg, ClientMessage::Writing { thread: ThreadId(7) }));

    let msg: ClientMessage =
        serde_json::from_str(r#"{"type":"identify","user_id":"1","name":"alice"}"#).unwrap();
    assert!(matches!(msg, ClientMessage::Identify { .. }));
}

#[test]
fn test_writers_wire_format() {
    let msg = ServerMessage::Writers {
        thread: ThreadId(7),
        version: 3,
        writers: vec!["alice".to_string(), "bob".to_string()],
    };
    let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({ "type": "writers", "thread": 7, "version": 3, "writers": ["alice", "bob"] })
    );
}

#[test]
fn test_identify_then_view_receives_current_writers() {
    let service = Arc::new(NotificationService::default());
    let (mut s, mut rx) = session(&service);

    identify(&mut s, &mut rx, "1", "alice");
    assert_eq!(s.user().unwrap().name, "alice");

    s.handle(ClientMessage::View { thread: ThreadId(7) });
    assert_eq!(s.viewing(), Some(ThreadId(7)));
    assert!(writers(next(&mut rx)).is_empty());
}

#[test]
fn test_message_before_identify_closes() {
    let service = Arc::new(NotificationService::default());
    let (mut s, mut rx) = session(&service);

    let outcome = s.handle(ClientMessage::Writing { thread: ThreadId(7) });
    assert_eq!(outcome, Outcome::Close);
    assert_eq!(next(&mut rx), ServerMessage::error("must identify first"));
    assert!(service.tracker().snapshot(ThreadId(7)).is_empty());
}

#[test]
fn test_invalid_user_rejected() {
    let service = Arc::new(NotificationService::default());
    let (mut s, mut rx) = session(&service);

    let outcome = s.handle(ClientMessage::Identify {
        user_id: "".to_string(),
        name: "alice".to_string(),
    });
    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(next(&mut rx), ServerMessage::error("invalid user"));
    assert!(s.user().is_none());
}

#[test]
fn test_second_identify_rejected() {
    let service = Arc::new(NotificationService::default());
    let (mut s, mut rx) = session(&service);

    identify(&mut s, &mut rx, "1", "alice");
    s.handle(ClientMessage::Identify {
        user_id: "2".to_string(),
        name: "mallory".to_string(),
    });
    assert_eq!(next(&mut rx), ServerMessage::error("already identified"));
    assert_eq!(s.user().unwrap().id, "1");
}

#[test]
fn test_malformed_frame_is_ignored() {
    let service = Arc::new(NotificationService::default());
    let (mut s, mut rx) = session(&service);

    assert_eq!(s.handle_text("not json"), Outcome::Continue);
    assert_eq!(s.handle_text(r#"{"type":"dance"}"#), Outcome::Continue);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_writing_signal_reaches_viewers() {
    let service = Arc::new(NotificationService::default());
    let (mut viewer, mut viewer_rx) = session(&service);
    let (mut writer, mut writer_rx) = session(&service);

    identify(&mut viewer, &mut viewer_rx, "1", "alice");
    identify(&mut writer, &mut writer_rx, "2", "bob");

    viewer.handle(ClientMessage::View { thread: ThreadId(7) });
    writers(next(&mut viewer_rx));

    writer.handle(ClientMessage::Writing { thread: ThreadId(7) });
    assert_eq!(writers(next(&mut viewer_rx)), vec!["bob"]);

    // writer is not viewing, so gets nothing
    assert!(writer_rx.try_recv().is_err());

    // repeat signal inside the window: no broadcast
    writer.handle(ClientMessage::Writing { thread: ThreadId(7) });
    assert!(viewer_rx.try_recv().is_err());
}

#[test]
fn test_view_switch_replaces_subscription() {
    let service = Arc::new(NotificationService::default());
    let (mut s, mut rx) = session(&service);
    identify(&mut s, &mut rx, "1", "alice");

    s.handle(ClientMessage::View { thread: ThreadId(7) });
    s.handle(ClientMessage::View { thread: ThreadId(8) });
    assert_eq!(service.registry().subscriber_count(ThreadId(7)), 0);
    assert_eq!(service.registry().subscriber_count(ThreadId(8)), 1);

    // re-viewing the same thread keeps the single subscription
    s.handle(ClientMessage::View { thread: ThreadId(8) });
    assert_eq!(service.registry().subscriber_count(ThreadId(8)), 1);
}

#[test]
fn test_leave_unsubscribes_only_matching_thread() {
    let service = Arc::new(NotificationService::default());
    let (mut s, mut rx) = session(&service);
    identify(&mut s, &mut rx, "1", "alice");

    s.handle(ClientMessage::View { thread: ThreadId(7) });
    s.handle(ClientMessage::Leave { thread: ThreadId(8) });
    assert_eq!(s.viewing(), Some(ThreadId(7)));

    s.handle(ClientMessage::Leave { thread: ThreadId(7) });
    assert_eq!(s.viewing(), None);
    assert_eq!(service.registry().subscriber_count(ThreadId(7)), 0);
}

#[test]
fn test_stopped_removes_writer() {
    let service = Arc::new(NotificationService::default());
    let (mut viewer, mut viewer_rx) = session(&service);
    let (mut writer, mut writer_rx) = session(&service);
    identify(&mut viewer, &mut viewer_rx, "1", "alice");
    identify(&mut writer, &mut writer_rx, "2", "bob");

    viewer.handle(ClientMessage::View { thread: ThreadId(7) });
    writers(next(&mut viewer_rx));

    writer.handle(ClientMessage::Writing { thread: ThreadId(7) });
    writers(next(&mut viewer_rx));

    writer.handle(ClientMessage::Stopped { thread: ThreadId(7) });
    assert!(writers(next(&mut viewer_rx)).is_empty());
}

#[test]
fn test_close_cleans_up_view_and_writer_entries() {
    let service = Arc::new(NotificationService::default());
    let (mut viewer, mut viewer_rx) = session(&service);
    let (mut writer, mut writer_rx) = session(&service);
    identify(&mut viewer, &mut viewer_rx, "1", "alice");
    identify(&mut writer, &mut writer_rx, "2", "bob");

    viewer.handle(ClientMessage::View { thread: ThreadId(7) });
    writers(next(&mut viewer_rx));
    writer.handle(ClientMessage::View { thread: ThreadId(7) });
    writers(next(&mut writer_rx));
    writer.handle(ClientMessage::Writing { thread: ThreadId(7) });
    writers(next(&mut viewer_rx));

    writer.close();
    writer.close();
    assert_eq!(service.registry().subscriber_count(ThreadId(7)), 1);
    assert!(writers(next(&mut viewer_rx)).is_empty());
    assert!(viewer_rx.try_recv().is_err());
}

#[test]
fn test_drop_runs_cleanup() {
    let service = Arc::new(NotificationService::default());
    let (mut s, mut rx) = session(&service);
    identify(&mut s, &mut rx, "1", "alice");
    s.handle(ClientMessage::View { thread: ThreadId(7) });
    s.handle(ClientMessage::Writing { thread: ThreadId(7) });

    drop(s);
    assert_eq!(service.registry().subscriber_count(ThreadId(7)), 0);
    assert!(service.tracker().snapshot(ThreadId(7)).is_empty());
}

#[test]
fn test_closing_one_of_two_connections_keeps_writer() {
    let service = Arc::new(NotificationService::default());
    let (mut viewer, mut viewer_rx) = session(&service);
    let (mut tab1, mut tab1_rx) = session(&service);
    let (mut tab2, mut tab2_rx) = session(&service);
    identify(&mut viewer, &mut viewer_rx, "1", "alice");
    identify(&mut tab1, &mut tab1_rx, "2", "bob");
    identify(&mut tab2, &mut tab2_rx, "2", "bob");

    viewer.handle(ClientMessage::View { thread: ThreadId(7) });
    writers(next(&mut viewer_rx));

    tab1.handle(ClientMessage::Writing { thread: ThreadId(7) });
    assert_eq!(writers(next(&mut viewer_rx)), vec!["bob"]);
    tab2.handle(ClientMessage::Writing { thread: ThreadId(7) });
    assert!(viewer_rx.try_recv().is_err());

    tab1.close();
    assert!(viewer_rx.try_recv().is_err());
    assert_eq!(service.tracker().snapshot(ThreadId(7)).names(), vec!["bob"]);

    tab2.close();
    assert!(writers(next(&mut viewer_rx)).is_empty());
}
