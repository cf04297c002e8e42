//! Per-connection protocol state
//!
//! A `Session` owns the connection's `Client` and turns decoded client
//! messages into notification-service calls. It does no I/O of its own, so
//! the whole protocol can be exercised without a socket.
//!
//! Order of a connection: `identify` first, then any mix of `view`, `leave`,
//! `writing` and `stopped`. Anything touching a thread before `identify`
//! is answered with an error and ends the connection.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::Client;
use crate::notify::NotificationService;
use crate::presence::{ThreadId, UserRef};
use crate::registry::{Channel, SubscriptionHandle};
use crate::transport::message::{ClientMessage, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Close,
}

#[derive(Debug)]
pub struct Session {
    service: Arc<NotificationService>,
    client: Arc<Client>,
    user: Option<UserRef>,
    view: Option<SubscriptionHandle>,
    /// Threads this connection has signalled writing in.
    writing_in: BTreeSet<ThreadId>,
    closed: bool,
}

impl Session {
    pub fn new(service: Arc<NotificationService>, client: Arc<Client>) -> Self {
        Self {
            service,
            client,
            user: None,
            view: None,
            writing_in: BTreeSet::new(),
            closed: false,
        }
    }

    pub fn user(&self) -> Option<&UserRef> {
        self.user.as_ref()
    }

    pub fn viewing(&self) -> Option<ThreadId> {
        self.view.map(|h| h.thread())
    }

    /// Decode and handle one text frame. Malformed frames are logged and
    /// otherwise ignored.
    pub fn handle_text(&mut self, text: &str) -> Outcome {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.handle(msg),
            Err(err) => {
                warn!(
                    "Invalid client message from {}: {err} | {}",
                    self.client.id,
                    text.chars().take(100).collect::<String>()
                );
                Outcome::Continue
            }
        }
    }

    pub fn handle(&mut self, msg: ClientMessage) -> Outcome {
        match (msg, self.user.clone()) {
            (ClientMessage::Identify { user_id, name }, _) => {
                self.identify(UserRef::new(user_id, name))
            }
            (msg, Some(user)) => {
                self.dispatch(msg, &user);
                Outcome::Continue
            }
            (_, None) => {
                warn!("Client {} sent message before identifying", self.client.id);
                self.reply(ServerMessage::error("must identify first"));
                Outcome::Close
            }
        }
    }

    fn dispatch(&mut self, msg: ClientMessage, user: &UserRef) {
        match msg {
            ClientMessage::View { thread } => self.view(thread),
            ClientMessage::Leave { thread } => {
                if self.viewing() == Some(thread) {
                    self.leave();
                }
            }
            ClientMessage::Writing { thread } => {
                if self.writing_in.insert(thread) {
                    self.service.retain_writer(thread, user);
                }
                self.service.handle_writing_signal(thread, user);
            }
            ClientMessage::Stopped { thread } => {
                if self.writing_in.remove(&thread) {
                    self.service.release_writer(thread, user);
                }
                self.service.handle_writing_stopped(thread, user);
            }
            ClientMessage::Identify { .. } => {}
        }
    }

    fn identify(&mut self, user: UserRef) -> Outcome {
        if !user.is_valid() {
            self.reply(ServerMessage::error("invalid user"));
            return Outcome::Continue;
        }
        if self.user.is_some() {
            self.reply(ServerMessage::error("already identified"));
            return Outcome::Continue;
        }

        info!("{} identified as {user}", self.client.id);
        self.user = Some(user);
        self.reply(ServerMessage::Identified {});
        Outcome::Continue
    }

    /// One live view per connection: viewing a new thread replaces the old
    /// subscription.
    fn view(&mut self, thread: ThreadId) {
        if self.viewing() == Some(thread) {
            return;
        }
        self.leave();

        let channel: Arc<dyn Channel> = self.client.clone();
        self.view = Some(self.service.subscribe(thread, &channel));
        debug!("{} viewing {thread}", self.client.id);
    }

    fn leave(&mut self) {
        if let Some(handle) = self.view.take() {
            self.service.unsubscribe(&handle);
            debug!("{} left {}", self.client.id, handle.thread());
        }
    }

    fn reply(&self, msg: ServerMessage) {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if let Err(e) = self.client.send(&json) {
                    debug!("reply dropped: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize reply: {e}"),
        }
    }

    /// End of the connection: drop the live view and take the user out of
    /// every thread they were writing in, unless another of their
    /// connections is still writing there. Safe to call more than once.
    pub fn close(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }
        self.leave();

        if let Some(user) = self.user.clone() {
            for thread in std::mem::take(&mut self.writing_in) {
                if self.service.release_writer(thread, &user) {
                    self.service.handle_writing_stopped(thread, &user);
                }
            }
        }
        debug!("Cleaned up session {}", self.client.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
