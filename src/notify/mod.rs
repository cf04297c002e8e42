//! Notification service
//!
//! The one place where presence tracking and subscriptions meet: a writing
//! signal goes through the tracker, and when the writer list of a thread
//! changes the new list is serialized and broadcast to that thread's viewers.

pub mod service;

pub use service::NotificationService;
