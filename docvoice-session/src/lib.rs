//! # docvoice-session
//!
//! Persistence for finished calls and logged text chats behind the
//! [`CallStore`] trait, with an in-memory and a directory-backed implementation.

pub mod dir;
pub mod inmemory;
pub mod service;

pub use dir::DirCallStore;
pub use inmemory::InMemoryCallStore;
pub use service::{CallStore, DEFAULT_LIST_LIMIT, PREVIEW_CHARS, preview};
