//! # Artifact Core
//!
//! Core types, collaborator traits, and errors for networked artifacts.
//!
//! An artifact never implements the federated messaging protocol itself.
//! This crate defines the narrow contracts it consumes, so the lifecycle in
//! `artifact-node` works the same against a real server adapter or the
//! in-memory network used for tests.
//!
//! ## Key Traits
//!
//! - [`DirectoryService`]: account registration
//! - [`SessionConnector`] / [`Session`]: authenticated transport
//! - [`Codec`]: conversion between [`Stanza`] and [`Message`]
//! - [`Presence`]: availability announcements
//!
//! ## Key Types
//!
//! - [`Jid`]: bare network identity (`local@domain`)
//! - [`Message`]: structured message handled by artifact logic
//! - [`Stanza`]: raw message carried by a session
//! - [`MessageFilter`]: selects which inbound stanzas reach the mailbox
//! - [`MemoryNetwork`]: in-process server implementing every contract

pub mod codec;
pub mod error;
pub mod identity;
pub mod memory_transport;
pub mod message;
pub mod transport;

// Re-export main types
pub use codec::*;
pub use error::*;
pub use identity::*;
pub use memory_transport::*;
pub use message::*;
pub use transport::*;
