//! # Network Module
//!
//! Everything that crosses a socket. The protocol crate stays
//! transport-agnostic: it defines frames, messages and the state machines
//! that react to them, and the node binary owns the TCP listener.
//!
//! ## Architecture
//!
//! ```text
//! codec.rs    - u32 length prefix + JSON payload, sync and async
//! messages.rs - Envelope and the message_type-tagged bodies
//! session.rs  - SecureChannel: DH handshake, key announcement, sealed data
//! service.rs  - LedgerService: transaction, verification, balance requests
//! ```
//!
//! ## Design Decisions
//!
//! - The relay routes on `receiver` alone and forwards frames byte for
//!   byte, so peers can add fields without touching it.
//! - Big integers travel as decimal strings. Plain JSON integers are still
//!   accepted on input.

pub mod codec;
pub mod messages;
pub mod service;
pub mod session;

pub use codec::{
    decode_frame, encode_frame, read_frame, read_frame_bytes, write_frame, write_frame_bytes,
    CodecError,
};
pub use messages::{DhMessage, Envelope, Hello, MessageBody, RouteHeader};
pub use service::{LedgerService, ServiceError};
pub use session::{SecureChannel, SessionError, SessionEvent};
