//! RIDE protocol engine.
//!
//! Speaks the wire protocol of APL interpreters running in SERVE mode:
//!
//! ```text
//! ┌─────────┬──────────┬─────────────────┐
//! │ Length  │  "RIDE"  │     Payload     │
//! │ 4 bytes │  4 bytes │   UTF-8 JSON    │
//! │ (BE u32)│  (ASCII) │                 │
//! └─────────┴──────────┴─────────────────┘
//! ```
//!
//! The length word counts itself, the tag and the payload. Payloads are
//! either plain handshake lines (`SupportedProtocols=2`) or two-element
//! JSON arrays `["Command", {args}]`.

mod client;
mod error;
mod frame;
mod message;

pub use client::{Client, Conn, Reader};
pub use error::RideError;
pub use frame::{decode_one, encode, MAX_FRAME_LEN};
pub use message::{args, parse_payload, Incoming, Message};
