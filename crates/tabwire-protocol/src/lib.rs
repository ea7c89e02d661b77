//! # tabwire protocol
//!
//! Generic envelope and wire types for the browser remote debugging protocol.
//!
//! Nothing in this crate talks to a socket. It describes:
//!
//! - [`Command`] - an outbound call with its method, params and result decoder
//! - [`Event`] - an inbound notification key with its payload decoder
//! - [`OutboundFrame`] / [`InboundFrame`] - the JSON frames on the wire
//! - [`CdpError`] - the error taxonomy shared by every tabwire crate
//!
//! Typed per-domain definitions are built on top of these two envelopes; only
//! the mechanics every method and event rides on live here.

mod command;
mod error;
mod event;
mod types;
mod wire;

pub use command::{Command, Decoder};
pub use error::CdpError;
pub use event::Event;
pub use types::{BrowserVersionReport, SessionId, TargetId, TargetInfo, PAGE_TARGET_TYPE};
pub use wire::{InboundFrame, OutboundFrame, ReplyOutcome};
