//! kamerad-protocol – Wire-Protokoll des Status-Hubs
//!
//! - `control`: alle Nachrichten als Tagged Enum (`"type"`-Feld)
//! - `wire`: Frame-Codec (u32 BE Laenge + JSON-Payload)

pub mod control;
pub mod wire;

pub use control::{
    AuthOk, AuthRequest, ControlMessage, ErrorCode, ErrorResponse, HeartbeatMessage, KameraBericht,
    KameraUpdate, NvrEvent, StatsUpdate, SystemStatus,
};
pub use wire::{DekodiertesFrame, FrameCodec};
