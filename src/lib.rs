#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

//! Client for the Apple Push Notification service: one multiplexed HTTP/2
//! connection pool, a cached ES256 provider token, and per-notification
//! dispatch with typed outcomes.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod notification;
pub mod response;
pub mod transport;

mod token;

pub use client::Client;
pub use config::{ClientConfig, Endpoint};
pub use error::{Error, Result};
pub use events::{ClientEvent, INVALID_SIGNING_KEY};
pub use notification::{Notification, Payload, Priority, PushType};
pub use response::{Delivered, GatewayRejection, SendResult, UNKNOWN_ERROR_REASON};
