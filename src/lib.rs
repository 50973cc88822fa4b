//! stomp-mq - a STOMP 1.0 message-queue client with broker dialects
//!
//! The core is a generic STOMP engine ([`Connection`]): frame codec,
//! connection handshake, receipt-correlated verbs, transaction tracking and
//! a pending-message buffer. On top of it sit three broker dialects:
//!
//! - [`activemq`] - ActiveMQ-style baseline, `\0\n` frame terminator,
//!   destinations named by the caller.
//! - [`ocamlmq`] - adds a queue-size control query and per-message
//!   ack timeouts.
//! - [`rabbitmq`] - bare-`\0` terminator, topic routing via `amq.topic`,
//!   durable queue declaration through a transient side-connection.
//!
//! All of it is async; the [`blocking`] module exposes the same surface for
//! synchronous callers.

use custom_debug_derive::Debug as CustomDebug;

pub mod activemq;
pub mod blocking;
pub mod client;
mod errors;
mod frame;
pub mod ocamlmq;
pub mod rabbitmq;
mod token;

pub use client::{ConnectConfig, Connection};
pub use errors::{ConnectionKind, ErrorKind, Restartability, StompError};

pub type Result<T> = std::result::Result<T, StompError>;

fn pretty_bytes(b: &Vec<u8>, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "{}", String::from_utf8_lossy(b))
}

/// A message delivered by the broker from a subscription.
#[derive(CustomDebug, Clone)]
pub struct Message {
    /// Value of the `message-id` header.
    pub id: String,
    /// All frame headers, names lowercased and values stripped of
    /// surrounding whitespace, in wire order.
    pub headers: Vec<(String, String)>,
    /// The message content
    #[debug(with = "pretty_bytes")]
    pub body: Vec<u8>,
}

impl Message {
    /// First header with the given (lowercase) name, if any.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the `destination` header, if the broker sent one.
    pub fn destination(&self) -> Option<&str> {
        self.header("destination")
    }
}
