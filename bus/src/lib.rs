//! Shared message channel for the room relay.
//!
//! Every room multiplexes over one named channel: publishers push serialized
//! [`Envelope`]s, a [`Subscription`] drains them in publish order, and the
//! consumer filters by the envelope's `room` tag. Publishing never blocks on
//! slow consumers; a lagging subscriber loses the oldest messages.
//!
//! # Example
//! ```
//! # async fn example() -> Result<(), bus::BusError> {
//! use bus::{Bus, Envelope};
//!
//! let bus = Bus::new("editor");
//! let mut sub = bus.subscribe();
//!
//! bus.publish(&Envelope::edit("default", "x = 1"))?;
//! if let Some(payload) = sub.next().await {
//!     assert_eq!(bus::peek_room(&payload).as_deref(), Some("default"));
//! }
//! # Ok(())
//! # }
//! ```

mod channel;
mod envelope;

pub use channel::{Bus, Subscription};
pub use envelope::{BusError, Envelope, Kind, decode, encode, peek_room};
