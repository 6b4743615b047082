//! # VICI
//!
//! A client for the strongSwan VICI protocol: the interface external
//! applications use to configure, control, and monitor the IKE daemon
//! `charon` over its local stream socket.
//!
//! The crate has three layers:
//!
//! - a binary codec for the VICI message encoding, exposed through serde
//!   ([`to_vec`], [`from_slice`]) so that request and response payloads can be
//!   plain Rust structs;
//! - [`Message`], an ordered, dynamically typed message tree for payloads
//!   whose shape is not known at compile time;
//! - [`Session`], an async client that multiplexes command request/response
//!   exchanges and server-pushed event streams over one connection.
//!
//! ## Examples
//!
//! Serializing the [Encoding Example][] from the protocol documentation:
//!
//! ```
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Deserialize, PartialEq, Serialize)]
//! struct RootSection {
//!     key1: String,
//!     section1: MainSection,
//! }
//!
//! #[derive(Debug, Deserialize, PartialEq, Serialize)]
//! #[serde(rename_all = "kebab-case")]
//! struct MainSection {
//!     sub_section: SubSection,
//!     list1: Vec<String>,
//! }
//!
//! #[derive(Debug, Deserialize, PartialEq, Serialize)]
//! struct SubSection {
//!     key2: String,
//! }
//!
//! fn main() -> Result<(), vici::Error> {
//!     let data = RootSection {
//!         key1: "value1".to_string(),
//!         section1: MainSection {
//!             sub_section: SubSection {
//!                 key2: "value2".to_string(),
//!             },
//!             list1: vec!["item1".to_string(), "item2".to_string()],
//!         },
//!     };
//!
//!     // Serialize to a vector.
//!     let msg = vici::to_vec(&data)?;
//!     assert_eq!(
//!         msg,
//!         vec![
//!             // key1 = value1
//!             3, 4, b'k', b'e', b'y', b'1', 0, 6, b'v', b'a', b'l', b'u', b'e', b'1',
//!             // section1
//!             1, 8, b's', b'e', b'c', b't', b'i', b'o', b'n', b'1',
//!             // sub-section
//!             1, 11, b's', b'u', b'b', b'-', b's', b'e', b'c', b't', b'i', b'o', b'n',
//!             // key2 = value2
//!             3, 4, b'k', b'e', b'y', b'2', 0, 6, b'v', b'a', b'l', b'u', b'e', b'2',
//!             // sub-section end
//!             2,
//!             // list1
//!             4, 5, b'l', b'i', b's', b't', b'1',
//!             // item1
//!             5, 0, 5, b'i', b't', b'e', b'm', b'1',
//!             // item2
//!             5, 0, 5, b'i', b't', b'e', b'm', b'2',
//!             // list1 end
//!             6,
//!             // section1 end
//!             2,
//!         ]
//!     );
//!
//!     // Deserialize back to a Rust type.
//!     let deserialized_data: RootSection = vici::from_slice(&msg)?;
//!     assert_eq!(data, deserialized_data);
//!     Ok(())
//! }
//! ```
//!
//! Talking to a daemon:
//!
//! ```no_run
//! use vici::{Message, Session};
//!
//! # async fn run() -> Result<(), vici::Error> {
//! let session = Session::connect().await?;
//!
//! let mut sa = Message::new();
//! sa.set("child", "test-CHILD_SA")?;
//! sa.set("ike", "test-IKE_SA")?;
//!
//! let resp = session.call("initiate", &sa).await?;
//! println!("{}", resp);
//! session.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! [Encoding Example]: https://github.com/strongswan/strongswan/blob/5.9.5/src/libcharon/plugins/vici/README.md#encoding-example

use num_enum::TryFromPrimitive;

#[doc(inline)]
pub use crate::de::{from_reader, from_slice, Deserializer};
#[doc(inline)]
pub use crate::error::{Category, Error, Result};
#[doc(inline)]
pub use crate::message::{from_message, to_message, Message, Value};
#[doc(inline)]
pub use crate::ser::{to_vec, to_writer, Serializer};
#[doc(inline)]
pub use crate::session::{Event, EventStream, Session, SessionBuilder, Socket};

pub mod de;
pub mod error;
pub mod message;
pub mod ser;
pub mod session;

mod conn;
mod packet;
mod read;

/// Message element tags as they appear on the wire.
#[derive(Debug, Eq, PartialEq, TryFromPrimitive)]
#[doc(hidden)]
#[repr(u8)]
pub enum ElementType {
    SectionStart = 1,
    SectionEnd,
    KeyValue,
    ListStart,
    ListItem,
    ListEnd,
}

/// Packet type tags as they appear on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[doc(hidden)]
#[repr(u8)]
pub enum PacketType {
    CmdRequest = 0,
    CmdResponse,
    CmdUnknown,
    EventRegister,
    EventUnregister,
    EventConfirm,
    EventUnknown,
    Event,
}

impl PacketType {
    /// Named packet types carry a length-prefixed name right after the type
    /// byte.
    pub fn is_named(self) -> bool {
        matches!(
            self,
            PacketType::CmdRequest | PacketType::EventRegister | PacketType::EventUnregister | PacketType::Event
        )
    }
}
