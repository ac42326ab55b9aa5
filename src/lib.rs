//! Wire-protocol foundation for a block-world multiplayer game.
//!
//! `craftwire` provides the lowest layers a game server or client needs to
//! speak the protocol:
//!
//! - **Protocol**: big-endian and variable-length integer codecs, the
//!   UTF-16-oriented string types, and in-memory buffer streams with a
//!   length-prefix reservation for packet assembly
//! - **Tag tree**: a recursive reader for the binary tagged-tree format,
//!   including a SAX-style reader that binds known tags to field handlers
//!   and resolves out-of-order prerequisites
//! - **Chat**: a reader turning the JSON rich-text format into a tree of
//!   styled components
//! - **Reactor**: a single-threaded, edge-triggered socket reactor with a
//!   periodic tick, packet framing over non-blocking streams, and a
//!   residual write queue with zero-copy file send
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use craftwire::{Connection, EventSet, PacketHandler, Reactor};
//!
//! struct Echo;
//!
//! impl PacketHandler for Echo {
//!     fn packet(&mut self, payload: &mut craftwire::ByteReader<'_>,
//!               link: &mut craftwire::Link<'_, '_>) -> std::io::Result<()> {
//!         let body = payload.read_slice(payload.remaining())?;
//!         link.write_frame(body)?;
//!         Ok(())
//!     }
//! }
//!
//! let mut reactor = Reactor::new()?;
//! reactor.register(socket, EventSet::IN, Box::new(Connection::new(Echo)))?;
//! loop { reactor.execute()?; }
//! ```
//!
//! The reactor and everything registered with it live on one thread; all
//! mutation happens from descriptor handlers running on that thread.

pub mod chat;
pub mod nbt;
pub mod protocol;
pub mod reactor;

// Re-export the core types at crate root for convenience
pub use protocol::{ByteReader, ByteWriter, JavaString, Mark, WireError};

pub use nbt::{NbtError, Tag, TagCompound, TagKind, TagList};

pub use chat::{ChatColor, ChatComponent, ChatError, ClickEvent, Content, HoverEvent};

pub use reactor::connection::{Connection, FrameError, Link, PacketFramer, PacketHandler};
pub use reactor::writable::Writable;
pub use reactor::{Context, EventHandler, EventSet, NextStatus, Reactor, ReactorError};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::chat::ChatComponent;
    pub use crate::nbt::{Tag, TagCompound, TagKind, TagList};
    pub use crate::protocol::{ByteReader, ByteWriter, JavaString};
    pub use crate::reactor::{EventHandler, EventSet, NextStatus, Reactor};
}
