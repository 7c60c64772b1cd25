//! Client-side engine for the collaborative canvas.
//!
//! DESIGN
//! ======
//! Everything here is single-owner, event-driven state: no locks, no shared
//! memory. The [`session::Session`] is the hub — it consumes decoded
//! [`events::ServerEvent`]s (from the transport) and link events (from the
//! WebRTC driver), mutates the store/mesh/cursor state, and returns the
//! client intents that must go back out on the wire. The transport
//! ([`net`]) and the asset upload side-channel ([`upload`]) are the only
//! async modules; the engine itself is synchronous and fully testable
//! without a network.

pub mod consts;
pub mod cursor;
pub mod media;
pub mod mesh;
pub mod net;
pub mod session;
pub mod store;
pub mod surface;
pub mod upload;
pub mod zorder;

pub use cursor::CursorMap;
pub use media::{CallError, MediaCall};
pub use mesh::{LinkDriver, LinkError, LinkEvent, LinkState, MeshEffect, PeerMesh, TrackId};
pub use session::Session;
pub use store::{ObjectKind, ObjectStore};
pub use surface::{DragAction, PointerSurface, Tool};
pub use zorder::FocusController;
