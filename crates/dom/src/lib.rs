//! Remote value model and element geometry
//!
//! Pure, synchronous half of the handle core: the wire shape of values held
//! by the remote peer, and the geometry engine that turns protocol quads into
//! page-space coordinates.
//!
//! ```text
//! DOM.getContentQuads → Quad<LocalSpace> → apply_offset → Quad<PageSpace> → clip → area filter → Point
//!                                        ↑
//!                              OOPIF chain offsets (summed)
//! ```

pub mod error;
pub mod geometry;
pub mod remote;
pub mod types;

pub use error::{DomError, Result};
pub use remote::{
    value_from_remote_object, BackendNodeId, DescribedNode, PropertyDescriptor, RemoteObject,
    RemoteObjectId, RemoteObjectSubtype, RemoteObjectType,
};
pub use types::*;
