//! Remote JavaScript handles - Rust Implementation
//!
//! Local proxies for values that live inside a browser's JavaScript engine,
//! driven over CDP (Chrome DevTools Protocol). Plain values are `JsHandle`s;
//! DOM nodes additionally carry geometry and interaction as `ElementHandle`s.
//!
//! # Architecture
//!
//! 1. **Contexts own lifetimes**: every handle registers with its
//!    `ExecutionContext`; destroying the context invalidates them all at once
//! 2. **One branch point**: `create_handle` is the only place deciding between
//!    plain and element handles
//! 3. **Transport is a trait**: anything implementing `CdpSession` can drive
//!    handles, so tests run against an in-memory peer

pub mod cdp;
pub mod context;
pub mod element;
pub mod error;
pub mod events;
pub mod frame;
pub mod handle;
pub mod options;

mod scripts;

#[cfg(test)]
mod testing;

pub use cdp::{CdpError, CdpSession};
pub use context::{EvalArg, ExecutionContext, ExecutionContextId};
pub use element::ElementHandle;
pub use error::{HandleError, Result};
pub use events::{ContextEvent, EventBus};
pub use frame::{Frame, FrameId, FrameManager, Page, World, WorldKind};
pub use handle::{create_handle, Handle, JsHandle, PropertyMap};
pub use options::{ImageFormat, ScreenshotOptions, Viewport, WaitForSelectorOptions};

pub use dom::{BoundingBox, BoxModel, FrameOffset, Point, RemoteObject};
