//! Collaborator interfaces - frames, worlds, pages, frame managers
//!
//! Frame-tree bookkeeping lives outside this crate. Handles only need the
//! handful of lookups below, and they hold frames weakly so teardown is
//! never blocked by an outstanding handle.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cdp::CdpSession;
use crate::context::ExecutionContext;
use crate::element::ElementHandle;
use crate::error::Result;
use crate::handle::Handle;
use crate::options::{ScreenshotOptions, Viewport, WaitForSelectorOptions};

/// Frame identifier from CDP
pub type FrameId = String;

/// Which JavaScript world of a frame a context belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorldKind {
    /// The page's own scripts run here
    Main,
    /// Isolated world for tooling scripts
    Secondary,
}

/// A frame in the page's frame tree
pub trait Frame: Send + Sync {
    fn id(&self) -> &str;

    fn parent_frame(&self) -> Option<Arc<dyn Frame>>;

    /// Rendered by a separate process with its own coordinate origin
    fn is_oop_frame(&self) -> bool;

    /// Session bound to this frame's target
    fn client(&self) -> Arc<dyn CdpSession>;

    fn main_world(&self) -> Arc<dyn World>;

    fn secondary_world(&self) -> Arc<dyn World>;

    fn frame_manager(&self) -> Arc<dyn FrameManager>;
}

/// One JavaScript world of a frame
#[async_trait]
pub trait World: Send + Sync {
    fn kind(&self) -> WorldKind;

    /// Current context of this world; waits for it if a navigation is in flight
    async fn execution_context(&self) -> Result<Arc<ExecutionContext>>;

    /// Poll for an XPath match under `root`
    ///
    /// Resolves to `None` when waiting for `hidden` and the node is absent.
    async fn wait_for_xpath(
        &self,
        xpath: &str,
        root: &ElementHandle,
        options: &WaitForSelectorOptions,
    ) -> Result<Option<Handle>>;
}

/// The page owning the frame tree
#[async_trait]
pub trait Page: Send + Sync {
    fn is_javascript_enabled(&self) -> bool;

    fn viewport(&self) -> Option<Viewport>;

    async fn set_viewport(&self, viewport: Viewport) -> Result<()>;

    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>>;

    /// Session bound to the top-level target
    fn client(&self) -> Arc<dyn CdpSession>;
}

/// Frame registry of one page
pub trait FrameManager: Send + Sync {
    fn frame(&self, frame_id: &str) -> Option<Arc<dyn Frame>>;

    fn page(&self) -> Arc<dyn Page>;
}
