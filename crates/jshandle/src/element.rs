//! Element handles - DOM nodes with geometry
//!
//! Geometry is never cached: every query re-fetches quads or box models from
//! the peer, shifts them by the element's OOPIF offset chain and only then
//! reasons about the viewport.
//!
//! Back-references to the frame, page and frame manager are weak. A dropped
//! collaborator turns into `HandleError::StaleFrame` at the call site
//! instead of keeping a torn-down frame alive.

use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::cdp::protocol::{
    DOM_DESCRIBE_NODE, DOM_GET_BOX_MODEL, DOM_GET_CONTENT_QUADS, DOM_GET_FRAME_OWNER,
    DOM_SET_FILE_INPUT_FILES, PAGE_GET_LAYOUT_METRICS,
};
use crate::context::{map_protocol_error, EvalArg};
use crate::error::{HandleError, Result};
use crate::frame::{Frame, FrameManager, Page};
use crate::handle::{Handle, JsHandle};
use crate::options::{ScreenshotOptions, Viewport, WaitForSelectorOptions};
use crate::scripts;
use dom::geometry::{self, apply_offset, quad_from_protocol};
use dom::{BoundingBox, BoxModel, DescribedNode, FrameOffset, LayoutMetrics, Point, RawBoxModel};

/// Handle to a DOM element anchored to a frame
#[derive(Clone)]
pub struct ElementHandle {
    handle: JsHandle,
    frame: Weak<dyn Frame>,
    page: Weak<dyn Page>,
    frame_manager: Weak<dyn FrameManager>,
}

impl ElementHandle {
    pub(crate) fn new(
        handle: JsHandle,
        frame: &Arc<dyn Frame>,
        page: &Arc<dyn Page>,
        frame_manager: &Arc<dyn FrameManager>,
    ) -> Self {
        Self {
            handle,
            frame: Arc::downgrade(frame),
            page: Arc::downgrade(page),
            frame_manager: Arc::downgrade(frame_manager),
        }
    }

    pub fn frame(&self) -> Result<Arc<dyn Frame>> {
        self.frame.upgrade().ok_or(HandleError::StaleFrame)
    }

    pub fn page(&self) -> Result<Arc<dyn Page>> {
        self.page.upgrade().ok_or(HandleError::StaleFrame)
    }

    pub fn frame_manager(&self) -> Result<Arc<dyn FrameManager>> {
        self.frame_manager.upgrade().ok_or(HandleError::StaleFrame)
    }

    pub(crate) async fn describe_node(&self) -> Result<DescribedNode> {
        let object_id = self.object_id()?;
        let response = self
            .client()
            .send(DOM_DESCRIBE_NODE, Some(json!({ "objectId": object_id })))
            .await
            .map_err(map_protocol_error)?;
        let node = response
            .get("node")
            .cloned()
            .ok_or_else(|| HandleError::Assertion("DOM.describeNode returned no node".into()))?;
        Ok(serde_json::from_value(node)?)
    }

    /// Child frame behind an `<iframe>`/`<frame>` element
    pub async fn content_frame(&self) -> Result<Option<Arc<dyn Frame>>> {
        let node = self.describe_node().await?;
        let Some(frame_id) = node.frame_id else {
            return Ok(None);
        };
        Ok(self.frame_manager()?.frame(&frame_id))
    }

    // ---- geometry -------------------------------------------------------

    /// Page-space offset of this element's frame
    ///
    /// Walks up the frame tree; every out-of-process frame contributes the
    /// top-left corner of its owner element's content box, as seen by the
    /// parent. Stops early if the parent reports no model for an owner;
    /// a failed lookup is an error rather than a partial offset.
    pub async fn oopif_offset(&self) -> Result<FrameOffset> {
        let mut offsets = Vec::new();
        let mut current = self.frame()?;

        while let Some(parent) = current.parent_frame() {
            if current.is_oop_frame() {
                match frame_owner_offset(&parent, current.id()).await? {
                    Some(offset) => offsets.push(offset),
                    None => break,
                }
            }
            current = parent;
        }

        Ok(geometry::accumulate_offsets(offsets))
    }

    async fn raw_box_model(&self) -> Result<Option<RawBoxModel>> {
        let object_id = self.object_id()?;
        let response = match self
            .client()
            .send(DOM_GET_BOX_MODEL, Some(json!({ "objectId": object_id })))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("No box model for {}: {}", object_id, e);
                return Ok(None);
            }
        };
        match response.get("model") {
            Some(model) => Ok(Some(serde_json::from_value(model.clone())?)),
            None => Ok(None),
        }
    }

    /// Border box in page space; `None` for detached or non-rendered nodes
    pub async fn bounding_box(&self) -> Result<Option<BoundingBox>> {
        let Some(raw) = self.raw_box_model().await? else {
            return Ok(None);
        };
        let offset = self.oopif_offset().await?;
        Ok(Some(geometry::border_bounding_box(&raw, offset)?))
    }

    /// All four boxes in page space; `None` for detached or non-rendered nodes
    pub async fn box_model(&self) -> Result<Option<BoxModel>> {
        let Some(raw) = self.raw_box_model().await? else {
            return Ok(None);
        };
        let offset = self.oopif_offset().await?;
        Ok(Some(geometry::box_model(&raw, offset)?))
    }

    /// Page-space point to dispatch a pointer event at
    ///
    /// With `offset`, the point is relative to the top-left corner of the
    /// first visible quad; otherwise it is that quad's center.
    pub async fn clickable_point(&self, offset: Option<Point>) -> Result<Point> {
        let object_id = self.object_id()?;
        let client = self.client();
        let page_client = self.page()?.client();

        let (quads, metrics) = futures_util::join!(
            client.send(DOM_GET_CONTENT_QUADS, Some(json!({ "objectId": object_id }))),
            page_client.send(PAGE_GET_LAYOUT_METRICS, None),
        );

        let quads: Vec<Vec<f64>> = match quads {
            Ok(response) => {
                serde_json::from_value(response.get("quads").cloned().unwrap_or(json!([])))?
            }
            Err(e) => {
                tracing::debug!("Failed to fetch content quads for {}: {}", object_id, e);
                Vec::new()
            }
        };
        if quads.is_empty() {
            return Err(HandleError::NotClickable);
        }

        let metrics: LayoutMetrics = serde_json::from_value(metrics.map_err(map_protocol_error)?)?;
        let (client_width, client_height) = metrics.client_size();
        let frame_offset = self.oopif_offset().await?;

        let page_quads = quads
            .iter()
            .map(|raw| quad_from_protocol(raw).map(|q| apply_offset(q, frame_offset)))
            .collect::<dom::Result<Vec<_>>>()?;

        geometry::clickable_point(page_quads, client_width, client_height, offset)
            .ok_or(HandleError::NotClickable)
    }

    /// Whether the visible fraction of the element exceeds `threshold`
    ///
    /// `threshold == 1.0` means "fully visible".
    pub async fn is_intersecting_viewport(&self, threshold: f64) -> Result<bool> {
        let ratio = self
            .evaluate(scripts::INTERSECTION_RATIO, vec![])
            .await?
            .as_f64()
            .ok_or_else(|| HandleError::Assertion("intersection ratio is not a number".into()))?;
        Ok(passes_threshold(ratio, threshold))
    }

    /// Scroll the element into view unless it is already fully visible
    ///
    /// With page scripting disabled the scroll is forced, since the
    /// intersection observer would never fire.
    pub async fn scroll_into_view_if_needed(&self) -> Result<()> {
        let javascript_enabled = self.page()?.is_javascript_enabled();
        let outcome = self
            .evaluate(
                scripts::SCROLL_INTO_VIEW_IF_NEEDED,
                vec![Value::Bool(javascript_enabled).into()],
            )
            .await?;
        match outcome {
            Value::String(error) => Err(HandleError::DetachedElement(error)),
            _ => Ok(()),
        }
    }

    /// Screenshot of just this element
    ///
    /// Temporarily enlarges the viewport when the element does not fit; the
    /// original viewport is restored whether or not the capture succeeds.
    pub async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>> {
        let page = self.page()?;
        let bounding_box = self.bounding_box().await?.ok_or_else(not_visible)?;

        let original = page.viewport();
        let mut needs_reset = false;
        if let Some(viewport) = &original {
            if let Some(enlarged) = enlarged_viewport(viewport, &bounding_box) {
                page.set_viewport(enlarged).await?;
                needs_reset = true;
            }
        }

        let result = self.capture(&page, options).await;

        if let (true, Some(viewport)) = (needs_reset, original) {
            if let Err(e) = page.set_viewport(viewport).await {
                tracing::warn!("Failed to restore viewport after element screenshot: {}", e);
                if result.is_ok() {
                    return Err(e);
                }
            }
        }
        result
    }

    async fn capture(&self, page: &Arc<dyn Page>, options: ScreenshotOptions) -> Result<Vec<u8>> {
        self.scroll_into_view_if_needed().await?;

        let bounding_box = self.bounding_box().await?.ok_or_else(not_visible)?;
        if bounding_box.width == 0.0 {
            return Err(HandleError::DetachedElement("Node has 0 width.".into()));
        }
        if bounding_box.height == 0.0 {
            return Err(HandleError::DetachedElement("Node has 0 height.".into()));
        }

        let response = self
            .client()
            .send(PAGE_GET_LAYOUT_METRICS, None)
            .await
            .map_err(map_protocol_error)?;
        let metrics: LayoutMetrics = serde_json::from_value(response)?;
        let scroll = metrics.page_scroll();

        let clip = BoundingBox::new(
            bounding_box.x + scroll.x,
            bounding_box.y + scroll.y,
            bounding_box.width,
            bounding_box.height,
        );
        page.screenshot(ScreenshotOptions {
            clip: Some(options.clip.unwrap_or(clip)),
            ..options
        })
        .await
    }

    // ---- DOM ------------------------------------------------------------

    pub async fn focus(&self) -> Result<()> {
        self.evaluate(scripts::FOCUS, vec![]).await?;
        Ok(())
    }

    /// Select `<option>`s by value and fire `input` + `change`
    ///
    /// Single selects take the first matching value only; unmatched values
    /// are ignored. Returns the values that ended up selected.
    pub async fn select<I, V>(&self, values: I) -> Result<HashSet<String>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values
            .into_iter()
            .map(|v| match v.into() {
                Value::String(s) => Ok(Value::String(s)),
                other => Err(HandleError::InvalidArgument(format!(
                    "Values must be strings. Found value {} of type {}",
                    other,
                    json_type_name(&other)
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let applied = self
            .evaluate(scripts::SELECT_OPTIONS, vec![Value::Array(values).into()])
            .await?;
        let applied: Vec<String> = serde_json::from_value(applied)?;
        Ok(applied.into_iter().collect())
    }

    /// Set the files of an `<input type=file>`
    ///
    /// Relative paths resolve against the current working directory. An
    /// empty list clears the input without a protocol file-set call.
    pub async fn upload_file<P: AsRef<Path>>(&self, paths: &[P]) -> Result<()> {
        let is_multiple = self
            .evaluate(scripts::IS_MULTIPLE, vec![])
            .await?
            .as_bool()
            .unwrap_or(false);
        if paths.len() > 1 && !is_multiple {
            return Err(HandleError::InvalidArgument(
                "Multiple file uploads only work with <input type=file multiple>".into(),
            ));
        }

        if paths.is_empty() {
            self.evaluate(scripts::CLEAR_FILES, vec![]).await?;
            return Ok(());
        }

        let cwd = std::env::current_dir().map_err(|e| {
            HandleError::EnvironmentUnsupported(format!("cannot resolve file paths: {}", e))
        })?;
        let files: Vec<String> = paths
            .iter()
            .map(|p| resolve_upload_path(p.as_ref(), &cwd))
            .collect();

        let node = self.describe_node().await?;
        let object_id = self.object_id()?;
        self.client()
            .send(
                DOM_SET_FILE_INPUT_FILES,
                Some(json!({
                    "objectId": object_id,
                    "files": files,
                    "backendNodeId": node.backend_node_id,
                })),
            )
            .await
            .map_err(map_protocol_error)?;
        Ok(())
    }

    /// First descendant matching a CSS selector (`$`)
    pub async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let handle = self
            .evaluate_handle(scripts::QUERY_SELECTOR, vec![selector.into()])
            .await?;
        Ok(element_or_dispose(handle).await)
    }

    /// All descendants matching a CSS selector (`$$`)
    pub async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let array = self
            .evaluate_handle(scripts::QUERY_SELECTOR_ALL, vec![selector.into()])
            .await?;
        collect_elements(array).await
    }

    /// Run `function(match, ...args)` on the first descendant matching `selector` (`$eval`)
    pub async fn eval_on_selector(
        &self,
        selector: &str,
        function: &str,
        args: Vec<EvalArg>,
    ) -> Result<Value> {
        let element = self
            .query_selector(selector)
            .await?
            .ok_or_else(|| HandleError::ElementNotFound(selector.to_string()))?;
        let result = element.evaluate(function, args).await;
        element.dispose().await;
        result
    }

    /// Run `function(matches, ...args)` on the array of all matches (`$$eval`)
    pub async fn eval_on_selector_all(
        &self,
        selector: &str,
        function: &str,
        args: Vec<EvalArg>,
    ) -> Result<Value> {
        let array = self
            .evaluate_handle(scripts::QUERY_SELECTOR_ALL, vec![selector.into()])
            .await?;
        let result = array.evaluate(function, args).await;
        array.dispose().await;
        result
    }

    /// Elements matching an XPath evaluated relative to this element (`$x`)
    pub async fn xpath(&self, expression: &str) -> Result<Vec<ElementHandle>> {
        let array = self
            .evaluate_handle(scripts::XPATH_ALL, vec![expression.into()])
            .await?;
        collect_elements(array).await
    }

    /// Wait for an XPath match scoped under this element
    ///
    /// The wait runs in the frame's secondary world; the match is adopted
    /// back into the main world. Intermediate handles are disposed on every
    /// path, including timeouts.
    pub async fn wait_for_xpath(
        &self,
        xpath: &str,
        options: WaitForSelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        let xpath = scope_xpath(xpath)?;
        let frame = self.frame()?;
        let secondary = frame.secondary_world();
        let adopted_root = secondary
            .execution_context()
            .await?
            .adopt_element_handle(self)
            .await?;

        let found = with_timeout(
            options.timeout,
            secondary.wait_for_xpath(&xpath, &adopted_root, &options),
        )
        .await;
        adopted_root.dispose().await;

        let Some(found) = found? else {
            return Ok(None);
        };

        let adopted = match found.as_element() {
            Some(element) => match frame.main_world().execution_context().await {
                Ok(main) => main.adopt_element_handle(element).await,
                Err(e) => Err(e),
            },
            None => Err(HandleError::Assertion(
                "XPath wait resolved to a non-element".into(),
            )),
        };
        found.dispose().await;
        adopted.map(Some)
    }
}

impl Deref for ElementHandle {
    type Target = JsHandle;

    fn deref(&self) -> &JsHandle {
        &self.handle
    }
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementHandle")
            .field("handle", &self.handle)
            .field("frame_alive", &(self.frame.strong_count() > 0))
            .finish()
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.handle, f)
    }
}

/// Content-box top-left of the element owning `frame_id`, as seen by `parent`
async fn frame_owner_offset(parent: &Arc<dyn Frame>, frame_id: &str) -> Result<Option<FrameOffset>> {
    let client = parent.client();
    let owner = client
        .send(DOM_GET_FRAME_OWNER, Some(json!({ "frameId": frame_id })))
        .await
        .map_err(map_protocol_error)?;
    let backend_node_id = owner["backendNodeId"]
        .as_i64()
        .ok_or_else(|| HandleError::Assertion("DOM.getFrameOwner returned no backendNodeId".into()))?;

    let response = client
        .send(DOM_GET_BOX_MODEL, Some(json!({ "backendNodeId": backend_node_id })))
        .await
        .map_err(map_protocol_error)?;
    let Some(model) = response.get("model") else {
        tracing::debug!("No box model for owner of frame {}", frame_id);
        return Ok(None);
    };
    let raw: RawBoxModel = serde_json::from_value(model.clone())?;
    Ok(Some(quad_from_protocol(&raw.content)?.first().into()))
}

/// Keep element properties of a remote array, dispose everything else
async fn collect_elements(array: Handle) -> Result<Vec<ElementHandle>> {
    let properties = array.get_properties().await;
    array.dispose().await;

    let mut elements = Vec::new();
    for handle in properties?.into_values() {
        if let Some(element) = element_or_dispose(handle).await {
            elements.push(element);
        }
    }
    Ok(elements)
}

async fn element_or_dispose(handle: Handle) -> Option<ElementHandle> {
    match handle {
        Handle::Element(element) => Some(element),
        other => {
            other.dispose().await;
            None
        }
    }
}

async fn with_timeout<T>(timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    if timeout.is_zero() {
        return fut.await;
    }
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| HandleError::Timeout(timeout))?
}

fn not_visible() -> HandleError {
    HandleError::DetachedElement("Node is either not visible or not an HTMLElement".into())
}

/// Viewport large enough to hold `bounding_box`, if the current one is not
fn enlarged_viewport(viewport: &Viewport, bounding_box: &BoundingBox) -> Option<Viewport> {
    if bounding_box.width <= f64::from(viewport.width)
        && bounding_box.height <= f64::from(viewport.height)
    {
        return None;
    }
    Some(Viewport {
        width: viewport.width.max(bounding_box.width.ceil() as u32),
        height: viewport.height.max(bounding_box.height.ceil() as u32),
        ..viewport.clone()
    })
}

/// `ratio > threshold`, except that a threshold of 1 requires full visibility
pub(crate) fn passes_threshold(ratio: f64, threshold: f64) -> bool {
    if threshold == 1.0 {
        ratio == 1.0
    } else {
        ratio > threshold
    }
}

/// Rewrite `//x` to `.//x` so the search stays under the root element
pub(crate) fn scope_xpath(xpath: &str) -> Result<String> {
    let scoped = match xpath.strip_prefix("//") {
        Some(rest) => format!(".//{}", rest),
        None => xpath.to_string(),
    };
    if !scoped.starts_with(".//") {
        return Err(HandleError::UnsupportedExpression(scoped));
    }
    Ok(scoped)
}

/// Absolute in either POSIX or Windows terms
fn is_absolute_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    let drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/');
    path.starts_with('/') || path.starts_with('\\') || drive
}

/// Resolve an upload path the way the peer expects it
///
/// Absolute paths pass through untouched; relative ones are joined onto
/// `cwd` and normalized lexically.
pub(crate) fn resolve_upload_path(path: &Path, cwd: &Path) -> String {
    let raw = path.to_string_lossy();
    if is_absolute_path(&raw) {
        return raw.into_owned();
    }

    let mut resolved = PathBuf::new();
    for component in cwd.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved.to_string_lossy().into_owned()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "object",
    }
}
