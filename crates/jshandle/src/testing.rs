//! In-memory collaborators for unit tests
//!
//! `FakeSession` records every protocol call and answers through a
//! responder closure; the fake frame tree wires real execution contexts to
//! it so handles behave exactly as they would against a live peer.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use crate::cdp::{self, CdpSession};
use crate::context::ExecutionContext;
use crate::element::ElementHandle;
use crate::error::{HandleError, Result};
use crate::frame::{Frame, FrameManager, Page, World, WorldKind};
use crate::handle::{create_handle, Handle};
use crate::options::{ScreenshotOptions, Viewport, WaitForSelectorOptions};
use dom::RemoteObject;

type Responder = Box<dyn Fn(&str, &Value) -> cdp::Result<Value> + Send + Sync>;

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub(crate) struct FakeSession {
    responder: Responder,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeSession {
    pub(crate) fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str, &Value) -> cdp::Result<Value> + Send + Sync + 'static,
    {
        init_tracing();
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_call(&self) -> Option<(String, Value)> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(m, _)| m).collect()
    }

    pub(crate) fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|(m, _)| m == method).count()
    }

    /// Params of every call to `method`, in order
    pub(crate) fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p)
            .collect()
    }
}

#[async_trait]
impl CdpSession for FakeSession {
    async fn send(&self, method: &str, params: Option<Value>) -> cdp::Result<Value> {
        let params = params.unwrap_or(Value::Null);
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));
        (self.responder)(method, &params)
    }
}

/// Remote DOM node reference
pub(crate) fn node_object(object_id: &str) -> RemoteObject {
    object_ref(object_id, Some("node"))
}

/// Remote object reference with an optional subtype
pub(crate) fn object_ref(object_id: &str, subtype: Option<&str>) -> RemoteObject {
    let mut object = json!({"type": "object", "objectId": object_id});
    if let Some(subtype) = subtype {
        object["subtype"] = json!(subtype);
    }
    serde_json::from_value(object).unwrap()
}

/// Protocol quad for an axis-aligned rectangle
pub(crate) fn rect_quad(x: f64, y: f64, width: f64, height: f64) -> Value {
    json!([x, y, x + width, y, x + width, y + height, x, y + height])
}

/// `DOM.getBoxModel` result where all four boxes coincide
pub(crate) fn box_model_response(x: f64, y: f64, width: f64, height: f64) -> Value {
    let quad = rect_quad(x, y, width, height);
    json!({
        "model": {
            "content": quad,
            "padding": quad,
            "border": quad,
            "margin": quad,
            "width": width,
            "height": height,
        }
    })
}

/// `Page.getLayoutMetrics` result for a CSS viewport scrolled to `(scroll_x, scroll_y)`
pub(crate) fn layout_metrics(width: f64, height: f64, scroll_x: f64, scroll_y: f64) -> Value {
    json!({
        "layoutViewport": {"pageX": scroll_x, "pageY": scroll_y, "clientWidth": width * 2.0, "clientHeight": height * 2.0},
        "cssLayoutViewport": {"pageX": scroll_x, "pageY": scroll_y, "clientWidth": width, "clientHeight": height},
        "cssVisualViewport": {
            "offsetX": 0, "offsetY": 0,
            "pageX": scroll_x, "pageY": scroll_y,
            "clientWidth": width, "clientHeight": height,
            "scale": 1
        }
    })
}

pub(crate) struct FakePage {
    client: Arc<FakeSession>,
    javascript_enabled: AtomicBool,
    viewport: Mutex<Option<Viewport>>,
    pub(crate) viewport_changes: Mutex<Vec<Viewport>>,
    pub(crate) screenshots: Mutex<Vec<ScreenshotOptions>>,
}

impl FakePage {
    fn new(client: Arc<FakeSession>) -> Arc<Self> {
        Arc::new(Self {
            client,
            javascript_enabled: AtomicBool::new(true),
            viewport: Mutex::new(Some(Viewport::default())),
            viewport_changes: Mutex::new(Vec::new()),
            screenshots: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_javascript_enabled(&self, enabled: bool) {
        self.javascript_enabled.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl Page for FakePage {
    fn is_javascript_enabled(&self) -> bool {
        self.javascript_enabled.load(Ordering::SeqCst)
    }

    fn viewport(&self) -> Option<Viewport> {
        self.viewport.lock().unwrap().clone()
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.viewport_changes.lock().unwrap().push(viewport.clone());
        *self.viewport.lock().unwrap() = Some(viewport);
        Ok(())
    }

    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>> {
        self.screenshots.lock().unwrap().push(options);
        Ok(b"\x89PNG".to_vec())
    }

    fn client(&self) -> Arc<dyn CdpSession> {
        self.client.clone()
    }
}

pub(crate) struct FakeFrameManager {
    page: Arc<FakePage>,
    frames: Mutex<HashMap<String, Weak<dyn Frame>>>,
}

impl FrameManager for FakeFrameManager {
    fn frame(&self, frame_id: &str) -> Option<Arc<dyn Frame>> {
        self.frames.lock().unwrap().get(frame_id)?.upgrade()
    }

    fn page(&self) -> Arc<dyn Page> {
        self.page.clone()
    }
}

/// What a fake world's XPath wait resolves to
#[derive(Debug, Clone)]
pub(crate) enum WaitBehavior {
    /// A node with this object id, created in the waiting world
    Found(String),
    Missing,
    /// Never resolves
    Hang,
}

pub(crate) struct FakeWorld {
    kind: WorldKind,
    context: OnceLock<Arc<ExecutionContext>>,
    behavior: Mutex<WaitBehavior>,
    pub(crate) xpaths: Mutex<Vec<String>>,
}

impl FakeWorld {
    fn new(kind: WorldKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            context: OnceLock::new(),
            behavior: Mutex::new(WaitBehavior::Missing),
            xpaths: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_behavior(&self, behavior: WaitBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl World for FakeWorld {
    fn kind(&self) -> WorldKind {
        self.kind
    }

    async fn execution_context(&self) -> Result<Arc<ExecutionContext>> {
        self.context.get().cloned().ok_or(HandleError::ContextDestroyed)
    }

    async fn wait_for_xpath(
        &self,
        xpath: &str,
        _root: &ElementHandle,
        _options: &WaitForSelectorOptions,
    ) -> Result<Option<Handle>> {
        self.xpaths.lock().unwrap().push(xpath.to_string());
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            WaitBehavior::Found(object_id) => {
                let context = self.execution_context().await?;
                Ok(Some(create_handle(&context, node_object(&object_id))))
            }
            WaitBehavior::Missing => Ok(None),
            WaitBehavior::Hang => std::future::pending().await,
        }
    }
}

pub(crate) struct FakeFrame {
    id: String,
    parent: Option<Arc<dyn Frame>>,
    oop: bool,
    client: Arc<FakeSession>,
    manager: Arc<FakeFrameManager>,
    pub(crate) main_world: Arc<FakeWorld>,
    pub(crate) secondary_world: Arc<FakeWorld>,
}

impl Frame for FakeFrame {
    fn id(&self) -> &str {
        &self.id
    }

    fn parent_frame(&self) -> Option<Arc<dyn Frame>> {
        self.parent.clone()
    }

    fn is_oop_frame(&self) -> bool {
        self.oop
    }

    fn client(&self) -> Arc<dyn CdpSession> {
        self.client.clone()
    }

    fn main_world(&self) -> Arc<dyn World> {
        self.main_world.clone()
    }

    fn secondary_world(&self) -> Arc<dyn World> {
        self.secondary_world.clone()
    }

    fn frame_manager(&self) -> Arc<dyn FrameManager> {
        self.manager.clone()
    }
}

/// A page with one main frame and both of its worlds
pub(crate) struct Fixture {
    pub(crate) session: Arc<FakeSession>,
    pub(crate) page: Arc<FakePage>,
    pub(crate) manager: Arc<FakeFrameManager>,
    pub(crate) frame: Arc<FakeFrame>,
    pub(crate) main_context: Arc<ExecutionContext>,
    pub(crate) secondary_context: Arc<ExecutionContext>,
    next_context_id: AtomicI64,
    children: Mutex<Vec<Arc<FakeFrame>>>,
}

impl Fixture {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &Value) -> cdp::Result<Value> + Send + Sync + 'static,
    {
        let session = FakeSession::new(responder);
        let page = FakePage::new(session.clone());
        let manager = Arc::new(FakeFrameManager {
            page: page.clone(),
            frames: Mutex::new(HashMap::new()),
        });
        let next_context_id = AtomicI64::new(1);
        let frame = build_frame("main", None, false, &session, &manager, &next_context_id);
        let main_context = world_context(&frame.main_world);
        let secondary_context = world_context(&frame.secondary_world);

        Self {
            session,
            page,
            manager,
            frame,
            main_context,
            secondary_context,
            next_context_id,
            children: Mutex::new(Vec::new()),
        }
    }

    /// Element handle in the main world of the main frame
    pub(crate) fn element(&self, object_id: &str) -> ElementHandle {
        create_handle(&self.main_context, node_object(object_id))
            .into_element()
            .unwrap()
    }

    /// Attach a child frame under `parent`; returns it with its main-world context
    pub(crate) fn child_frame(
        &self,
        parent: &Arc<FakeFrame>,
        id: &str,
        oop: bool,
    ) -> (Arc<FakeFrame>, Arc<ExecutionContext>) {
        let parent: Arc<dyn Frame> = parent.clone();
        let frame = build_frame(
            id,
            Some(parent),
            oop,
            &self.session,
            &self.manager,
            &self.next_context_id,
        );
        self.children.lock().unwrap().push(frame.clone());
        let context = world_context(&frame.main_world);
        (frame, context)
    }
}

fn build_frame(
    id: &str,
    parent: Option<Arc<dyn Frame>>,
    oop: bool,
    session: &Arc<FakeSession>,
    manager: &Arc<FakeFrameManager>,
    next_context_id: &AtomicI64,
) -> Arc<FakeFrame> {
    let frame = Arc::new(FakeFrame {
        id: id.to_string(),
        parent,
        oop,
        client: session.clone(),
        manager: manager.clone(),
        main_world: FakeWorld::new(WorldKind::Main),
        secondary_world: FakeWorld::new(WorldKind::Secondary),
    });

    let weak: Weak<dyn Frame> = Arc::downgrade(&frame) as Weak<FakeFrame>;
    for world in [&frame.main_world, &frame.secondary_world] {
        let context = ExecutionContext::new(
            session.clone(),
            next_context_id.fetch_add(1, Ordering::SeqCst),
            Some(weak.clone()),
            Some(world.kind),
        );
        let _ = world.context.set(context);
    }

    manager
        .frames
        .lock()
        .unwrap()
        .insert(id.to_string(), weak);
    frame
}

fn world_context(world: &FakeWorld) -> Arc<ExecutionContext> {
    world.context.get().cloned().unwrap()
}
