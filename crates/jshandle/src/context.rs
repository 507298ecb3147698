//! Execution Context - one JavaScript evaluation scope on the peer
//!
//! Owns the lifetime registry of every handle created in it. When the peer
//! tears the context down (navigation, frame detach) the owner calls
//! [`ExecutionContext::destroy`], which flips all registered handles to
//! disposed without sending any release: the peer already dropped them.

use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

use crate::cdp::protocol::{
    DOM_RESOLVE_NODE, RUNTIME_CALL_FUNCTION_ON, RUNTIME_EVALUATE,
};
use crate::cdp::{is_context_destroyed, CdpError, CdpSession};
use crate::element::ElementHandle;
use crate::error::{HandleError, Result};
use crate::events::{ContextEvent, EventBus};
use crate::frame::{Frame, WorldKind};
use crate::handle::{create_handle, Handle, JsHandle};
use dom::{value_from_remote_object, BackendNodeId, RemoteObject};

/// Execution context id assigned by the peer
pub type ExecutionContextId = i64;

/// Registry size at which entries of dropped handles are swept
const PRUNE_THRESHOLD: usize = 64;

/// Argument passed to a remote function
#[derive(Debug, Clone)]
pub enum EvalArg {
    /// Plain JSON value, passed by value
    Value(Value),
    /// Live handle, passed by reference; must belong to the evaluating context
    Handle(JsHandle),
}

impl From<Value> for EvalArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for EvalArg {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<&JsHandle> for EvalArg {
    fn from(handle: &JsHandle) -> Self {
        Self::Handle(handle.clone())
    }
}

impl From<&ElementHandle> for EvalArg {
    fn from(handle: &ElementHandle) -> Self {
        Self::Handle(JsHandle::clone(handle))
    }
}

impl From<&Handle> for EvalArg {
    fn from(handle: &Handle) -> Self {
        Self::Handle(JsHandle::clone(handle))
    }
}

pub struct ExecutionContext {
    id: ExecutionContextId,
    client: Arc<dyn CdpSession>,
    frame: Option<Weak<dyn Frame>>,
    world: Option<WorldKind>,
    destroyed: AtomicBool,

    /// Disposed flags of handles created here, keyed by local handle id
    handles: DashMap<u64, Weak<AtomicBool>>,
    next_handle_id: AtomicU64,
    prune_at: AtomicUsize,

    events: EventBus,
}

impl ExecutionContext {
    pub fn new(
        client: Arc<dyn CdpSession>,
        id: ExecutionContextId,
        frame: Option<Weak<dyn Frame>>,
        world: Option<WorldKind>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            client,
            frame,
            world,
            destroyed: AtomicBool::new(false),
            handles: DashMap::new(),
            next_handle_id: AtomicU64::new(1),
            prune_at: AtomicUsize::new(PRUNE_THRESHOLD),
            events: EventBus::new(),
        })
    }

    pub fn id(&self) -> ExecutionContextId {
        self.id
    }

    pub fn client(&self) -> Arc<dyn CdpSession> {
        self.client.clone()
    }

    /// Frame this context evaluates in, if it is still alive
    pub fn frame(&self) -> Option<Arc<dyn Frame>> {
        self.frame.as_ref()?.upgrade()
    }

    pub fn world(&self) -> Option<WorldKind> {
        self.world
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Subscribe to lifecycle events of this context
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    /// Number of handles created here that are not disposed yet
    pub fn live_handle_count(&self) -> usize {
        self.handles
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .upgrade()
                    .map(|flag| !flag.load(Ordering::SeqCst))
                    .unwrap_or(false)
            })
            .count()
    }

    /// Tear down the context and invalidate every handle it owns
    ///
    /// No `Runtime.releaseObject` is sent. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut invalidated = 0;
        for entry in self.handles.iter() {
            if let Some(flag) = entry.value().upgrade() {
                if !flag.swap(true, Ordering::SeqCst) {
                    invalidated += 1;
                }
            }
        }
        self.handles.clear();

        tracing::debug!(
            "[ExecutionContext {}] Destroyed, invalidated {} handles",
            self.id,
            invalidated
        );
        self.events.publish(ContextEvent::Destroyed {
            context_id: self.id,
            handles: invalidated,
        });
    }

    /// Call `function` with `args` and return its JSON result
    ///
    /// Promises are awaited on the peer.
    pub async fn evaluate(&self, function: &str, args: Vec<EvalArg>) -> Result<Value> {
        let result = self.call_function(function, &args, true).await?;
        Ok(value_from_remote_object(&result)?)
    }

    /// Call `function` with `args` and wrap its result in a handle
    pub async fn evaluate_handle(
        self: &Arc<Self>,
        function: &str,
        args: Vec<EvalArg>,
    ) -> Result<Handle> {
        let result = self.call_function(function, &args, false).await?;
        Ok(create_handle(self, result))
    }

    /// Evaluate a bare expression and return its JSON result
    pub async fn evaluate_expression(&self, expression: &str) -> Result<Value> {
        let result = self.run_expression(expression, true).await?;
        Ok(value_from_remote_object(&result)?)
    }

    /// Evaluate a bare expression and wrap its result in a handle
    pub async fn evaluate_expression_handle(self: &Arc<Self>, expression: &str) -> Result<Handle> {
        let result = self.run_expression(expression, false).await?;
        Ok(create_handle(self, result))
    }

    /// Resolve a backend node into this context
    pub async fn adopt_backend_node(self: &Arc<Self>, backend_node_id: BackendNodeId) -> Result<Handle> {
        self.ensure_alive()?;
        let response = self
            .client
            .send(
                DOM_RESOLVE_NODE,
                Some(json!({
                    "backendNodeId": backend_node_id,
                    "executionContextId": self.id,
                })),
            )
            .await
            .map_err(map_protocol_error)?;

        self.ensure_alive()?;
        let object = response
            .get("object")
            .cloned()
            .ok_or_else(|| HandleError::Assertion("DOM.resolveNode returned no object".into()))?;
        Ok(create_handle(self, serde_json::from_value(object)?))
    }

    /// Transfer an element from another context (e.g. main ↔ secondary world)
    pub async fn adopt_element_handle(self: &Arc<Self>, handle: &ElementHandle) -> Result<ElementHandle> {
        if Arc::ptr_eq(handle.execution_context(), self) {
            return Err(HandleError::Assertion(
                "Cannot adopt handle that already belongs to this execution context".into(),
            ));
        }
        if self.world.is_none() {
            return Err(HandleError::Assertion(
                "Cannot adopt handle without a world".into(),
            ));
        }

        let node = handle.describe_node().await?;
        match self.adopt_backend_node(node.backend_node_id).await? {
            Handle::Element(element) => Ok(element),
            other => {
                other.dispose().await;
                Err(HandleError::Assertion(
                    "Adopted node did not resolve to an element".into(),
                ))
            }
        }
    }

    pub(crate) fn register_handle(&self) -> (u64, Arc<AtomicBool>) {
        let id = self.next_handle_id.fetch_add(1, Ordering::SeqCst);
        let flag = Arc::new(AtomicBool::new(self.is_destroyed()));
        if !self.is_destroyed() {
            self.handles.insert(id, Arc::downgrade(&flag));
            self.prune_dropped();
        }
        (id, flag)
    }

    /// Forget handles the caller dropped without disposing
    ///
    /// Sweeps once the registry reaches twice its last swept size.
    fn prune_dropped(&self) {
        if self.handles.len() < self.prune_at.load(Ordering::Relaxed) {
            return;
        }
        self.handles.retain(|_, flag| flag.strong_count() > 0);
        let remaining = self.handles.len();
        self.prune_at
            .store((remaining * 2).max(PRUNE_THRESHOLD), Ordering::Relaxed);
        tracing::trace!(
            "[ExecutionContext {}] Pruned handle registry to {} entries",
            self.id,
            remaining
        );
    }

    #[cfg(test)]
    pub(crate) fn registry_len(&self) -> usize {
        self.handles.len()
    }

    pub(crate) fn unregister_handle(&self, id: u64) {
        self.handles.remove(&id);
    }

    pub(crate) fn publish(&self, event: ContextEvent) {
        self.events.publish(event);
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(HandleError::ContextDestroyed);
        }
        Ok(())
    }

    async fn call_function(
        &self,
        function: &str,
        args: &[EvalArg],
        return_by_value: bool,
    ) -> Result<RemoteObject> {
        self.ensure_alive()?;
        let arguments = args
            .iter()
            .map(|arg| self.convert_argument(arg))
            .collect::<Result<Vec<_>>>()?;

        let response = self
            .client
            .send(
                RUNTIME_CALL_FUNCTION_ON,
                Some(json!({
                    "functionDeclaration": function,
                    "executionContextId": self.id,
                    "arguments": arguments,
                    "returnByValue": return_by_value,
                    "awaitPromise": true,
                    "userGesture": true,
                })),
            )
            .await
            .map_err(map_protocol_error)?;

        // Torn down while the call was in flight
        self.ensure_alive()?;
        parse_evaluation_response(response)
    }

    async fn run_expression(&self, expression: &str, return_by_value: bool) -> Result<RemoteObject> {
        self.ensure_alive()?;
        let response = self
            .client
            .send(
                RUNTIME_EVALUATE,
                Some(json!({
                    "expression": expression,
                    "contextId": self.id,
                    "returnByValue": return_by_value,
                    "awaitPromise": true,
                    "userGesture": true,
                })),
            )
            .await
            .map_err(map_protocol_error)?;

        self.ensure_alive()?;
        parse_evaluation_response(response)
    }

    fn convert_argument(&self, arg: &EvalArg) -> Result<Value> {
        let handle = match arg {
            EvalArg::Value(value) => return Ok(json!({ "value": value })),
            EvalArg::Handle(handle) => handle,
        };

        if !std::ptr::eq(Arc::as_ptr(handle.execution_context()), self) {
            return Err(HandleError::Assertion(
                "JSHandles can be evaluated only in the context they were created".into(),
            ));
        }
        if handle.is_disposed() {
            return Err(HandleError::HandleDisposed);
        }

        let remote = handle.remote_object();
        Ok(match (&remote.object_id, &remote.unserializable_value) {
            (Some(object_id), _) => json!({ "objectId": object_id }),
            (None, Some(raw)) => json!({ "unserializableValue": raw }),
            (None, None) => match &remote.value {
                Some(value) => json!({ "value": value }),
                // `undefined` travels as an empty argument
                None => json!({}),
            },
        })
    }
}

/// Fold "context is gone" protocol errors into the taxonomy
pub(crate) fn map_protocol_error(err: CdpError) -> HandleError {
    if is_context_destroyed(&err) {
        HandleError::ContextDestroyed
    } else {
        HandleError::Cdp(err)
    }
}

/// Extract the result object of `Runtime.evaluate` / `Runtime.callFunctionOn`
pub(crate) fn parse_evaluation_response(response: Value) -> Result<RemoteObject> {
    if let Some(details) = response.get("exceptionDetails") {
        return Err(HandleError::Evaluation(exception_message(details)));
    }
    let result = response
        .get("result")
        .cloned()
        .ok_or_else(|| HandleError::Assertion("evaluation returned no result".into()))?;
    Ok(serde_json::from_value(result)?)
}

fn exception_message(details: &Value) -> String {
    details["exception"]["description"]
        .as_str()
        .or_else(|| details["exception"]["value"].as_str())
        .or_else(|| details["text"].as_str())
        .unwrap_or("unknown exception")
        .to_string()
}
