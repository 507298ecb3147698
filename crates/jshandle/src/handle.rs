//! JS handles - local proxies for values living in the remote peer
//!
//! `Handle` is a tagged variant: plain values and DOM elements share the
//! `JsHandle` core, and `create_handle` is the one place that decides which
//! variant to build.

use serde_json::{json, Value};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cdp::protocol::{
    is_not_serializable, RUNTIME_CALL_FUNCTION_ON, RUNTIME_GET_PROPERTIES, RUNTIME_RELEASE_OBJECT,
};
use crate::cdp::CdpSession;
use crate::context::{map_protocol_error, parse_evaluation_response, EvalArg, ExecutionContext};
use crate::element::ElementHandle;
use crate::error::{HandleError, Result};
use crate::events::ContextEvent;
use crate::scripts;
use dom::{value_from_remote_object, PropertyDescriptor, RemoteObject};

/// Wrap a remote value, upgrading DOM nodes to element handles
///
/// A node becomes an [`ElementHandle`] only when its context is bound to a
/// live frame; everything else is a plain [`JsHandle`].
pub fn create_handle(context: &Arc<ExecutionContext>, remote_object: RemoteObject) -> Handle {
    let is_node = remote_object.is_node();
    let handle = JsHandle::new(context.clone(), remote_object);
    if is_node {
        if let Some(frame) = context.frame() {
            let frame_manager = frame.frame_manager();
            let page = frame_manager.page();
            return Handle::Element(ElementHandle::new(handle, &frame, &page, &frame_manager));
        }
    }
    Handle::Js(handle)
}

/// Handle to any remote JavaScript value
///
/// Clones share the disposed flag: disposing one disposes all.
#[derive(Clone)]
pub struct JsHandle {
    context: Arc<ExecutionContext>,
    remote_object: Arc<RemoteObject>,
    id: u64,
    disposed: Arc<AtomicBool>,
}

impl JsHandle {
    pub(crate) fn new(context: Arc<ExecutionContext>, remote_object: RemoteObject) -> Self {
        let (id, disposed) = context.register_handle();
        tracing::trace!(
            "[ExecutionContext {}] Created handle #{} ({})",
            context.id(),
            id,
            remote_object
        );
        Self {
            context,
            remote_object: Arc::new(remote_object),
            id,
            disposed,
        }
    }

    pub fn execution_context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    pub fn client(&self) -> Arc<dyn CdpSession> {
        self.context.client()
    }

    pub fn remote_object(&self) -> &RemoteObject {
        &self.remote_object
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(HandleError::HandleDisposed);
        }
        Ok(())
    }

    pub(crate) fn object_id(&self) -> Result<&str> {
        self.ensure_live()?;
        self.remote_object
            .object_id
            .as_deref()
            .ok_or_else(|| HandleError::Assertion("handle has no remote object id".into()))
    }

    fn with_self(&self, args: Vec<EvalArg>) -> Vec<EvalArg> {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(EvalArg::Handle(self.clone()));
        all.extend(args);
        all
    }

    /// Run `function(value, ...args)` remotely and return its JSON result
    pub async fn evaluate(&self, function: &str, args: Vec<EvalArg>) -> Result<Value> {
        self.ensure_live()?;
        self.context.evaluate(function, self.with_self(args)).await
    }

    /// Run `function(value, ...args)` remotely and wrap the result in a handle
    pub async fn evaluate_handle(&self, function: &str, args: Vec<EvalArg>) -> Result<Handle> {
        self.ensure_live()?;
        self.context.evaluate_handle(function, self.with_self(args)).await
    }

    /// Handle to one own property, read exactly once
    pub async fn get_property(&self, name: &str) -> Result<Handle> {
        let holder = self
            .evaluate_handle(scripts::GET_PROPERTY, vec![name.into()])
            .await?;
        let properties = holder.get_properties().await;
        holder.dispose().await;

        properties?.remove(name).ok_or_else(|| {
            HandleError::Assertion(format!("property {:?} missing from its holder", name))
        })
    }

    /// Own enumerable properties with a value, in protocol order
    pub async fn get_properties(&self) -> Result<PropertyMap> {
        self.ensure_live()?;
        let Some(object_id) = self.remote_object.object_id.as_deref() else {
            return Ok(PropertyMap::default());
        };

        let response = self
            .client()
            .send(
                RUNTIME_GET_PROPERTIES,
                Some(json!({ "objectId": object_id, "ownProperties": true })),
            )
            .await
            .map_err(map_protocol_error)?;

        let descriptors: Vec<PropertyDescriptor> =
            serde_json::from_value(response.get("result").cloned().unwrap_or(json!([])))?;

        let mut properties = PropertyMap::default();
        for descriptor in descriptors {
            if !descriptor.enumerable {
                continue;
            }
            let Some(value) = descriptor.value else {
                continue;
            };
            properties.push(descriptor.name, create_handle(&self.context, value));
        }
        Ok(properties)
    }

    /// JSON copy of the value
    ///
    /// Objects round-trip through the peer's serializer; primitives decode
    /// locally. Circular or non-JSON values fail with `NotSerializable`.
    pub async fn json_value(&self) -> Result<Value> {
        self.ensure_live()?;
        let Some(object_id) = self.remote_object.object_id.as_deref() else {
            return Ok(value_from_remote_object(&self.remote_object)?);
        };

        let response = self
            .client()
            .send(
                RUNTIME_CALL_FUNCTION_ON,
                Some(json!({
                    "functionDeclaration": scripts::RETURN_THIS,
                    "objectId": object_id,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await
            .map_err(|e| {
                if is_not_serializable(&e) {
                    HandleError::NotSerializable(e.to_string())
                } else {
                    map_protocol_error(e)
                }
            })?;

        let result = parse_evaluation_response(response)?;
        Ok(value_from_remote_object(&result)?)
    }

    /// Release the remote value
    ///
    /// Idempotent. Release failures are logged and swallowed; the peer
    /// collects the object on its own eventually.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.context.unregister_handle(self.id);

        let object_id = self.remote_object.object_id.clone();
        if let Some(object_id) = &object_id {
            if let Err(e) = self
                .client()
                .send(RUNTIME_RELEASE_OBJECT, Some(json!({ "objectId": object_id })))
                .await
            {
                tracing::debug!("Failed to release remote object {}: {}", object_id, e);
            }
        }

        self.context.publish(ContextEvent::HandleDisposed {
            context_id: self.context.id(),
            object_id,
        });
    }
}

impl fmt::Debug for JsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsHandle")
            .field("context", &self.context.id())
            .field("remote_object", &self.remote_object)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl fmt::Display for JsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.remote_object, f)
    }
}

/// A handle of either kind
#[derive(Debug, Clone)]
pub enum Handle {
    Js(JsHandle),
    Element(ElementHandle),
}

impl Handle {
    /// Element view of this handle, if it points at a DOM element
    pub fn as_element(&self) -> Option<&ElementHandle> {
        match self {
            Self::Js(_) => None,
            Self::Element(element) => Some(element),
        }
    }

    pub fn into_element(self) -> Option<ElementHandle> {
        match self {
            Self::Js(_) => None,
            Self::Element(element) => Some(element),
        }
    }
}

impl Deref for Handle {
    type Target = JsHandle;

    fn deref(&self) -> &JsHandle {
        match self {
            Self::Js(handle) => handle,
            Self::Element(element) => element,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

/// Property name → handle, in the order the peer reported them
#[derive(Debug, Default)]
pub struct PropertyMap {
    entries: Vec<(String, Handle)>,
}

impl PropertyMap {
    fn push(&mut self, name: String, handle: Handle) {
        self.entries.push((name, handle));
    }

    pub fn get(&self, name: &str) -> Option<&Handle> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, h)| h)
    }

    pub fn remove(&mut self, name: &str) -> Option<Handle> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Handle)> {
        self.entries.iter().map(|(n, h)| (n.as_str(), h))
    }

    pub fn into_values(self) -> impl Iterator<Item = Handle> {
        self.entries.into_iter().map(|(_, h)| h)
    }
}

impl IntoIterator for PropertyMap {
    type Item = (String, Handle);
    type IntoIter = std::vec::IntoIter<(String, Handle)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
