//! Protocol method names and error classification
//!
//! Only the commands the handle core actually issues live here.

use super::session::CdpError;

pub const RUNTIME_CALL_FUNCTION_ON: &str = "Runtime.callFunctionOn";
pub const RUNTIME_EVALUATE: &str = "Runtime.evaluate";
pub const RUNTIME_GET_PROPERTIES: &str = "Runtime.getProperties";
pub const RUNTIME_RELEASE_OBJECT: &str = "Runtime.releaseObject";

pub const DOM_DESCRIBE_NODE: &str = "DOM.describeNode";
pub const DOM_RESOLVE_NODE: &str = "DOM.resolveNode";
pub const DOM_GET_CONTENT_QUADS: &str = "DOM.getContentQuads";
pub const DOM_GET_BOX_MODEL: &str = "DOM.getBoxModel";
pub const DOM_GET_FRAME_OWNER: &str = "DOM.getFrameOwner";
pub const DOM_SET_FILE_INPUT_FILES: &str = "DOM.setFileInputFiles";

pub const PAGE_GET_LAYOUT_METRICS: &str = "Page.getLayoutMetrics";

const CONTEXT_GONE_MESSAGES: &[&str] = &[
    "Cannot find context with specified id",
    "Execution context was destroyed",
    "Inspected target navigated or closed",
];

const NOT_SERIALIZABLE_MESSAGES: &[&str] = &[
    "Object reference chain is too long",
    "Object couldn't be returned by value",
];

/// Peer reports that the execution context no longer exists
pub fn is_context_destroyed(err: &CdpError) -> bool {
    err.message()
        .map(|m| CONTEXT_GONE_MESSAGES.iter().any(|p| m.contains(p)))
        .unwrap_or(false)
}

/// Peer refused to serialize the value (circular or non-JSON)
pub fn is_not_serializable(err: &CdpError) -> bool {
    err.message()
        .map(|m| NOT_SERIALIZABLE_MESSAGES.iter().any(|p| m.contains(p)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_context_destroyed() {
        assert!(is_context_destroyed(&CdpError::protocol(
            "Cannot find context with specified id"
        )));
        assert!(is_context_destroyed(&CdpError::protocol(
            "Execution context was destroyed."
        )));
        assert!(!is_context_destroyed(&CdpError::protocol("Could not find node")));
        assert!(!is_context_destroyed(&CdpError::Closed));
    }

    #[test]
    fn test_classify_not_serializable() {
        assert!(is_not_serializable(&CdpError::protocol(
            "Object reference chain is too long"
        )));
        assert!(!is_not_serializable(&CdpError::Timeout));
    }
}
