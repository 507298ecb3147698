//! Wire representation of JavaScript values held by the remote peer
//!
//! Mirrors the `Runtime.RemoteObject` shape. A value without an object id is
//! a primitive and has no remote lifetime.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{DomError, Result};

/// Opaque identifier the peer uses for a live object
pub type RemoteObjectId = String;

/// Backend DOM node identifier, stable across execution contexts
pub type BackendNodeId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteObjectType {
    Object,
    Function,
    Undefined,
    String,
    Number,
    Boolean,
    Symbol,
    Bigint,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteObjectSubtype {
    Node,
    Array,
    Null,
    Regexp,
    Date,
    Map,
    Set,
    Weakmap,
    Weakset,
    Iterator,
    Generator,
    Error,
    Proxy,
    Promise,
    Typedarray,
    Arraybuffer,
    Dataview,
    #[serde(other)]
    Other,
}

impl RemoteObjectSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Array => "array",
            Self::Null => "null",
            Self::Regexp => "regexp",
            Self::Date => "date",
            Self::Map => "map",
            Self::Set => "set",
            Self::Weakmap => "weakmap",
            Self::Weakset => "weakset",
            Self::Iterator => "iterator",
            Self::Generator => "generator",
            Self::Error => "error",
            Self::Proxy => "proxy",
            Self::Promise => "promise",
            Self::Typedarray => "typedarray",
            Self::Arraybuffer => "arraybuffer",
            Self::Dataview => "dataview",
            Self::Other => "other",
        }
    }
}

impl RemoteObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Function => "function",
            Self::Undefined => "undefined",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Symbol => "symbol",
            Self::Bigint => "bigint",
            Self::Other => "other",
        }
    }
}

/// `Runtime.RemoteObject`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub kind: RemoteObjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<RemoteObjectSubtype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<RemoteObjectId>,
}

impl RemoteObject {
    /// Build a primitive carrying a plain JSON value
    pub fn primitive(value: Value) -> Self {
        let kind = match &value {
            Value::Null => RemoteObjectType::Object,
            Value::Bool(_) => RemoteObjectType::Boolean,
            Value::Number(_) => RemoteObjectType::Number,
            Value::String(_) => RemoteObjectType::String,
            Value::Array(_) | Value::Object(_) => RemoteObjectType::Object,
        };
        let subtype = value.is_null().then_some(RemoteObjectSubtype::Null);
        Self {
            kind,
            subtype,
            class_name: None,
            value: Some(value),
            unserializable_value: None,
            description: None,
            object_id: None,
        }
    }

    /// True when the peer holds a live object behind this value
    pub fn has_remote_lifetime(&self) -> bool {
        self.object_id.is_some()
    }

    pub fn is_node(&self) -> bool {
        self.subtype == Some(RemoteObjectSubtype::Node)
    }
}

impl fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.object_id.is_some() {
            let kind = self
                .subtype
                .as_ref()
                .map(RemoteObjectSubtype::as_str)
                .unwrap_or_else(|| self.kind.as_str());
            return write!(f, "JSHandle@{}", kind);
        }
        match value_from_remote_object(self) {
            Ok(Value::String(s)) => write!(f, "JSHandle:{}", s),
            Ok(v) => write!(f, "JSHandle:{}", v),
            Err(_) => match &self.unserializable_value {
                Some(raw) => write!(f, "JSHandle:{}", raw),
                None => write!(f, "JSHandle:{}", self.kind.as_str()),
            },
        }
    }
}

/// Decode a primitive remote value in place
///
/// `-0` decodes to `-0.0`. `NaN`, the infinities and big integers that do
/// not fit a 64-bit integer have no JSON form and are rejected.
pub fn value_from_remote_object(object: &RemoteObject) -> Result<Value> {
    if object.object_id.is_some() {
        return Err(DomError::NotSerializable(
            "cannot decode an object reference in place".to_string(),
        ));
    }

    if let Some(raw) = &object.unserializable_value {
        if object.kind == RemoteObjectType::Bigint {
            let digits = raw.strip_suffix('n').unwrap_or(raw);
            if let Ok(v) = digits.parse::<i64>() {
                return Ok(Value::from(v));
            }
            if let Ok(v) = digits.parse::<u64>() {
                return Ok(Value::from(v));
            }
            return Err(DomError::NotSerializable(format!("bigint {} overflows", raw)));
        }
        return match raw.as_str() {
            "-0" => Ok(Value::from(-0.0_f64)),
            other => Err(DomError::NotSerializable(format!(
                "unserializable value {}",
                other
            ))),
        };
    }

    match object.kind {
        RemoteObjectType::Undefined => Ok(Value::Null),
        RemoteObjectType::Symbol | RemoteObjectType::Function => Err(
            DomError::NotSerializable(format!("{} is not JSON", object.kind.as_str())),
        ),
        _ => Ok(object.value.clone().unwrap_or(Value::Null)),
    }
}

/// One entry of a `Runtime.getProperties` result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(default)]
    pub value: Option<RemoteObject>,
    #[serde(default)]
    pub enumerable: bool,
    #[serde(default)]
    pub configurable: bool,
    #[serde(default)]
    pub writable: Option<bool>,
    #[serde(default)]
    pub is_own: Option<bool>,
}

/// `DOM.describeNode` node (only the fields this crate reads)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribedNode {
    pub backend_node_id: BackendNodeId,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub node_type: u8,
    #[serde(default)]
    pub frame_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> RemoteObject {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_parse_node_reference() {
        let obj = parse(json!({
            "type": "object",
            "subtype": "node",
            "className": "HTMLDivElement",
            "description": "div#main",
            "objectId": "{\"injectedScriptId\":1,\"id\":7}"
        }));
        assert!(obj.is_node());
        assert!(obj.has_remote_lifetime());
        assert_eq!(obj.to_string(), "JSHandle@node");
        assert!(value_from_remote_object(&obj).is_err());
    }

    #[test]
    fn test_unknown_subtype_tolerated() {
        let obj = parse(json!({"type": "object", "subtype": "trustedtype", "objectId": "1"}));
        assert_eq!(obj.subtype, Some(RemoteObjectSubtype::Other));
    }

    #[test]
    fn test_decode_primitives() {
        assert_eq!(
            value_from_remote_object(&parse(json!({"type": "number", "value": 42}))).unwrap(),
            json!(42)
        );
        assert_eq!(
            value_from_remote_object(&parse(json!({"type": "undefined"}))).unwrap(),
            Value::Null
        );
        let neg_zero = value_from_remote_object(&parse(
            json!({"type": "number", "unserializableValue": "-0"}),
        ))
        .unwrap();
        assert!(neg_zero.as_f64().unwrap().is_sign_negative());
    }

    #[test]
    fn test_decode_bigint() {
        let small = parse(json!({"type": "bigint", "unserializableValue": "123n"}));
        assert_eq!(value_from_remote_object(&small).unwrap(), json!(123));

        let huge = parse(json!({"type": "bigint", "unserializableValue": "123456789012345678901234567890n"}));
        assert!(matches!(
            value_from_remote_object(&huge),
            Err(DomError::NotSerializable(_))
        ));
    }

    #[test]
    fn test_nan_not_serializable() {
        let nan = parse(json!({"type": "number", "unserializableValue": "NaN"}));
        assert!(matches!(
            value_from_remote_object(&nan),
            Err(DomError::NotSerializable(_))
        ));
    }

    #[test]
    fn test_primitive_display() {
        assert_eq!(RemoteObject::primitive(json!("hi")).to_string(), "JSHandle:hi");
        assert_eq!(RemoteObject::primitive(json!(true)).to_string(), "JSHandle:true");
    }
}
