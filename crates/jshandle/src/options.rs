//! Option structs for element operations
//!
//! All of them deserialize from JSON with sensible defaults so callers can
//! keep them in config files.

use dom::BoundingBox;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wait timeout for polling operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for `wait_for_xpath`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaitForSelectorOptions {
    /// Wait until the node is present and visible
    pub visible: bool,
    /// Wait until the node is absent or hidden
    pub hidden: bool,
    /// Zero disables the timeout
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl Default for WaitForSelectorOptions {
    fn default() -> Self {
        Self {
            visible: false,
            hidden: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

/// Options forwarded to the page-level screenshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenshotOptions {
    pub format: ImageFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    pub omit_background: bool,
    /// Page-space clip; element screenshots fill this in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<BoundingBox>,
}

/// Page viewport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
    pub is_landscape: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            device_scale_factor: 1.0,
            is_mobile: false,
            has_touch: false,
            is_landscape: false,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
