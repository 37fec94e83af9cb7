//! Media (content) types
//!
//! Parameters such as `charset` are kept for display and exact cache keys,
//! but [`MediaType::matches`] compares only `type/subtype`.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::MarshallingError;

/// A `type/subtype; key=value` content type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaType {
    kind: Cow<'static, str>,
    subtype: Cow<'static, str>,
    params: BTreeMap<String, String>,
}

/// MessagePack: the in-process form every bean payload starts from
pub const APPLICATION_MSGPACK: MediaType = MediaType::from_static("application", "x-msgpack");
/// JSON
pub const APPLICATION_JSON: MediaType = MediaType::from_static("application", "json");
/// Raw bytes with no declared structure
pub const APPLICATION_OCTET_STREAM: MediaType =
    MediaType::from_static("application", "octet-stream");
/// Base64 text
pub const APPLICATION_BASE64: MediaType = MediaType::from_static("application", "base64");
/// Plain text
pub const TEXT_PLAIN: MediaType = MediaType::from_static("text", "plain");

impl MediaType {
    /// Const constructor for well-known types (no parameters)
    pub const fn from_static(kind: &'static str, subtype: &'static str) -> Self {
        MediaType {
            kind: Cow::Borrowed(kind),
            subtype: Cow::Borrowed(subtype),
            params: BTreeMap::new(),
        }
    }

    /// Build a media type from owned parts (lower-cased)
    pub fn new(kind: &str, subtype: &str) -> Self {
        MediaType {
            kind: Cow::Owned(kind.trim().to_ascii_lowercase()),
            subtype: Cow::Owned(subtype.trim().to_ascii_lowercase()),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params
            .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        self
    }

    /// Top-level type, e.g. `application`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Subtype, e.g. `json`
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Parameter value
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// `type/subtype` without parameters
    pub fn type_name(&self) -> String {
        format!("{}/{}", self.kind, self.subtype)
    }

    /// Whether both denote the same `type/subtype`, ignoring parameters
    pub fn matches(&self, other: &MediaType) -> bool {
        self.kind == other.kind && self.subtype == other.subtype
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)?;
        for (key, value) in &self.params {
            write!(f, "; {}={}", key, value)?;
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = MarshallingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let (kind, subtype) = essence
            .split_once('/')
            .ok_or_else(|| MarshallingError::InvalidMediaType(s.to_string()))?;
        if kind.trim().is_empty() || subtype.trim().is_empty() || subtype.contains('/') {
            return Err(MarshallingError::InvalidMediaType(s.to_string()));
        }
        let mut media = MediaType::new(kind, subtype);
        for param in parts {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (key, value) = param
                .split_once('=')
                .ok_or_else(|| MarshallingError::InvalidMediaType(s.to_string()))?;
            media = media.with_param(key, value.trim_matches('"'));
        }
        Ok(media)
    }
}
