//! Decision and list-item types shared by the stream, state and gateway layers.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Whether a decision asks to start or stop blocking a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    /// Block the value.
    New,
    /// Unblock the value.
    Deleted,
}

/// A single instruction from the threat feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decision {
    /// IP address or CIDR, in canonical form.
    pub value: String,
    pub kind: DecisionKind,
}

impl Decision {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: DecisionKind::New,
        }
    }

    pub fn deleted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: DecisionKind::Deleted,
        }
    }
}

/// One delivery from the decision stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamBatch {
    /// Values to block.
    pub new: Vec<String>,
    /// Values to unblock.
    pub deleted: Vec<String>,
}

impl StreamBatch {
    /// Batch carrying only new decisions.
    pub fn with_new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            new: values.into_iter().map(Into::into).collect(),
            deleted: Vec::new(),
        }
    }

    /// Batch carrying only deleted decisions.
    pub fn with_deleted<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            new: Vec::new(),
            deleted: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.new.len() + self.deleted.len()
    }

    /// Decisions in application order: deletions first, then additions.
    pub fn decisions(&self) -> impl Iterator<Item = Decision> + '_ {
        self.deleted
            .iter()
            .map(|v| Decision::deleted(v.as_str()))
            .chain(self.new.iter().map(|v| Decision::new(v.as_str())))
    }
}

/// Item to create on the remote list. Two requests are the same item when
/// both IP and comment match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemCreateRequest {
    pub ip: String,
    pub comment: String,
}

/// Item to delete from the remote list, by remote ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemDeleteRequest {
    pub id: String,
}

/// An item as stored on the remote list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListItem {
    /// Remote ID.
    pub id: String,
    pub ip: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Normalize an IP address or CIDR to the text form stored remotely.
///
/// Host networks (`/32`, `/128`) collapse to the bare address and host bits
/// are cleared from wider networks. Returns `None` for anything else.
pub fn canonical_value(value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    let net = value.parse::<IpNet>().ok()?;
    if net.prefix_len() == net.max_prefix_len() {
        Some(net.addr().to_string())
    } else {
        Some(net.trunc().to_string())
    }
}
