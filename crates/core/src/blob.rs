// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object store addressing and concurrency-control tokens

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a single blob: container plus blob name
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobPath {
    pub container: String,
    pub name: String,
}

impl BlobPath {
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.name)
    }
}

/// Opaque version token; changes on every successful write
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ETag(pub String);

impl ETag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an exclusive, time-bounded lease on a blob
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseId(pub String);

impl LeaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Precondition attached to a blob upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteCondition {
    /// Overwrite whatever is there
    None,
    /// Only if the stored version still matches
    IfMatch(ETag),
    /// Only if the blob does not exist yet
    IfNoneMatch,
    /// Only while holding this lease
    Lease(LeaseId),
}

impl fmt::Display for WriteCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteCondition::None => f.write_str("unconditional"),
            WriteCondition::IfMatch(etag) => write!(f, "if-match {}", etag),
            WriteCondition::IfNoneMatch => f.write_str("if-none-match"),
            WriteCondition::Lease(lease) => write!(f, "lease {}", lease),
        }
    }
}
