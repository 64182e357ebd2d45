//! # Software Channel Hierarchy
//!
//! Channels form a two-level tree: base channels at the root, child
//! channels directly beneath exactly one base. The engine only reads this
//! hierarchy, through the [`ChannelHierarchy`] trait.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CatalogError;

/// A software channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Unique label.
    pub label: String,
    /// Parent base channel label. `None` for base channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Channel {
    /// Whether this is a base channel.
    pub fn is_base(&self) -> bool {
        self.parent.is_none()
    }
}

/// Failure resolving a channel label in a specific role.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelLookupError {
    /// No channel with this label is visible.
    #[error("no such channel \"{0}\"")]
    NotFound(String),

    /// A base channel was required.
    #[error("channel \"{0}\" is not a base channel")]
    NotABase(String),

    /// A child channel was required.
    #[error("channel \"{0}\" is a base channel")]
    IsBase(String),

    /// The child hangs under a different base.
    #[error("channel \"{label}\" belongs to base \"{actual}\", not \"{expected}\"")]
    WrongParent {
        /// The child channel.
        label: String,
        /// Its real parent.
        actual: String,
        /// The base it was expected under.
        expected: String,
    },
}

impl ChannelLookupError {
    /// The label the error is about.
    pub fn label(&self) -> &str {
        match self {
            Self::NotFound(l) | Self::NotABase(l) | Self::IsBase(l) => l,
            Self::WrongParent { label, .. } => label,
        }
    }
}

/// Read access to the channel tree.
pub trait ChannelHierarchy: Send + Sync {
    /// Resolve `label` as a base channel.
    fn resolve_base(&self, label: &str) -> Result<Channel, ChannelLookupError>;

    /// Resolve `label` as a direct child of `expected_base`.
    fn resolve_child(&self, label: &str, expected_base: &str)
        -> Result<Channel, ChannelLookupError>;

    /// Whether `child` is a direct child of `base`.
    fn is_descendant_of(&self, child: &str, base: &str) -> bool;

    /// The children of `base`, ordered by label.
    fn children_of(&self, base: &str) -> Vec<Channel>;
}

/// In-memory channel tree.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<String, Channel>,
}

impl ChannelRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a base channel.
    pub fn add_base(&mut self, label: impl Into<String>) -> Result<(), CatalogError> {
        let label = label.into();
        self.insert(Channel {
            label,
            parent: None,
        })
    }

    /// Add a child channel under an already registered base.
    pub fn add_child(
        &mut self,
        label: impl Into<String>,
        parent: impl Into<String>,
    ) -> Result<(), CatalogError> {
        let label = label.into();
        let parent = parent.into();
        if !self.channels.get(&parent).is_some_and(Channel::is_base) {
            return Err(CatalogError::InvalidParent {
                channel: label,
                parent,
            });
        }
        self.insert(Channel {
            label,
            parent: Some(parent),
        })
    }

    fn insert(&mut self, channel: Channel) -> Result<(), CatalogError> {
        if channel.label.is_empty() {
            return Err(CatalogError::EmptyLabel("channel"));
        }
        if self.channels.contains_key(&channel.label) {
            return Err(CatalogError::Duplicate {
                kind: "channel",
                id: channel.label,
            });
        }
        self.channels.insert(channel.label.clone(), channel);
        Ok(())
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl ChannelHierarchy for ChannelRegistry {
    fn resolve_base(&self, label: &str) -> Result<Channel, ChannelLookupError> {
        let channel = self
            .channels
            .get(label)
            .ok_or_else(|| ChannelLookupError::NotFound(label.to_string()))?;
        if !channel.is_base() {
            return Err(ChannelLookupError::NotABase(label.to_string()));
        }
        Ok(channel.clone())
    }

    fn resolve_child(
        &self,
        label: &str,
        expected_base: &str,
    ) -> Result<Channel, ChannelLookupError> {
        let channel = self
            .channels
            .get(label)
            .ok_or_else(|| ChannelLookupError::NotFound(label.to_string()))?;
        match &channel.parent {
            None => Err(ChannelLookupError::IsBase(label.to_string())),
            Some(parent) if parent != expected_base => Err(ChannelLookupError::WrongParent {
                label: label.to_string(),
                actual: parent.clone(),
                expected: expected_base.to_string(),
            }),
            Some(_) => Ok(channel.clone()),
        }
    }

    fn is_descendant_of(&self, child: &str, base: &str) -> bool {
        self.channels
            .get(child)
            .and_then(|c| c.parent.as_deref())
            .is_some_and(|p| p == base)
    }

    fn children_of(&self, base: &str) -> Vec<Channel> {
        self.channels
            .values()
            .filter(|c| c.parent.as_deref() == Some(base))
            .cloned()
            .collect()
    }
}
