//! Endpoint registry
//!
//! Holds the statically loaded list of probe targets. The registry is built
//! once and shared read-only across all concurrent probes of every cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::TargetEntry;

/// Name of the tag derived from the target URL
pub const ENDPOINT_TAG: &str = "endpoint";

/// Position of a target inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(pub usize);

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single endpoint to probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: TargetId,
    pub url: String,

    /// Display name for logging
    pub name: Option<String>,

    /// Descriptive tags, without the implicit `endpoint` tag
    pub tags: BTreeMap<String, String>,
}

impl Target {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

/// Immutable, cheaply cloneable list of targets
#[derive(Debug, Clone, Default)]
pub struct Registry {
    targets: Arc<[Arc<Target>]>,
}

impl Registry {
    pub fn new(entries: impl IntoIterator<Item = TargetEntry>) -> Self {
        let targets = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let (url, name, mut tags) = entry.into_parts();
                if tags.remove(ENDPOINT_TAG).is_some() {
                    debug!("{url}: ignoring explicit '{ENDPOINT_TAG}' tag");
                }

                Arc::new(Target {
                    id: TargetId(index),
                    url,
                    name,
                    tags,
                })
            })
            .collect();

        Self { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, id: TargetId) -> Option<&Arc<Target>> {
        self.targets.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Target>> {
        self.targets.iter()
    }
}
