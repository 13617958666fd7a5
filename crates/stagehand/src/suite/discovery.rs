//! Where test definitions come from, and which of them run.

use std::{collections::BTreeSet, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use super::definition::{TestCaseDescriptor, TestDefinition, expand};

/// A listing of test definitions.
pub trait TestSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &str;
    /// Every definition this source knows about, in a stable order.
    fn definitions(&self) -> Vec<Arc<TestDefinition>>;
}

/// In-memory source filled by registration.
pub struct Registry {
    /// Source name.
    name: String,
    /// Registered definitions in registration order.
    defs: Mutex<Vec<Arc<TestDefinition>>>,
}

impl Registry {
    /// Empty registry.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            defs: Mutex::new(Vec::new()),
        }
    }

    /// Register a definition and return the shared handle.
    pub fn register(&self, def: TestDefinition) -> Arc<TestDefinition> {
        let def = Arc::new(def);
        self.add(def.clone());
        def
    }

    /// Register an already shared definition.
    pub fn add(&self, def: Arc<TestDefinition>) {
        self.defs.lock().push(def);
    }
}

impl TestSource for Registry {
    fn name(&self) -> &str {
        &self.name
    }

    fn definitions(&self) -> Vec<Arc<TestDefinition>> {
        self.defs.lock().clone()
    }
}

/// Merges the loaded-resource listing with, in authoring environments, the
/// asset-index scan.
#[derive(Clone, Default)]
pub struct Discovery {
    /// Always consulted.
    resources: Vec<Arc<dyn TestSource>>,
    /// Consulted only when `authoring` is set.
    asset_index: Vec<Arc<dyn TestSource>>,
    /// Whether this is an authoring-time environment.
    authoring: bool,
}

impl Discovery {
    /// Empty discovery.
    pub fn new(authoring: bool) -> Self {
        Self {
            authoring,
            ..Self::default()
        }
    }

    /// Add a loaded-resource source.
    #[must_use]
    pub fn with_resources(mut self, source: Arc<dyn TestSource>) -> Self {
        self.resources.push(source);
        self
    }

    /// Add an asset-index source.
    #[must_use]
    pub fn with_asset_index(mut self, source: Arc<dyn TestSource>) -> Self {
        self.asset_index.push(source);
        self
    }

    /// Definitions from every active source, first occurrence wins.
    pub fn discover(&self) -> Vec<Arc<TestDefinition>> {
        let index: &[Arc<dyn TestSource>] = if self.authoring { &self.asset_index } else { &[] };
        let mut out: Vec<Arc<TestDefinition>> = Vec::new();
        for source in self.resources.iter().chain(index) {
            let defs = source.definitions();
            debug!(source = source.name(), count = defs.len(), "discovery_source");
            for def in defs {
                if !out.iter().any(|d| Arc::ptr_eq(d, &def)) {
                    out.push(def);
                }
            }
        }
        out
    }
}

/// Lower-cased tag set restricting a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    /// Accepted tags.
    tags: BTreeSet<String>,
}

impl TagFilter {
    /// Parse a comma-separated list. Blank entries are dropped; an empty
    /// result means no filter.
    pub fn parse(csv: &str) -> Option<Self> {
        let tags: BTreeSet<String> = csv
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        (!tags.is_empty()).then_some(Self { tags })
    }

    /// Accepted tags.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Whether any of `def`'s tags is accepted.
    pub fn matches(&self, def: &TestDefinition) -> bool {
        def.tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Whether `def` runs under `filter`.
pub fn included(def: &TestDefinition, filter: Option<&TagFilter>) -> bool {
    filter.is_none_or(|f| f.matches(def))
}

/// Expand the included definitions into cases, keeping discovery order.
pub fn expand_cases(defs: &[Arc<TestDefinition>], filter: Option<&TagFilter>) -> Vec<TestCaseDescriptor> {
    defs.iter()
        .filter(|d| included(d, filter))
        .flat_map(expand)
        .collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{error::Outcome, suite::PlayTest, tester::Tester};

    #[derive(Default)]
    struct Nop;

    #[async_trait]
    impl PlayTest for Nop {
        async fn run(&mut self, _t: &Tester) -> Outcome<()> {
            Ok(())
        }
    }

    #[test]
    fn asset_index_only_in_authoring() {
        let resources = Arc::new(Registry::new("resources"));
        let shared = resources.register(TestDefinition::of::<Nop>("a"));
        let index = Arc::new(Registry::new("index"));
        index.add(shared);
        index.register(TestDefinition::of::<Nop>("b"));

        let player = Discovery::new(false)
            .with_resources(resources.clone())
            .with_asset_index(index.clone());
        assert_eq!(player.discover().len(), 1);

        let editor = Discovery::new(true)
            .with_resources(resources)
            .with_asset_index(index);
        let names: Vec<String> = editor.discover().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn tag_filter_includes_intersections_only() {
        let smoke = TestDefinition::of::<Nop>("s").with_tags(&["smoke"]);
        let untagged = TestDefinition::of::<Nop>("u");
        let f = TagFilter::parse("smoke").unwrap();
        assert!(included(&smoke, Some(&f)));
        assert!(!included(&untagged, Some(&f)));
        let r = TagFilter::parse("Regression, ").unwrap();
        assert!(!included(&smoke, Some(&r)));
        assert!(included(&smoke, None));
        assert!(included(&untagged, None));
        assert!(TagFilter::parse(" , ").is_none());
    }
}
