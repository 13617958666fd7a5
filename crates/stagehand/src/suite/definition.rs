//! Test definitions, parameter injection and case expansion.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::Outcome, tester::Tester};

/// A playable test.
///
/// One instance is created per case. Setup and teardown run once each; the
/// body may run several times when retries are configured.
#[async_trait]
pub trait PlayTest: Send {
    /// Prepare the case. Runs once.
    async fn set_up(&mut self, _t: &Tester) -> Outcome<()> {
        Ok(())
    }

    /// The test body.
    async fn run(&mut self, t: &Tester) -> Outcome<()>;

    /// Clean up. Runs exactly once, whatever the outcome.
    async fn tear_down(&mut self, _t: &Tester) -> Outcome<()> {
        Ok(())
    }

    /// Parameter slots this test exposes, in declaration order.
    fn params(&self) -> Vec<ParamSlot> {
        Vec::new()
    }

    /// Store `value` in the slot called `name`. Returns whether it was stored.
    fn set_param(&mut self, _name: &str, _value: &ParamValue) -> bool {
        false
    }
}

/// A value bound into a parameterized case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String.
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Type of a parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Takes booleans.
    Bool,
    /// Takes integers.
    Int,
    /// Takes floats and integers.
    Float,
    /// Takes strings.
    Text,
}

impl ParamKind {
    /// Whether a slot of this kind can hold `value`.
    pub fn accepts(self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (Self::Bool, ParamValue::Bool(_))
                | (Self::Int, ParamValue::Int(_))
                | (Self::Float, ParamValue::Float(_) | ParamValue::Int(_))
                | (Self::Text, ParamValue::Text(_))
        )
    }
}

/// A named field a parameter can be injected into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSlot {
    /// Field name.
    pub name: String,
    /// Accepted values.
    pub kind: ParamKind,
    /// Read-only slots are never injected.
    pub writable: bool,
}

impl ParamSlot {
    /// A writable slot.
    pub fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            writable: true,
        }
    }

    /// A read-only slot.
    pub fn read_only(name: &str, kind: ParamKind) -> Self {
        Self {
            writable: false,
            ..Self::new(name, kind)
        }
    }
}

/// One data attribute: values for an optional target slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Slot named by the attribute, if any.
    pub slot: Option<String>,
    /// One case per value.
    pub values: Vec<ParamValue>,
}

/// Constructor of fresh test instances.
pub type Factory = Box<dyn Fn() -> Box<dyn PlayTest> + Send + Sync>;

/// A discoverable test.
pub struct TestDefinition {
    /// Unique name.
    pub name: String,
    /// Lower-cased tags.
    pub tags: Vec<String>,
    /// Data attributes; empty for an unparameterized test.
    pub data: Vec<DataSet>,
    /// Instance constructor.
    factory: Factory,
}

impl fmt::Debug for TestDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDefinition")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl TestDefinition {
    /// Define a test built by `factory`.
    pub fn new<F>(name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn PlayTest> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            tags: Vec::new(),
            data: Vec::new(),
            factory: Box::new(factory),
        }
    }

    /// Define a test built with `T::default()`.
    pub fn of<T>(name: &str) -> Self
    where
        T: PlayTest + Default + 'static,
    {
        Self::new(name, || Box::new(T::default()))
    }

    /// Attach tags; they are lower-cased and deduplicated.
    #[must_use]
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        for tag in tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    /// Add a data attribute. `slot` names the target field; `None` injects
    /// into the first writable field whose kind accepts each value.
    #[must_use]
    pub fn with_data(mut self, slot: Option<&str>, values: Vec<ParamValue>) -> Self {
        self.data.push(DataSet {
            slot: slot.map(str::to_string),
            values,
        });
        self
    }

    /// Fresh instance.
    pub fn instantiate(&self) -> Box<dyn PlayTest> {
        (self.factory)()
    }
}

/// One runnable unit: a definition plus at most one bound value.
#[derive(Debug, Clone)]
pub struct TestCaseDescriptor {
    /// Definition this case comes from.
    pub definition: Arc<TestDefinition>,
    /// Bound value.
    pub value: Option<ParamValue>,
    /// Slot named by the data attribute.
    pub slot: Option<String>,
}

impl TestCaseDescriptor {
    /// `name`, or `name [value]` for parameterized cases.
    pub fn display_name(&self) -> String {
        match &self.value {
            Some(v) => format!("{} [{v}]", self.definition.name),
            None => self.definition.name.clone(),
        }
    }

    /// Fresh instance with the bound value injected.
    pub fn instantiate(&self) -> Box<dyn PlayTest> {
        let mut test = self.definition.instantiate();
        if let Some(value) = &self.value {
            inject(test.as_mut(), self.slot.as_deref(), value);
        }
        test
    }
}

/// Inject `value`: the named slot first, then the first writable slot whose
/// kind accepts it. Returns the slot used.
pub fn inject(test: &mut dyn PlayTest, slot: Option<&str>, value: &ParamValue) -> Option<String> {
    let slots = test.params();
    let usable = |s: &&ParamSlot| s.writable && s.kind.accepts(value);
    let named = slot.and_then(|name| slots.iter().filter(usable).find(|s| s.name == name));
    let chosen = named.or_else(|| slots.iter().find(usable))?;
    if test.set_param(&chosen.name, value) {
        Some(chosen.name.clone())
    } else {
        warn!(slot = %chosen.name, %value, "param_injection_rejected");
        None
    }
}

/// Expand a definition into cases: one per value, or one when there is no data.
pub fn expand(definition: &Arc<TestDefinition>) -> Vec<TestCaseDescriptor> {
    if definition.data.is_empty() {
        return vec![TestCaseDescriptor {
            definition: definition.clone(),
            value: None,
            slot: None,
        }];
    }
    definition
        .data
        .iter()
        .flat_map(|set| {
            set.values.iter().map(|v| TestCaseDescriptor {
                definition: definition.clone(),
                value: Some(v.clone()),
                slot: set.slot.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Fields {
        level: i64,
        speed: f64,
        player: String,
        locked: String,
    }

    #[async_trait]
    impl PlayTest for Fields {
        async fn run(&mut self, _t: &Tester) -> Outcome<()> {
            Ok(())
        }

        fn params(&self) -> Vec<ParamSlot> {
            vec![
                ParamSlot::read_only("locked", ParamKind::Text),
                ParamSlot::new("level", ParamKind::Int),
                ParamSlot::new("speed", ParamKind::Float),
                ParamSlot::new("player", ParamKind::Text),
            ]
        }

        fn set_param(&mut self, name: &str, value: &ParamValue) -> bool {
            match (name, value) {
                ("level", ParamValue::Int(v)) => self.level = *v,
                ("speed", ParamValue::Float(v)) => self.speed = *v,
                ("speed", ParamValue::Int(v)) => self.speed = *v as f64,
                ("player", ParamValue::Text(v)) => self.player = v.clone(),
                ("locked", ParamValue::Text(v)) => self.locked = v.clone(),
                _ => return false,
            }
            true
        }
    }

    #[test]
    fn no_data_yields_one_case() {
        let def = Arc::new(TestDefinition::of::<Fields>("plain"));
        let cases = expand(&def);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].display_name(), "plain");
    }

    #[test]
    fn values_expand_in_order() {
        let def = Arc::new(
            TestDefinition::of::<Fields>("names")
                .with_data(None, vec!["Ada".into(), "Grace".into(), "Linus".into()])
                .with_data(Some("level"), vec![ParamValue::Int(3)]),
        );
        let names: Vec<String> = expand(&def).iter().map(TestCaseDescriptor::display_name).collect();
        assert_eq!(names, ["names [Ada]", "names [Grace]", "names [Linus]", "names [3]"]);
    }

    #[test]
    fn injection_prefers_the_named_slot() {
        let mut t = Fields::default();
        assert_eq!(inject(&mut t, Some("speed"), &ParamValue::Int(4)).as_deref(), Some("speed"));
        assert_eq!(t.speed, 4.0);
        assert_eq!(t.level, 0);
    }

    #[test]
    fn injection_falls_back_to_first_accepting_writable_slot() {
        let mut t = Fields::default();
        assert_eq!(inject(&mut t, None, &"Ada".into()).as_deref(), Some("player"));
        assert_eq!(t.player, "Ada");
        assert!(t.locked.is_empty());
        assert_eq!(inject(&mut t, Some("nope"), &ParamValue::Int(2)).as_deref(), Some("level"));
        assert_eq!(inject(&mut t, None, &ParamValue::Bool(true)), None);
    }

    #[test]
    fn tags_are_normalized() {
        let def = TestDefinition::of::<Fields>("t").with_tags(&["Smoke", " smoke ", "UI", ""]);
        assert_eq!(def.tags, ["smoke", "ui"]);
    }
}
