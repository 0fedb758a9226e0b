//! Property diffing: pure change detection over property bags.
//!
//! The default policy is [`auto`], which dispatches on the shape of the next
//! value: callables are ignored (rebinding is the target layer's job),
//! widget references compare by type identity, container shapes compare
//! shallowly, and everything else compares by value. A property name may be
//! registered in [`DiffOverrides`] with a custom policy that fully replaces
//! [`auto`] for that name; override results merge into the aggregate changed
//! key set.
//!
//! Diffing never mutates its inputs: it returns the next effective value set
//! plus the (sorted) list of keys whose effective value changed.

use std::collections::HashMap;
use std::rc::Rc;

use crate::node::{PropValue, Props};

// ---------------------------------------------------------------------------
// PropChange and policies
// ---------------------------------------------------------------------------

/// The outcome of diffing one property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropChange {
    /// Whether the effective value changed.
    pub changed: bool,
    /// The effective value to keep. `None` drops the property.
    pub value: Option<PropValue>,
}

/// A diff policy for one property name.
pub type DiffFn = Rc<dyn Fn(Option<&PropValue>, Option<&PropValue>) -> PropChange>;

/// Always reports a change and keeps the next value.
pub fn always(_previous: Option<&PropValue>, next: Option<&PropValue>) -> PropChange {
    PropChange {
        changed: true,
        value: next.cloned(),
    }
}

/// Never reports a change; keeps the next value.
pub fn ignore(_previous: Option<&PropValue>, next: Option<&PropValue>) -> PropChange {
    PropChange {
        changed: false,
        value: next.cloned(),
    }
}

/// Reference/value equality: changed iff the two values differ under
/// [`PropValue`] equality (pointer equality for callables).
pub fn reference(previous: Option<&PropValue>, next: Option<&PropValue>) -> PropChange {
    PropChange {
        changed: previous != next,
        value: next.cloned(),
    }
}

/// Shallow comparison for container shapes: same variant, same length or
/// key set, and every member equal one level deep. Anything that is not a
/// container pair reports changed.
pub fn shallow(previous: Option<&PropValue>, next: Option<&PropValue>) -> PropChange {
    let changed = match (previous, next) {
        (Some(PropValue::Classes(a)), Some(PropValue::Classes(b))) => a != b,
        (Some(PropValue::Styles(a)), Some(PropValue::Styles(b))) => {
            a.len() != b.len() || b.iter().any(|(k, v)| a.get(k) != Some(v))
        }
        _ => true,
    };
    PropChange {
        changed,
        value: next.cloned(),
    }
}

/// The default policy: dispatch on the shape of the next value.
pub fn auto(previous: Option<&PropValue>, next: Option<&PropValue>) -> PropChange {
    match next {
        Some(PropValue::Handler(_)) | Some(PropValue::Predicate(_)) => ignore(previous, next),
        Some(PropValue::WidgetRef(_)) => reference(previous, next),
        Some(PropValue::Classes(_)) | Some(PropValue::Styles(_)) => shallow(previous, next),
        _ => reference(previous, next),
    }
}

// ---------------------------------------------------------------------------
// DiffOverrides
// ---------------------------------------------------------------------------

/// Per-name diff policy overrides.
///
/// An override fully replaces the default policy for its name; names without
/// an override fall through to [`auto`].
#[derive(Clone, Default)]
pub struct DiffOverrides {
    map: HashMap<String, DiffFn>,
}

impl DiffOverrides {
    /// Create an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy for a property name (builder).
    pub fn register(
        mut self,
        name: impl Into<String>,
        policy: impl Fn(Option<&PropValue>, Option<&PropValue>) -> PropChange + 'static,
    ) -> Self {
        self.map.insert(name.into(), Rc::new(policy));
        self
    }

    /// Look a policy up by name.
    pub fn get(&self, name: &str) -> Option<&DiffFn> {
        self.map.get(name)
    }

    /// Whether any overrides are registered.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for DiffOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffOverrides")
            .field("names", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// diff_properties
// ---------------------------------------------------------------------------

/// The result of diffing two property bags.
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    /// The next effective value set.
    pub props: Props,
    /// Names whose effective value changed, sorted for determinism. Names
    /// present only in `previous` are reported changed but contribute no
    /// value to `props`.
    pub changed: Vec<String>,
}

/// Diff two property bags under the default policy plus overrides.
pub fn diff_properties(previous: &Props, next: &Props, overrides: &DiffOverrides) -> DiffOutcome {
    let mut props = Props::new();
    let mut changed = Vec::new();

    let mut names: Vec<&str> = next.iter().map(|(name, _)| name).collect();
    for (name, _) in previous.iter() {
        if !next.contains(name) {
            names.push(name);
        }
    }
    names.sort_unstable();

    for name in names {
        let prev_value = previous.get(name);
        let next_value = next.get(name);
        let change = match overrides.get(name) {
            Some(policy) => policy(prev_value, next_value),
            None => auto(prev_value, next_value),
        };
        if change.changed {
            changed.push(name.to_owned());
        }
        if next.contains(name) {
            if let Some(value) = change.value {
                props.insert(name, value);
            }
        }
    }

    DiffOutcome { props, changed }
}

// ===========================================================================
// Tests
// ===========================================================================
