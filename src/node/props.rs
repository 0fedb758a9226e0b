//! Property bags: `Props`, `PropValue`, and event payloads.
//!
//! A property bag is an unordered map from string names to [`PropValue`]s.
//! The name `key` is reserved: it disambiguates identity between siblings
//! during reconciliation and is never applied to the target.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use super::model::WidgetKind;

/// Reserved property name carrying the sibling identity disambiguator.
pub const KEY: &str = "key";

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Payload delivered to event handler properties.
#[derive(Debug, Clone, Default)]
pub struct Event {
    /// The current value of the originating control, when the event carries
    /// one (e.g. an `input` event).
    pub value: Option<String>,
}

impl Event {
    /// Create an empty event payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an event payload carrying a control value.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

/// A function-valued property: an event callback.
pub type EventHandler = Rc<dyn Fn(&Event)>;

/// A function-valued property deciding whether a one-shot node operation
/// (focus, blur, click, scroll-into-view) fires on this pass.
pub type OpPredicate = Rc<dyn Fn() -> bool>;

// ---------------------------------------------------------------------------
// PropValue
// ---------------------------------------------------------------------------

/// A single property value.
///
/// Equality is the "reference equality" analog used by the diff layer:
/// value equality for plain data, pointer equality for callables, and type
/// identity for widget references.
#[derive(Clone)]
pub enum PropValue {
    /// A string value. Applied to the target as an attribute.
    Str(String),
    /// A numeric value. Applied attribute-encoded.
    Number(f64),
    /// A boolean value. `true` sets the attribute, `false` removes it.
    /// For node operation names, `true` fires on a false-to-true transition.
    Bool(bool),
    /// The reserved `classes` shape: an ordered class list.
    Classes(Vec<String>),
    /// The reserved `styles` shape: per-name style assignments.
    Styles(BTreeMap<String, String>),
    /// An event callback (`on*` names).
    Handler(EventHandler),
    /// A node operation trigger whose result decides firing.
    Predicate(OpPredicate),
    /// A widget type reference, compared by type identity.
    WidgetRef(WidgetKind),
}

impl PropValue {
    /// Whether this value is function-valued (handler or predicate).
    pub fn is_callable(&self) -> bool {
        matches!(self, PropValue::Handler(_) | PropValue::Predicate(_))
    }

    /// Borrow the string contents, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the boolean contents, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Classes(a), PropValue::Classes(b)) => a == b,
            (PropValue::Styles(a), PropValue::Styles(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => Rc::ptr_eq(a, b),
            (PropValue::Predicate(a), PropValue::Predicate(b)) => Rc::ptr_eq(a, b),
            (PropValue::WidgetRef(a), PropValue::WidgetRef(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(s) => write!(f, "Str({s:?})"),
            PropValue::Number(n) => write!(f, "Number({n})"),
            PropValue::Bool(b) => write!(f, "Bool({b})"),
            PropValue::Classes(c) => write!(f, "Classes({c:?})"),
            PropValue::Styles(s) => write!(f, "Styles({s:?})"),
            PropValue::Handler(_) => f.write_str("Handler(..)"),
            PropValue::Predicate(_) => f.write_str("Predicate(..)"),
            PropValue::WidgetRef(k) => write!(f, "WidgetRef({})", k.name()),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Str(s)
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        PropValue::Number(n)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// Props
// ---------------------------------------------------------------------------

/// An unordered property bag.
///
/// Pure data: constructing or cloning a bag never touches a render target.
/// Builder methods consume and return the bag so call sites read like
/// declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    map: HashMap<String, PropValue>,
}

impl Props {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an arbitrary value (builder).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.map.insert(name.into(), value.into());
        self
    }

    /// Set the reserved `key` property (builder).
    pub fn key(self, key: impl Into<String>) -> Self {
        self.with(KEY, PropValue::Str(key.into()))
    }

    /// Set the ordered class list (builder).
    pub fn classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = classes.into_iter().map(Into::into).collect();
        self.map.insert("classes".into(), PropValue::Classes(list));
        self
    }

    /// Set the style map (builder).
    pub fn styles<I, K, V>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = styles
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.map.insert("styles".into(), PropValue::Styles(map));
        self
    }

    /// Attach an event handler under `on<event>` (builder).
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.map
            .insert(format!("on{event}"), PropValue::Handler(Rc::new(handler)));
        self
    }

    /// Attach a node operation predicate (builder). The target layer calls
    /// the predicate on every apply pass and fires the operation when it
    /// returns `true`.
    pub fn op(mut self, name: impl Into<String>, predicate: impl Fn() -> bool + 'static) -> Self {
        self.map
            .insert(name.into(), PropValue::Predicate(Rc::new(predicate)));
        self
    }

    /// Look a property up by name.
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.map.get(name)
    }

    /// The reserved `key` property, if present.
    pub fn key_value(&self) -> Option<&PropValue> {
        self.map.get(KEY)
    }

    /// Whether a property name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Insert a property by value.
    pub fn insert(&mut self, name: impl Into<String>, value: PropValue) {
        self.map.insert(name.into(), value);
    }

    /// Remove a property by name.
    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.map.remove(name)
    }

    /// Iterate over `(name, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Property names, sorted, for deterministic application order.
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.map.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of properties in the bag.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bag() {
        let props = Props::new();
        assert!(props.is_empty());
        assert_eq!(props.len(), 0);
        assert!(props.key_value().is_none());
    }

    #[test]
    fn builder_with() {
        let props = Props::new().with("id", "title").with("tabindex", 2.0);
        assert_eq!(props.get("id"), Some(&PropValue::Str("title".into())));
        assert_eq!(props.get("tabindex"), Some(&PropValue::Number(2.0)));
    }

    #[test]
    fn builder_key() {
        let props = Props::new().key("row-4");
        assert_eq!(props.key_value(), Some(&PropValue::Str("row-4".into())));
    }

    #[test]
    fn builder_classes() {
        let props = Props::new().classes(["a", "b"]);
        assert_eq!(
            props.get("classes"),
            Some(&PropValue::Classes(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn builder_styles() {
        let props = Props::new().styles([("color", "red")]);
        match props.get("styles") {
            Some(PropValue::Styles(map)) => assert_eq!(map.get("color").unwrap(), "red"),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn builder_on_prefixes_name() {
        let props = Props::new().on("click", |_| {});
        assert!(props.contains("onclick"));
        assert!(props.get("onclick").unwrap().is_callable());
    }

    #[test]
    fn handler_equality_is_pointer_equality() {
        let handler: EventHandler = Rc::new(|_: &Event| {});
        let a = PropValue::Handler(handler.clone());
        let b = PropValue::Handler(handler);
        let c = PropValue::Handler(Rc::new(|_: &Event| {}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn scalar_equality_is_value_equality() {
        assert_eq!(PropValue::Str("x".into()), PropValue::Str("x".into()));
        assert_ne!(PropValue::Str("x".into()), PropValue::Str("y".into()));
        assert_eq!(PropValue::Bool(true), PropValue::Bool(true));
        assert_ne!(PropValue::Bool(true), PropValue::Number(1.0));
    }

    #[test]
    fn sorted_names_are_deterministic() {
        let props = Props::new().with("b", "2").with("a", "1").with("c", "3");
        assert_eq!(props.sorted_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn event_with_value() {
        let event = Event::with_value("typed");
        assert_eq!(event.value.as_deref(), Some("typed"));
        assert!(Event::new().value.is_none());
    }
}
