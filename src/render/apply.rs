//! Commit-time property application: translate a before/after property pair
//! into target mutations and event-map updates.
//!
//! Application order is fixed: orphaned listeners come off the event map
//! first, stale target state (classes, styles, attributes) is cleared next,
//! then the next bag applies name by name in sorted order. The `value`
//! property is guarded so an unchanged declared value never overwrites
//! control edits the engine did not request.

use std::collections::HashMap;

use crate::node::{EventHandler, PropValue, Props, KEY};
use crate::target::{NodeOp, RenderTarget};

/// Listener map owned by the renderer, keyed by node handle and event name
/// (without the `on` prefix).
pub(crate) type EventMap<N> = HashMap<(N, String), EventHandler>;

/// Control values captured by `input` dispatches, keyed by node handle.
pub(crate) type InputValues<N> = HashMap<N, String>;

pub(crate) fn apply_properties<T: RenderTarget>(
    target: &mut T,
    events: &mut EventMap<T::Node>,
    input_values: &mut InputValues<T::Node>,
    node: T::Node,
    previous: &Props,
    next: &Props,
) {
    remove_orphans(target, events, node, previous, next);

    for name in next.sorted_names() {
        if name == KEY {
            continue;
        }
        let value = next.get(name).expect("sorted name came from this bag");
        let prev_value = previous.get(name);
        match (name, value) {
            ("classes", _) => apply_classes(target, node, prev_value, value),
            ("styles", PropValue::Styles(styles)) => {
                let prev_styles = match prev_value {
                    Some(PropValue::Styles(map)) => Some(map),
                    _ => None,
                };
                for (style, style_value) in styles {
                    let changed = prev_styles
                        .and_then(|p| p.get(style))
                        .map_or(true, |p| p != style_value);
                    if changed {
                        if style_value.is_empty() {
                            target.set_style(node, style, None);
                        } else {
                            target.set_style(node, style, Some(style_value));
                        }
                    }
                }
                if let Some(prev_styles) = prev_styles {
                    for style in prev_styles.keys() {
                        if !styles.contains_key(style) {
                            target.set_style(node, style, None);
                        }
                    }
                }
            }
            ("value", PropValue::Str(next_value)) => {
                apply_value(target, input_values, node, prev_value, next_value);
            }
            (_, PropValue::Handler(handler)) if name.starts_with("on") => {
                let event = name[2..].to_owned();
                let unchanged = matches!(
                    prev_value,
                    Some(PropValue::Handler(prev)) if std::rc::Rc::ptr_eq(prev, handler)
                );
                if !unchanged {
                    events.insert((node, event), handler.clone());
                }
            }
            (_, PropValue::Bool(requested)) if NodeOp::from_name(name).is_some() => {
                // Fires on the false-to-true transition only.
                let was = matches!(prev_value, Some(PropValue::Bool(true)));
                if *requested && !was {
                    target.perform(node, NodeOp::from_name(name).expect("checked above"));
                }
            }
            (_, PropValue::Predicate(predicate)) if NodeOp::from_name(name).is_some() => {
                if predicate() {
                    target.perform(node, NodeOp::from_name(name).expect("checked above"));
                }
            }
            _ => {
                if prev_value == Some(value) {
                    continue;
                }
                match value {
                    PropValue::Str(s) => target.set_attribute(node, name, s),
                    PropValue::Number(n) => target.set_attribute(node, name, &format_number(*n)),
                    PropValue::Bool(true) => target.set_attribute(node, name, "true"),
                    PropValue::Bool(false) => target.remove_attribute(node, name),
                    other => {
                        tracing::debug!(name, value = ?other, "property has no target encoding");
                    }
                }
            }
        }
    }
}

/// Drop previous-only state: listeners off the event map, classes, styles,
/// and plain attributes off the target.
fn remove_orphans<T: RenderTarget>(
    target: &mut T,
    events: &mut EventMap<T::Node>,
    node: T::Node,
    previous: &Props,
    next: &Props,
) {
    for name in previous.sorted_names() {
        if next.contains(name) || name == KEY {
            continue;
        }
        match previous.get(name).expect("sorted name came from this bag") {
            PropValue::Handler(_) if name.starts_with("on") => {
                events.remove(&(node, name[2..].to_owned()));
            }
            _ if name == "classes" => {
                for class in class_list(previous.get(name)) {
                    target.remove_class(node, class);
                }
            }
            PropValue::Styles(styles) if name == "styles" => {
                for style in styles.keys() {
                    target.set_style(node, style, None);
                }
            }
            PropValue::Str(_) | PropValue::Number(_) | PropValue::Bool(_)
                if name != "value" && NodeOp::from_name(name).is_none() =>
            {
                target.remove_attribute(node, name);
            }
            _ => {}
        }
    }
}

fn apply_classes<T: RenderTarget>(
    target: &mut T,
    node: T::Node,
    previous: Option<&PropValue>,
    next: &PropValue,
) {
    let prev = class_list(previous);
    let want = class_list(Some(next));
    for class in &prev {
        if !want.contains(class) {
            target.remove_class(node, class);
        }
    }
    for class in &want {
        if !prev.contains(class) {
            target.add_class(node, class);
        }
    }
}

/// `classes` accepts a class list or a single class string.
fn class_list(value: Option<&PropValue>) -> Vec<&str> {
    match value {
        Some(PropValue::Classes(classes)) => classes.iter().map(String::as_str).collect(),
        Some(PropValue::Str(class)) => vec![class.as_str()],
        _ => Vec::new(),
    }
}

/// Write `value` only when it would change the control. Without an input
/// marker an unchanged declared value never overwrites control drift the
/// engine did not dispatch. With a marker (the control value captured at
/// `input` dispatch) a still-matching control is reset to the declared
/// value, which is what makes a controlled input stick.
fn apply_value<T: RenderTarget>(
    target: &mut T,
    input_values: &mut InputValues<T::Node>,
    node: T::Node,
    previous: Option<&PropValue>,
    next_value: &str,
) {
    let current = target.value(node);
    if current.as_deref() == Some(next_value) {
        return;
    }
    let allowed = match input_values.get(&node) {
        Some(marker) => current.as_deref() == Some(marker.as_str()),
        None => previous.and_then(PropValue::as_str) != Some(next_value),
    };
    if allowed {
        target.set_value(node, next_value);
        input_values.remove(&node);
    }
}

// Integers up to 2^53 are exact in an f64; beyond that the cast would
// saturate, so large magnitudes take the plain float encoding.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() <= MAX_EXACT_INT {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
