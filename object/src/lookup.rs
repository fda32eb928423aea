use crate::special::CoreClasses;
use crate::{Heap, Value};

/// The result of a method lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    /// No class on the chain defines the selector.
    None,
    /// Selector was found.
    Found {
        /// The class whose dictionary holds the method (may be a
        /// superclass of the receiver's class).
        holder: Value,
        /// The method object.
        method: Value,
    },
}

impl LookupResult {
    pub fn method(self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Found { method, .. } => Some(method),
        }
    }
}

/// Look up `selector` starting at the class of `receiver`.
#[inline]
pub fn lookup(
    heap: &Heap,
    specials: &CoreClasses,
    receiver: Value,
    selector: &str,
) -> LookupResult {
    lookup_in_class(heap, specials.class_of(heap, receiver), selector)
}

/// Look up `selector` starting at `class` and walking superclass links.
///
/// Not finding the selector is not an error here; the caller decides how
/// to report it. A chain that reaches a non-class value ends the walk.
pub fn lookup_in_class(heap: &Heap, class: Value, selector: &str) -> LookupResult {
    let mut current = Some(class);
    while let Some(holder) = current {
        let Some(class) = heap.class(holder) else {
            return LookupResult::None;
        };
        if let Some(method) = class.methods().get_entry(selector) {
            return LookupResult::Found { holder, method };
        }
        current = class.superclass();
    }
    LookupResult::None
}

/// Exact class membership: `value`'s class is `class` itself.
///
/// Subclasses do not match. Exception handlers rely on this.
pub fn is_instance_of(
    heap: &Heap,
    specials: &CoreClasses,
    value: Value,
    class: Value,
) -> bool {
    heap.identical(specials.class_of(heap, value), class)
}

/// Whether `class` is `ancestor` or inherits from it.
pub fn inherits_from(heap: &Heap, class: Value, ancestor: Value) -> bool {
    let mut current = Some(class);
    while let Some(c) = current {
        if heap.identical(c, ancestor) {
            return true;
        }
        current = heap.class(c).and_then(|c| c.superclass());
    }
    false
}
