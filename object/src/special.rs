use crate::{Heap, Value};

/// Well-known classes the VM needs for dispatch on values that do not
/// carry their own class pointer, and for allocating literals.
///
/// **Classes are not allocated here.** The VM bootstrap allocates them on
/// the heap and stores the references. Pass this struct by reference
/// (`&CoreClasses`) to subsystems that need it; there is no global copy.
#[derive(Debug, Clone)]
pub struct CoreClasses {
    // ── Hierarchy roots ────────────────────────────────────────────
    /// Root of the class tree; has no superclass.
    pub object: Value,
    /// Class of every class object.
    pub class: Value,

    // ── Classes of immediates ──────────────────────────────────────
    /// Class of `nil`.
    pub undefined_object: Value,
    pub boolean: Value,
    pub true_class: Value,
    pub false_class: Value,
    /// Class of immediate and boxed integers.
    pub integer: Value,

    // ── Classes of built-in heap objects ───────────────────────────
    pub string: Value,
    pub symbol: Value,
    pub array: Value,
    pub dictionary: Value,
    pub block: Value,
    pub method: Value,

    // ── Exceptions ─────────────────────────────────────────────────
    pub exception: Value,
    pub error: Value,
    pub zero_divide: Value,
}

impl CoreClasses {
    /// The class a message sent to `value` is looked up in.
    ///
    /// Immediates map to their fixed classes; heap objects answer the class
    /// recorded in their header, falling back to `Object` for headers
    /// without one (only possible mid-bootstrap).
    pub fn class_of(&self, heap: &Heap, value: Value) -> Value {
        if value.is_fixnum() {
            return self.integer;
        }
        if value.is_nil() {
            return self.undefined_object;
        }
        if value.is_true() {
            return self.true_class;
        }
        if value == Value::FALSE {
            return self.false_class;
        }
        heap.class_field(value).unwrap_or(self.object)
    }

    /// Every core class with its name, in bootstrap order.
    pub fn named(&self) -> [(&'static str, Value); 16] {
        [
            ("Object", self.object),
            ("Class", self.class),
            ("UndefinedObject", self.undefined_object),
            ("Boolean", self.boolean),
            ("True", self.true_class),
            ("False", self.false_class),
            ("Integer", self.integer),
            ("String", self.string),
            ("Symbol", self.symbol),
            ("Array", self.array),
            ("Dictionary", self.dictionary),
            ("Block", self.block),
            ("Method", self.method),
            ("Exception", self.exception),
            ("Error", self.error),
            ("ZeroDivide", self.zero_divide),
        ]
    }
}
