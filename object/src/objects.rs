use std::collections::HashMap;

use crate::header::ObjectType;
use crate::method_dictionary::MethodDictionary;
use crate::Value;

/// Identity of a live activation record, captured by blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

/// The type-specific part of a heap object.
///
/// The variant always agrees with the header's [`ObjectType`]; the typed
/// views on [`Heap`](crate::Heap) match on it and answer `None` on a
/// mismatch instead of reinterpreting.
pub enum Payload {
    /// Boxed integer for values outside the immediate range.
    Integer(i64),
    String(String),
    Symbol(Box<str>),
    Array(Vec<Value>),
    Dictionary(HashMap<String, Value>),
    Block(Block),
    Instance(Instance),
    Class(Class),
    Method(Method),
}

impl Payload {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Integer(_) => ObjectType::Integer,
            Self::String(_) => ObjectType::String,
            Self::Symbol(_) => ObjectType::Symbol,
            Self::Array(_) => ObjectType::Array,
            Self::Dictionary(_) => ObjectType::Dictionary,
            Self::Block(_) => ObjectType::Block,
            Self::Instance(_) => ObjectType::Instance,
            Self::Class(_) => ObjectType::Class,
            Self::Method(_) => ObjectType::Method,
        }
    }
}

// ── Block ──────────────────────────────────────────────────────────

/// A closure: a method body plus the activation it was bound to.
#[derive(Debug, Clone)]
pub struct Block {
    /// The [`Method`] holding the block's bytecode and literals.
    pub method: Value,
    /// `self` inside the block body.
    pub receiver: Value,
    /// Context the block was bound to, if any.
    pub outer_context: Option<ContextId>,
    pub arg_count: usize,
}

impl Block {
    pub fn new(method: Value, arg_count: usize, receiver: Value) -> Self {
        Self {
            method,
            receiver,
            outer_context: None,
            arg_count,
        }
    }

    pub fn bound_to(&self, context: ContextId) -> Self {
        Self {
            outer_context: Some(context),
            ..self.clone()
        }
    }
}

// ── Instance ───────────────────────────────────────────────────────

/// A plain object with indexed instance-variable slots.
///
/// The slot count equals the length of the class's instance-variable name
/// list at creation.
#[derive(Debug, Clone)]
pub struct Instance {
    slots: Vec<Value>,
}

impl Instance {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![Value::NIL; slot_count],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `index >= self.len()`. An out-of-range slot index is a
    /// compiler bug, not a runtime condition.
    #[inline]
    pub fn instance_variable(&self, index: usize) -> Value {
        match self.slots.get(index) {
            Some(value) => *value,
            None => panic!(
                "instance variable index {index} out of bounds (size {})",
                self.slots.len()
            ),
        }
    }

    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[inline]
    pub fn set_instance_variable(&mut self, index: usize, value: Value) {
        let len = self.slots.len();
        match self.slots.get_mut(index) {
            Some(slot) => *slot = value,
            None => panic!(
                "instance variable index {index} out of bounds (size {len})"
            ),
        }
    }

    pub fn slots(&self) -> &[Value] {
        &self.slots
    }
}

// ── Class ──────────────────────────────────────────────────────────

/// Class metadata.
///
/// `instance_variable_names` already includes every inherited name, in
/// superclass-first order, so an index valid for a superclass names the
/// same slot in all of its subclasses.
#[derive(Debug)]
pub struct Class {
    name: String,
    superclass: Option<Value>,
    instance_variable_names: Vec<String>,
    methods: MethodDictionary,
}

impl Class {
    /// `instance_variable_names` must already start with the superclass's
    /// names; see [`Heap::define_class`](crate::Heap::define_class).
    pub fn new(
        name: impl Into<String>,
        superclass: Option<Value>,
        instance_variable_names: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            superclass,
            instance_variable_names,
            methods: MethodDictionary::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<Value> {
        self.superclass
    }

    pub fn instance_variable_names(&self) -> &[String] {
        &self.instance_variable_names
    }

    pub fn instance_size(&self) -> usize {
        self.instance_variable_names.len()
    }

    /// Offset of the named instance variable.
    pub fn instance_variable_index(&self, name: &str) -> Option<usize> {
        self.instance_variable_names.iter().position(|n| n == name)
    }

    pub fn methods(&self) -> &MethodDictionary {
        &self.methods
    }
}

// ── Method ─────────────────────────────────────────────────────────

/// A compiled method record.
///
/// Either a primitive (`primitive` is set; `bytecodes` may be empty) or a
/// bytecode method. Once installed into a class it is not mutated.
#[derive(Debug, Clone)]
pub struct Method {
    bytecodes: Vec<u8>,
    literals: Vec<Value>,
    selector: Value,
    class: Option<Value>,
    temp_names: Vec<String>,
    arg_count: usize,
    primitive: Option<u16>,
}

impl Method {
    pub fn new(
        selector: Value,
        arg_count: usize,
        bytecodes: Vec<u8>,
        literals: Vec<Value>,
        temp_names: Vec<String>,
    ) -> Self {
        Self {
            bytecodes,
            literals,
            selector,
            class: None,
            temp_names,
            arg_count,
            primitive: None,
        }
    }

    pub fn primitive(selector: Value, arg_count: usize, index: u16) -> Self {
        Self {
            primitive: Some(index),
            ..Self::new(selector, arg_count, Vec::new(), Vec::new(), Vec::new())
        }
    }

    pub fn with_primitive(mut self, index: u16) -> Self {
        self.primitive = Some(index);
        self
    }

    #[inline]
    pub fn bytecodes(&self) -> &[u8] {
        &self.bytecodes
    }

    #[inline]
    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    #[inline]
    pub fn literal(&self, index: usize) -> Option<Value> {
        self.literals.get(index).copied()
    }

    #[inline]
    pub fn selector(&self) -> Value {
        self.selector
    }

    #[inline]
    pub fn class(&self) -> Option<Value> {
        self.class
    }

    pub fn set_class(&mut self, class: Value) {
        self.class = Some(class);
    }

    pub fn temp_names(&self) -> &[String] {
        &self.temp_names
    }

    /// Declared temporaries, not counting arguments.
    #[inline]
    pub fn temp_count(&self) -> usize {
        self.temp_names.len()
    }

    #[inline]
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Slots needed for the activation's temporary frame: arguments first,
    /// then declared temporaries.
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.arg_count + self.temp_names.len()
    }

    #[inline]
    pub fn is_primitive(&self) -> bool {
        self.primitive.is_some()
    }

    #[inline]
    pub fn primitive_index(&self) -> Option<u16> {
        self.primitive
    }
}

/// Number of arguments a selector takes.
///
/// Keyword selectors take one per colon, binary selectors (operator
/// characters only) take one, unary selectors take none.
pub fn selector_arity(selector: &str) -> usize {
    let colons = selector.bytes().filter(|&b| b == b':').count();
    if colons > 0 {
        return colons;
    }
    let is_binary = !selector.is_empty()
        && selector
            .chars()
            .all(|c| !c.is_alphanumeric() && c != '_');
    usize::from(is_binary)
}
