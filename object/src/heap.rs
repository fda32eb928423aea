use std::collections::HashMap;

use crate::header::{Header, ObjectType};
use crate::objects::{Block, Class, Instance, Method, Payload};
use crate::value::{ObjRef, Value};

/// A heap-allocated object: header followed by its payload.
pub struct HeapObject {
    pub header: Header,
    payload: Payload,
}

impl HeapObject {
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

impl core::fmt::Debug for HeapObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HeapObject")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

/// Arena of heap objects plus the symbol intern table.
///
/// Objects are never freed; a copying collector would relocate them with
/// [`Heap::forward`]. Every accessor resolves forwarding before touching a
/// payload, so a moved object is never read in place.
#[derive(Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
    symbols: HashMap<String, Value>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            objects: Vec::with_capacity(capacity),
            symbols: HashMap::new(),
        }
    }

    /// Number of allocated objects, including moved ones.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // ── allocation ─────────────────────────────────────────────────

    pub fn allocate(&mut self, class: Option<Value>, payload: Payload) -> Value {
        let index = self.objects.len();
        assert!(index < (u32::MAX >> 1) as usize, "heap exhausted");
        let header = Header::new(payload.object_type(), class);
        self.objects.push(HeapObject { header, payload });
        Value::from_ref(ObjRef(index as u32))
    }

    /// Answer the unique symbol for `text`, allocating it on first use.
    pub fn intern(&mut self, text: &str, symbol_class: Option<Value>) -> Value {
        if let Some(&symbol) = self.symbols.get(text) {
            return symbol;
        }
        let symbol =
            self.allocate(symbol_class, Payload::Symbol(text.into()));
        self.symbols.insert(text.to_owned(), symbol);
        symbol
    }

    /// The interned symbol for `text`, without allocating.
    pub fn find_symbol(&self, text: &str) -> Option<Value> {
        self.symbols.get(text).copied()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Create a class whose instance variables are the superclass's
    /// followed by `own_names`.
    ///
    /// Returns `None` if `superclass` is given but is not a class.
    pub fn define_class(
        &mut self,
        name: &str,
        superclass: Option<Value>,
        own_names: &[&str],
        metaclass: Option<Value>,
    ) -> Option<Value> {
        let mut names = match superclass {
            Some(sup) => self.class(sup)?.instance_variable_names().to_vec(),
            None => Vec::new(),
        };
        names.extend(own_names.iter().map(|n| (*n).to_owned()));
        let class = Class::new(name, superclass, names);
        Some(self.allocate(metaclass, Payload::Class(class)))
    }

    /// A fresh instance of `class` with every slot nil.
    pub fn instantiate(&mut self, class: Value) -> Option<Value> {
        let size = self.class(class)?.instance_size();
        Some(self.allocate(Some(class), Payload::Instance(Instance::new(size))))
    }

    // ── forwarding ─────────────────────────────────────────────────

    /// Follow forwarding references until an unmoved object is reached.
    fn resolve(&self, mut r: ObjRef) -> Option<ObjRef> {
        loop {
            let obj = self.objects.get(r.index())?;
            if !obj.header.is_moved() {
                return Some(r);
            }
            r = obj.header.forward()?;
        }
    }

    /// Record that `from` now lives at `to`.
    ///
    /// Both must be references; `to` must not itself resolve back to
    /// `from`.
    pub fn forward(&mut self, from: Value, to: Value) {
        let (Some(from), Some(to)) = (from.as_ref(), to.as_ref()) else {
            panic!("only heap references can be forwarded");
        };
        let to = self
            .resolve(to)
            .unwrap_or_else(|| panic!("forwarding target {} is dangling", to.0));
        assert_ne!(from, to, "object cannot forward to itself");
        self.objects[from.index()].header.set_forward(to);
    }

    /// Identity: equal immediates, or references to the same object after
    /// forwarding.
    pub fn identical(&self, a: Value, b: Value) -> bool {
        match (a.as_ref(), b.as_ref()) {
            (Some(x), Some(y)) => self.resolve(x) == self.resolve(y),
            _ => a == b,
        }
    }

    // ── raw access ─────────────────────────────────────────────────

    pub fn object(&self, value: Value) -> Option<&HeapObject> {
        let r = self.resolve(value.as_ref()?)?;
        self.objects.get(r.index())
    }

    fn object_mut(&mut self, value: Value) -> Option<&mut HeapObject> {
        let r = self.resolve(value.as_ref()?)?;
        self.objects.get_mut(r.index())
    }

    pub fn header(&self, value: Value) -> Option<&Header> {
        self.object(value).map(|o| &o.header)
    }

    /// Type tag of any value.
    ///
    /// # Panics
    ///
    /// Panics on a reference that does not name an allocated object.
    pub fn object_type(&self, value: Value) -> ObjectType {
        if let Some(ty) = value.immediate_type() {
            return ty;
        }
        match self.header(value) {
            Some(header) => header.object_type(),
            None => panic!("dangling reference {value:?}"),
        }
    }

    /// Class stored in the object header; `None` for immediates.
    pub fn class_field(&self, value: Value) -> Option<Value> {
        self.header(value)?.class()
    }

    pub fn set_class_field(&mut self, value: Value, class: Value) -> bool {
        match self.object_mut(value) {
            Some(obj) => {
                obj.header.set_class(class);
                true
            }
            None => false,
        }
    }

    // ── typed views ────────────────────────────────────────────────

    /// An integer from either an immediate or a boxed heap integer.
    pub fn integer(&self, value: Value) -> Option<i64> {
        value.as_i64().or_else(|| self.boxed_integer(value))
    }

    pub fn boxed_integer(&self, value: Value) -> Option<i64> {
        match self.object(value)?.payload {
            Payload::Integer(n) => Some(n),
            _ => None,
        }
    }

    pub fn string(&self, value: Value) -> Option<&str> {
        match &self.object(value)?.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn string_mut(&mut self, value: Value) -> Option<&mut String> {
        match &mut self.object_mut(value)?.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn symbol(&self, value: Value) -> Option<&str> {
        match &self.object(value)?.payload {
            Payload::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a string or a symbol.
    pub fn text(&self, value: Value) -> Option<&str> {
        match &self.object(value)?.payload {
            Payload::String(s) => Some(s),
            Payload::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn array(&self, value: Value) -> Option<&[Value]> {
        match &self.object(value)?.payload {
            Payload::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Elements of an array. The length is fixed; only the elements are
    /// mutable.
    pub fn array_mut(&mut self, value: Value) -> Option<&mut [Value]> {
        match &mut self.object_mut(value)?.payload {
            Payload::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn dictionary(&self, value: Value) -> Option<&HashMap<String, Value>> {
        match &self.object(value)?.payload {
            Payload::Dictionary(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn dictionary_mut(
        &mut self,
        value: Value,
    ) -> Option<&mut HashMap<String, Value>> {
        match &mut self.object_mut(value)?.payload {
            Payload::Dictionary(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn block(&self, value: Value) -> Option<&Block> {
        match &self.object(value)?.payload {
            Payload::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn instance(&self, value: Value) -> Option<&Instance> {
        match &self.object(value)?.payload {
            Payload::Instance(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn instance_mut(&mut self, value: Value) -> Option<&mut Instance> {
        match &mut self.object_mut(value)?.payload {
            Payload::Instance(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn class(&self, value: Value) -> Option<&Class> {
        match &self.object(value)?.payload {
            Payload::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn method(&self, value: Value) -> Option<&Method> {
        match &self.object(value)?.payload {
            Payload::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn method_mut(&mut self, value: Value) -> Option<&mut Method> {
        match &mut self.object_mut(value)?.payload {
            Payload::Method(method) => Some(method),
            _ => None,
        }
    }
}
