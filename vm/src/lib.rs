pub mod builder;
pub mod context;
pub mod error;
pub mod exceptions;
pub mod interpreter;
pub mod primitives;
pub mod settings;
pub mod special;

use std::collections::HashMap;

use log::{debug, warn};
use object::{
    Block, ContextId, CoreClasses, Heap, LookupResult, Method, Payload, Value,
    lookup,
};

pub use builder::MethodBuilder;
pub use context::Context;
pub use error::{ErrorKind, FormatError, FrameInfo, RuntimeError, Unwind};
pub use exceptions::{HandlerChain, HandlerId};
pub use settings::VmSettings;

/// Name of the instance variable exceptions keep their description in.
pub const MESSAGE_TEXT: &str = "messageText";

/// The VM owns the heap, the bootstrapped classes and the execution state.
///
/// Independent instances share nothing.
pub struct VM {
    pub heap: Heap,
    pub specials: CoreClasses,
    /// Class name → class.
    pub classes: HashMap<String, Value>,
    /// Registered primitive descriptors, indexed by primitive number.
    pub primitives: Vec<primitives::PrimitiveDesc>,
    /// Active protected regions.
    pub handlers: HandlerChain,
    /// Live contexts, outermost first.
    pub frames: Vec<Context>,
    pub settings: VmSettings,
    next_context_id: u64,
}

impl VM {
    /// A bootstrapped VM with default settings.
    pub fn new() -> Self {
        special::bootstrap(VmSettings::default())
    }

    pub fn with_settings(settings: VmSettings) -> Self {
        special::bootstrap(settings)
    }

    pub(crate) fn next_context_id(&mut self) -> ContextId {
        let id = ContextId(self.next_context_id);
        self.next_context_id += 1;
        id
    }

    /// Number of live contexts.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    // ── entry points ───────────────────────────────────────────────

    /// Run `method` against `receiver` with `args`.
    ///
    /// Answers the method's result, or the fatal error (including an
    /// exception nobody handled) with the contexts it unwound.
    pub fn execute(
        &mut self,
        method: Value,
        receiver: Value,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        interpreter::execute(self, method, receiver, args)
    }

    /// Send `selector` to `receiver` from outside any method.
    pub fn send(
        &mut self,
        receiver: Value,
        selector: &str,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        interpreter::send_message(self, receiver, selector, args)
    }

    /// Raise `exception`.
    ///
    /// Answers the unwind to propagate: towards the innermost handler
    /// guarding exactly the exception's class, or a fatal
    /// `UnhandledException` when there is none.
    pub fn signal(&mut self, exception: Value) -> Unwind {
        match self.handlers.find(&self.heap, &self.specials, exception) {
            Some((handler, _)) => {
                debug!(
                    "{} caught by handler {handler:?}",
                    self.print_string(exception)
                );
                Unwind::Signal { handler, exception }
            }
            None => {
                let class = self.class_name(self.class_of(exception));
                warn!("unhandled {class}");
                ErrorKind::UnhandledException { exception, class }.into()
            }
        }
    }

    // ── allocation ─────────────────────────────────────────────────

    /// The unique symbol for `text`.
    pub fn intern(&mut self, text: &str) -> Value {
        self.heap.intern(text, Some(self.specials.symbol))
    }

    pub fn new_string(&mut self, text: impl Into<String>) -> Value {
        self.heap
            .allocate(Some(self.specials.string), Payload::String(text.into()))
    }

    pub fn new_array(&mut self, elements: Vec<Value>) -> Value {
        self.heap
            .allocate(Some(self.specials.array), Payload::Array(elements))
    }

    pub fn new_dictionary(&mut self) -> Value {
        self.heap.allocate(
            Some(self.specials.dictionary),
            Payload::Dictionary(HashMap::new()),
        )
    }

    /// An immediate when `n` fits, a boxed integer otherwise.
    pub fn new_integer(&mut self, n: i64) -> Value {
        match Value::try_from_i64(n) {
            Some(value) => value,
            None => self
                .heap
                .allocate(Some(self.specials.integer), Payload::Integer(n)),
        }
    }

    /// A block running `method` with `receiver` as `self`.
    ///
    /// Answers `nil` if `method` is not a method.
    pub fn new_block(&mut self, method: Value, receiver: Value) -> Value {
        let Some(arg_count) = self.heap.method(method).map(Method::arg_count) else {
            return Value::NIL;
        };
        self.heap.allocate(
            Some(self.specials.block),
            Payload::Block(Block::new(method, arg_count, receiver)),
        )
    }

    /// A fresh instance of `class`, or `None` if `class` is not a class.
    pub fn new_instance(&mut self, class: Value) -> Option<Value> {
        self.heap.instantiate(class)
    }

    /// An instance of an exception class with its message text set.
    pub fn new_exception(
        &mut self,
        class: Value,
        message: Option<&str>,
    ) -> Option<Value> {
        let exception = self.heap.instantiate(class)?;
        if let Some(text) = message {
            let text = self.new_string(text);
            self.set_message_text(exception, text);
        }
        Some(exception)
    }

    pub(crate) fn message_text_slot(&self, exception: Value) -> Option<usize> {
        self.heap
            .class(self.class_of(exception))?
            .instance_variable_index(MESSAGE_TEXT)
    }

    pub(crate) fn set_message_text(&mut self, exception: Value, text: Value) -> bool {
        let Some(slot) = self.message_text_slot(exception) else {
            return false;
        };
        match self.heap.instance_mut(exception) {
            Some(instance) if slot < instance.len() => {
                instance.set_instance_variable(slot, text);
                true
            }
            _ => false,
        }
    }

    // ── classes & methods ──────────────────────────────────────────

    /// Create and register a class. Its instance variables are the
    /// superclass's followed by `instance_variables`.
    ///
    /// `None` if `superclass` is not a class.
    pub fn define_class(
        &mut self,
        name: &str,
        superclass: Option<Value>,
        instance_variables: &[&str],
    ) -> Option<Value> {
        let class = self.heap.define_class(
            name,
            superclass,
            instance_variables,
            Some(self.specials.class),
        )?;
        self.classes.insert(name.to_owned(), class);
        Some(class)
    }

    pub fn class_named(&self, name: &str) -> Option<Value> {
        self.classes.get(name).copied()
    }

    pub fn class_of(&self, value: Value) -> Value {
        self.specials.class_of(&self.heap, value)
    }

    pub fn class_name(&self, class: Value) -> String {
        self.heap
            .class(class)
            .map_or_else(|| "?".to_owned(), |c| c.name().to_owned())
    }

    /// Install `method` into `class` under its selector, replacing any
    /// previous definition. Answers the replaced method.
    ///
    /// `None` is also answered when `class` or `method` is the wrong kind of
    /// object, or when `method` already belongs to another class; nothing is
    /// installed then.
    pub fn install_method(&mut self, class: Value, method: Value) -> Option<Value> {
        let record = self.heap.method(method)?;
        if record.class().is_some_and(|owner| owner != class) {
            warn!(
                "{} already belongs to another class, not installing it in {}",
                self.print_string(method),
                self.class_name(class)
            );
            return None;
        }
        let selector = self.heap.symbol(record.selector())?.to_owned();
        self.heap.class(class)?;
        self.heap.method_mut(method)?.set_class(class);
        self.heap.class(class)?.methods().set_entry(&selector, method)
    }

    /// The method `receiver` would run for `selector`.
    pub fn lookup_method(&self, receiver: Value, selector: &str) -> Option<Value> {
        match lookup(&self.heap, &self.specials, receiver, selector) {
            LookupResult::Found { method, .. } => Some(method),
            LookupResult::None => None,
        }
    }

    pub fn primitive_index(&self, name: &str) -> Option<u16> {
        self.primitives
            .iter()
            .position(|p| p.name == name)
            .and_then(|i| u16::try_from(i).ok())
    }

    // ── printing ───────────────────────────────────────────────────

    /// Human-readable rendering of any value.
    pub fn print_string(&self, value: Value) -> String {
        if let Some(n) = value.as_i64() {
            return n.to_string();
        }
        if value.is_nil() {
            return "nil".to_owned();
        }
        if value.is_boolean() {
            return value.is_true().to_string();
        }
        let Some(obj) = self.heap.object(value) else {
            return format!("{value:?}");
        };
        let class_name = self.class_name(self.class_of(value));
        match obj.payload() {
            Payload::Integer(n) => n.to_string(),
            Payload::String(s) => format!("'{}'", s.replace('\'', "''")),
            Payload::Symbol(s) => format!("#{s}"),
            Payload::Array(elements) => {
                format!("{}({})", with_article(&class_name), elements.len())
            }
            Payload::Dictionary(entries) => {
                format!("{}({})", with_article(&class_name), entries.len())
            }
            Payload::Block(_) | Payload::Instance(_) => with_article(&class_name),
            Payload::Class(class) => class.name().to_owned(),
            Payload::Method(method) => {
                let holder = method.class().map_or_else(|| "?".to_owned(), |c| self.class_name(c));
                let selector = self.heap.symbol(method.selector()).unwrap_or("?");
                format!("{holder}>>{selector}")
            }
        }
    }

    /// Disassembly of a method, literals annotated with their print strings.
    pub fn disassemble(&self, method: Value) -> Option<String> {
        let record = self.heap.method(method)?;
        let literals = record.literals();
        Some(bytecode::disassemble(record.bytecodes(), |ins| {
            use bytecode::Instruction::{PushLiteral, SendMessage};
            let index = match *ins {
                PushLiteral { index } => index,
                SendMessage { selector, .. } => selector,
                _ => return None,
            };
            literals
                .get(index as usize)
                .map(|&literal| self.print_string(literal))
        }))
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

fn with_article(name: &str) -> String {
    let vowel = name
        .chars()
        .next()
        .is_some_and(|c| "AEIOUaeiou".contains(c));
    if vowel {
        format!("an {name}")
    } else {
        format!("a {name}")
    }
}
