use std::fmt;

use bytecode::{DecodeError, Op};
use object::Value;
use thiserror::Error;

use crate::exceptions::HandlerId;

/// Malformed bytecode. Never recoverable by the running program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("literal index {index} out of range ({len} literals)")]
    LiteralIndex { index: u32, len: usize },
    #[error("instance variable index {index} out of range (size {len})")]
    InstanceVariableIndex { index: u32, len: usize },
    #[error("temporary index {index} not found in context or its outer context")]
    TemporaryIndex { index: u32 },
    #[error("jump target {target} outside 0..{len}")]
    JumpTarget { target: i64, len: usize },
    #[error("selector literal {index} is not a symbol")]
    SelectorNotSymbol { index: u32 },
    #[error("receiver has no instance variables")]
    NoInstanceVariables,
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Every fatal condition. Fatal errors abort the whole `execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("malformed bytecode at pc {pc}: {error}")]
    Format {
        /// `None` when the opcode byte itself could not be decoded.
        op: Option<Op>,
        pc: usize,
        error: FormatError,
    },
    #[error("#{selector} sent to nil")]
    NilReceiver { selector: String },
    #[error("{class} does not understand #{selector}")]
    MessageNotUnderstood { class: String, selector: String },
    #[error("primitive {primitive} failed: {reason}")]
    PrimitiveFailed {
        primitive: &'static str,
        reason: String,
    },
    #[error("index {index} out of bounds (size {size})")]
    IndexOutOfBounds { index: i64, size: usize },
    #[error("wrong argument count: expected {expected}, got {got}")]
    WrongArgumentCount { expected: usize, got: usize },
    #[error("unknown primitive {index}")]
    UnknownPrimitive { index: u16 },
    #[error("stack overflow ({depth} contexts)")]
    StackOverflow { depth: usize },
    #[error("{value:?} is not a method")]
    NotAMethod { value: Value },
    #[error("unhandled {class}")]
    UnhandledException { exception: Value, class: String },
}

impl ErrorKind {
    pub(crate) fn primitive(primitive: &'static str, reason: impl Into<String>) -> Self {
        Self::PrimitiveFailed {
            primitive,
            reason: reason.into(),
        }
    }
}

/// One activation on the path a fatal error travelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub class: String,
    pub selector: String,
    /// Offset of the instruction that was executing.
    pub pc: usize,
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>>{} (pc {})", self.class, self.selector, self.pc)
    }
}

/// A fatal error with the chain of contexts it unwound, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}{}", render_call_stack(.call_stack))]
pub struct RuntimeError {
    #[source]
    pub kind: ErrorKind,
    pub call_stack: Vec<FrameInfo>,
}

fn render_call_stack(call_stack: &[FrameInfo]) -> String {
    call_stack
        .iter()
        .map(|frame| format!("\n  at {frame}"))
        .collect()
}

impl RuntimeError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            call_stack: Vec::new(),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub(crate) fn with_frame(mut self, frame: FrameInfo) -> Self {
        self.call_stack.push(frame);
        self
    }

    /// The exception that escaped, for unhandled signals.
    pub fn exception(&self) -> Option<Value> {
        match self.kind {
            ErrorKind::UnhandledException { exception, .. } => Some(exception),
            _ => None,
        }
    }
}

impl From<ErrorKind> for RuntimeError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// How control leaves a context other than by returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unwind {
    /// Abort the whole run.
    Fatal(RuntimeError),
    /// Unwind to the `on:do:` activation that installed `handler`.
    Signal { handler: HandlerId, exception: Value },
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Self::Fatal(error)
    }
}

impl From<ErrorKind> for Unwind {
    fn from(kind: ErrorKind) -> Self {
        Self::Fatal(RuntimeError::new(kind))
    }
}
