use crate::value::{ObjRef, Value};

/// Type tag shared by immediates and heap objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectType {
    Integer = 0,
    Boolean,
    Nil,
    String,
    Symbol,
    Array,
    Dictionary,
    Block,
    Instance,
    Class,
    Method,
}

impl ObjectType {
    pub const COUNT: usize = Self::Method as usize + 1;

    pub const fn name(self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::Boolean => "Boolean",
            Self::Nil => "Nil",
            Self::String => "String",
            Self::Symbol => "Symbol",
            Self::Array => "Array",
            Self::Dictionary => "Dictionary",
            Self::Block => "Block",
            Self::Instance => "Instance",
            Self::Class => "Class",
            Self::Method => "Method",
        }
    }
}

/// Bookkeeping flags stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct HeaderFlags(pub u8);

impl HeaderFlags {
    pub const NONE: Self = Self(0);
    /// The object was relocated; its `forward` field names the new copy.
    pub const MOVED: Self = Self(1 << 0);

    #[inline(always)]
    pub const fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    #[inline(always)]
    pub const fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }

    #[inline(always)]
    pub const fn without(self, flag: Self) -> Self {
        Self(self.0 & !flag.0)
    }
}

/// The header at the start of every heap object.
///
/// `flags` and `forward` are reserved for a copying collector. When
/// [`HeaderFlags::MOVED`] is set, `forward` holds the relocated object and
/// nothing may read this object's payload.
#[derive(Clone)]
pub struct Header {
    object_type: ObjectType,
    class: Option<Value>,
    flags: HeaderFlags,
    forward: Option<ObjRef>,
}

impl Header {
    pub fn new(object_type: ObjectType, class: Option<Value>) -> Self {
        Self {
            object_type,
            class,
            flags: HeaderFlags::NONE,
            forward: None,
        }
    }

    #[inline(always)]
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    #[inline(always)]
    pub fn class(&self) -> Option<Value> {
        self.class
    }

    #[inline(always)]
    pub fn set_class(&mut self, class: Value) {
        self.class = Some(class);
    }

    // ── flags ──────────────────────────────────────────────────────

    #[inline(always)]
    pub fn flags(&self) -> HeaderFlags {
        self.flags
    }

    #[inline(always)]
    pub fn has_flag(&self, flag: HeaderFlags) -> bool {
        self.flags.contains(flag)
    }

    #[inline(always)]
    pub fn add_flag(&mut self, flag: HeaderFlags) {
        self.flags = self.flags.with(flag);
    }

    #[inline(always)]
    pub fn remove_flag(&mut self, flag: HeaderFlags) {
        self.flags = self.flags.without(flag);
    }

    // ── forwarding ─────────────────────────────────────────────────

    #[inline(always)]
    pub fn is_moved(&self) -> bool {
        self.has_flag(HeaderFlags::MOVED)
    }

    #[inline(always)]
    pub fn forward(&self) -> Option<ObjRef> {
        self.forward
    }

    pub fn set_forward(&mut self, to: ObjRef) {
        self.add_flag(HeaderFlags::MOVED);
        self.forward = Some(to);
    }
}

impl core::fmt::Debug for Header {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Header")
            .field("type", &self.object_type)
            .field("class", &self.class)
            .field("flags", &self.flags)
            .field("forward", &self.forward)
            .finish()
    }
}
