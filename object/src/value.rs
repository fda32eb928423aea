use crate::header::ObjectType;

/// Tag constants.
const FIXNUM_MASK: u64 = 0b1;
const TAG_MASK: u64 = 0b11;
const REF_TAG: u64 = 0b01;
const SPECIAL_TAG: u64 = 0b11;

const NIL_BITS: u64 = (0 << 2) | SPECIAL_TAG;
const TRUE_BITS: u64 = (1 << 2) | SPECIAL_TAG;
const FALSE_BITS: u64 = (2 << 2) | SPECIAL_TAG;

/// Index of an object in the [`Heap`](crate::Heap) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjRef(pub u32);

impl ObjRef {
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A tagged 64-bit value.
///
/// Encoding:
/// - **Fixnum**:    `...XXXXX0` — 63-bit signed integer (low bit 0).
/// - **Reference**: `...XXXX01` — arena index in the upper 62 bits.
/// - **Special**:   `...XXXX11` — `nil`, `true` or `false`; payload in the
///   upper bits selects which.
///
/// Immediates carry no identity beyond their bits: two fixnums with the same
/// payload compare equal, and so do two `true`s.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(u64);

impl Value {
    pub const NIL: Value = Value(NIL_BITS);
    pub const TRUE: Value = Value(TRUE_BITS);
    pub const FALSE: Value = Value(FALSE_BITS);

    /// Smallest integer that fits in an immediate.
    pub const FIXNUM_MIN: i64 = -(1i64 << 62);
    /// Largest integer that fits in an immediate.
    pub const FIXNUM_MAX: i64 = (1i64 << 62) - 1;

    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    // ── Fixnum ─────────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_fixnum(self) -> bool {
        self.0 & FIXNUM_MASK == 0
    }

    #[inline(always)]
    pub const fn fits_fixnum(n: i64) -> bool {
        n >= Self::FIXNUM_MIN && n <= Self::FIXNUM_MAX
    }

    /// Encode `n` as an immediate integer.
    ///
    /// # Panics
    ///
    /// Panics if `n` is outside `[FIXNUM_MIN, FIXNUM_MAX]`. Use
    /// [`try_from_i64`](Self::try_from_i64) when the range is not known.
    #[inline(always)]
    pub fn from_i64(n: i64) -> Self {
        Self::try_from_i64(n)
            .unwrap_or_else(|| panic!("fixnum overflow: {n}"))
    }

    #[inline(always)]
    pub const fn try_from_i64(n: i64) -> Option<Self> {
        if Self::fits_fixnum(n) {
            Some(Self((n << 1) as u64))
        } else {
            None
        }
    }

    /// Decode an immediate integer, or `None` for any other value.
    #[inline(always)]
    pub const fn as_i64(self) -> Option<i64> {
        if self.is_fixnum() {
            Some((self.0 as i64) >> 1)
        } else {
            None
        }
    }

    // ── Specials ───────────────────────────────────────────────────

    #[inline(always)]
    pub const fn from_bool(b: bool) -> Self {
        if b { Self::TRUE } else { Self::FALSE }
    }

    #[inline(always)]
    pub const fn is_nil(self) -> bool {
        self.0 == NIL_BITS
    }

    #[inline(always)]
    pub const fn is_boolean(self) -> bool {
        self.0 == TRUE_BITS || self.0 == FALSE_BITS
    }

    /// Truthiness: only the `true` immediate is true.
    ///
    /// `false`, `nil`, `0`, empty strings and every heap object are false.
    /// This is not "non-nil is true".
    #[inline(always)]
    pub const fn is_true(self) -> bool {
        self.0 == TRUE_BITS
    }

    #[inline(always)]
    pub const fn is_special(self) -> bool {
        self.0 & TAG_MASK == SPECIAL_TAG
    }

    // ── Reference ──────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_ref(self) -> bool {
        self.0 & TAG_MASK == REF_TAG
    }

    #[inline(always)]
    pub const fn from_ref(r: ObjRef) -> Self {
        Self(((r.0 as u64) << 2) | REF_TAG)
    }

    #[inline(always)]
    pub const fn as_ref(self) -> Option<ObjRef> {
        if self.is_ref() {
            Some(ObjRef((self.0 >> 2) as u32))
        } else {
            None
        }
    }

    /// Type of an immediate value, `None` for heap references.
    ///
    /// Decided from the tag bits alone; heap references need the object
    /// header (see [`Heap::object_type`](crate::Heap::object_type)).
    #[inline(always)]
    pub const fn immediate_type(self) -> Option<ObjectType> {
        match self.0 & TAG_MASK {
            0b00 | 0b10 => Some(ObjectType::Integer),
            REF_TAG => None,
            _ => match self.0 {
                NIL_BITS => Some(ObjectType::Nil),
                _ => Some(ObjectType::Boolean),
            },
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::NIL
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::from_bool(b)
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(n) = self.as_i64() {
            write!(f, "Fixnum({n})")
        } else if let Some(r) = self.as_ref() {
            write!(f, "Ref({})", r.0)
        } else if self.is_nil() {
            write!(f, "Nil")
        } else if self.is_true() {
            write!(f, "True")
        } else if *self == Self::FALSE {
            write!(f, "False")
        } else {
            write!(f, "Special(0x{:016x})", self.0)
        }
    }
}
