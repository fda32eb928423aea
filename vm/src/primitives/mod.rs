use object::Value;

use crate::VM;
use crate::error::{ErrorKind, Unwind};

pub mod array;
pub mod block;
pub mod class;
pub mod dictionary;
pub mod exception;
pub mod integer;
pub mod object_basic;
pub mod string;

pub type PrimitiveFn = fn(&mut VM, Value, &[Value]) -> Result<Value, Unwind>;

#[derive(Clone, Copy)]
pub struct PrimitiveDesc {
    pub name: &'static str,
    pub arity: usize,
    pub func: PrimitiveFn,
}

impl PrimitiveDesc {
    pub const fn new(name: &'static str, arity: usize, func: PrimitiveFn) -> Self {
        Self { name, arity, func }
    }
}

impl std::fmt::Debug for PrimitiveDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimitiveDesc")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// The primitive table. A primitive's number is its position here.
pub fn default_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new("integer_add", 1, integer::integer_add),
        PrimitiveDesc::new("integer_sub", 1, integer::integer_sub),
        PrimitiveDesc::new("integer_mul", 1, integer::integer_mul),
        PrimitiveDesc::new("integer_div", 1, integer::integer_div),
        PrimitiveDesc::new("integer_quo", 1, integer::integer_quo),
        PrimitiveDesc::new("integer_mod", 1, integer::integer_mod),
        PrimitiveDesc::new("integer_lt", 1, integer::integer_lt),
        PrimitiveDesc::new("integer_gt", 1, integer::integer_gt),
        PrimitiveDesc::new("integer_le", 1, integer::integer_le),
        PrimitiveDesc::new("integer_ge", 1, integer::integer_ge),
        PrimitiveDesc::new("integer_eq", 1, integer::integer_eq),
        PrimitiveDesc::new("integer_ne", 1, integer::integer_ne),
        PrimitiveDesc::new("object_identical", 1, object_basic::object_identical),
        PrimitiveDesc::new("object_class", 0, object_basic::object_class),
        PrimitiveDesc::new("object_print_string", 0, object_basic::object_print_string),
        PrimitiveDesc::new("object_yourself", 0, object_basic::object_yourself),
        PrimitiveDesc::new("boolean_not", 0, object_basic::boolean_not),
        PrimitiveDesc::new("class_new", 0, class::class_new),
        PrimitiveDesc::new("class_new_size", 1, class::class_new_size),
        PrimitiveDesc::new("class_name", 0, class::class_name),
        PrimitiveDesc::new("class_superclass", 0, class::class_superclass),
        PrimitiveDesc::new("string_size", 0, string::string_size),
        PrimitiveDesc::new("string_concat", 1, string::string_concat),
        PrimitiveDesc::new("string_eq", 1, string::string_eq),
        PrimitiveDesc::new("string_as_symbol", 0, string::string_as_symbol),
        PrimitiveDesc::new("symbol_as_string", 0, string::symbol_as_string),
        PrimitiveDesc::new("array_at", 1, array::array_at),
        PrimitiveDesc::new("array_at_put", 2, array::array_at_put),
        PrimitiveDesc::new("array_size", 0, array::array_size),
        PrimitiveDesc::new("dictionary_at", 1, dictionary::dictionary_at),
        PrimitiveDesc::new("dictionary_at_put", 2, dictionary::dictionary_at_put),
        PrimitiveDesc::new("dictionary_size", 0, dictionary::dictionary_size),
        PrimitiveDesc::new(
            "dictionary_includes_key",
            1,
            dictionary::dictionary_includes_key,
        ),
        PrimitiveDesc::new("block_value", 0, block::block_value),
        PrimitiveDesc::new("block_value_1", 1, block::block_value),
        PrimitiveDesc::new("block_value_2", 2, block::block_value),
        PrimitiveDesc::new("block_num_args", 0, block::block_num_args),
        PrimitiveDesc::new("block_on_do", 2, block::block_on_do),
        PrimitiveDesc::new("block_fix_temps", 0, block::block_fix_temps),
        PrimitiveDesc::new("exception_signal", 0, exception::exception_signal),
        PrimitiveDesc::new("exception_signal_with", 1, exception::exception_signal_with),
        PrimitiveDesc::new(
            "exception_message_text",
            0,
            exception::exception_message_text,
        ),
    ]
}

pub(crate) fn expect_integer(
    vm: &VM,
    primitive: &'static str,
    value: Value,
) -> Result<i64, Unwind> {
    vm.heap.integer(value).ok_or_else(|| {
        ErrorKind::primitive(
            primitive,
            format!("expected an integer, got {}", vm.print_string(value)),
        )
        .into()
    })
}

/// Owned text of a string or symbol.
pub(crate) fn expect_text(
    vm: &VM,
    primitive: &'static str,
    value: Value,
) -> Result<String, Unwind> {
    vm.heap.text(value).map(str::to_owned).ok_or_else(|| {
        ErrorKind::primitive(
            primitive,
            format!("expected a string, got {}", vm.print_string(value)),
        )
        .into()
    })
}

pub(crate) fn expect_class(
    vm: &VM,
    primitive: &'static str,
    value: Value,
) -> Result<Value, Unwind> {
    match vm.heap.class(value) {
        Some(_) => Ok(value),
        None => Err(ErrorKind::primitive(
            primitive,
            format!("{} is not a class", vm.print_string(value)),
        )
        .into()),
    }
}

/// Box `n` if it leaves the immediate range; fail if it leaves `i64`.
pub(crate) fn integer_result(
    vm: &mut VM,
    primitive: &'static str,
    n: i128,
) -> Result<Value, Unwind> {
    match i64::try_from(n) {
        Ok(n) => Ok(vm.new_integer(n)),
        Err(_) => Err(ErrorKind::primitive(primitive, "integer overflow").into()),
    }
}

/// Convert a 1-based index into an offset below `size`.
pub(crate) fn one_based_index(index: i64, size: usize) -> Result<usize, Unwind> {
    match usize::try_from(index) {
        Ok(i) if (1..=size).contains(&i) => Ok(i - 1),
        _ => Err(ErrorKind::IndexOutOfBounds { index, size }.into()),
    }
}
