use std::collections::HashMap;

use object::Value;

use crate::VM;
use crate::error::{ErrorKind, Unwind};
use crate::primitives::expect_text;

fn entries<'a>(
    vm: &'a VM,
    primitive: &'static str,
    receiver: Value,
) -> Result<&'a HashMap<String, Value>, Unwind> {
    vm.heap.dictionary(receiver).ok_or_else(|| {
        ErrorKind::primitive(
            primitive,
            format!("{} is not a dictionary", vm.print_string(receiver)),
        )
        .into()
    })
}

fn key(vm: &VM, primitive: &'static str, args: &[Value]) -> Result<String, Unwind> {
    let key = args
        .first()
        .copied()
        .ok_or(ErrorKind::WrongArgumentCount { expected: 1, got: 0 })?;
    expect_text(vm, primitive, key)
}

/// Keys are strings or symbols, compared by text. A missing key answers
/// `nil`.
pub fn dictionary_at(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let key = key(vm, "dictionary_at", args)?;
    let entries = entries(vm, "dictionary_at", receiver)?;
    Ok(entries.get(&key).copied().unwrap_or(Value::NIL))
}

pub fn dictionary_at_put(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let &[_, value] = args else {
        return Err(ErrorKind::WrongArgumentCount { expected: 2, got: args.len() }.into());
    };
    let key = key(vm, "dictionary_at_put", args)?;
    entries(vm, "dictionary_at_put", receiver)?;
    if let Some(entries) = vm.heap.dictionary_mut(receiver) {
        entries.insert(key, value);
    }
    Ok(value)
}

pub fn dictionary_size(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    let len = entries(vm, "dictionary_size", receiver)?.len();
    Ok(vm.new_integer(len as i64))
}

pub fn dictionary_includes_key(
    vm: &mut VM,
    receiver: Value,
    args: &[Value],
) -> Result<Value, Unwind> {
    let key = key(vm, "dictionary_includes_key", args)?;
    let entries = entries(vm, "dictionary_includes_key", receiver)?;
    Ok(Value::from_bool(entries.contains_key(&key)))
}
