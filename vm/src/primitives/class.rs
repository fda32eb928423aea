use std::collections::HashMap;

use object::{Payload, Value, inherits_from};

use crate::VM;
use crate::error::{ErrorKind, Unwind};
use crate::primitives::{expect_class, expect_integer};

/// `Class>>new`.
///
/// Collections and strings start empty and keep the receiver as their
/// class; classes whose instances are immediates, or are only made by the
/// VM, refuse.
pub fn class_new(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    let class = expect_class(vm, "class_new", receiver)?;
    let s = vm.specials.clone();
    let is = |ancestor: Value| inherits_from(&vm.heap, class, ancestor);

    let vm_made = [s.symbol, s.integer, s.boolean, s.undefined_object, s.block, s.method, s.class];
    if vm_made.into_iter().any(is) {
        return Err(refuse(vm, class));
    }
    let payload = if is(s.array) {
        Payload::Array(Vec::new())
    } else if is(s.dictionary) {
        Payload::Dictionary(HashMap::new())
    } else if is(s.string) {
        Payload::String(String::new())
    } else {
        return vm.new_instance(class).ok_or_else(|| refuse(vm, class));
    };
    Ok(vm.heap.allocate(Some(class), payload))
}

fn refuse(vm: &VM, class: Value) -> Unwind {
    ErrorKind::primitive(
        "class_new",
        format!("cannot instantiate {}", vm.class_name(class)),
    )
    .into()
}

/// `Array class>>new:`, an array of `size` nils.
pub fn class_new_size(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let class = expect_class(vm, "class_new_size", receiver)?;
    if class != vm.specials.array {
        return Err(ErrorKind::primitive(
            "class_new_size",
            format!("{} does not have indexed instances", vm.class_name(class)),
        )
        .into());
    }
    let size = args
        .first()
        .copied()
        .ok_or(ErrorKind::WrongArgumentCount { expected: 1, got: 0 })?;
    let size = expect_integer(vm, "class_new_size", size)?;
    let Ok(size) = usize::try_from(size) else {
        return Err(ErrorKind::primitive(
            "class_new_size",
            format!("negative size {size}"),
        )
        .into());
    };
    let mut elements = Vec::new();
    if elements.try_reserve_exact(size).is_err() {
        return Err(ErrorKind::primitive(
            "class_new_size",
            format!("cannot allocate {size} elements"),
        )
        .into());
    }
    elements.resize(size, Value::NIL);
    Ok(vm.new_array(elements))
}

pub fn class_name(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    let class = expect_class(vm, "class_name", receiver)?;
    let name = vm.class_name(class);
    Ok(vm.new_string(name))
}

/// `nil` for `Object`.
pub fn class_superclass(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Value, Unwind> {
    let class = expect_class(vm, "class_superclass", receiver)?;
    Ok(vm
        .heap
        .class(class)
        .and_then(|c| c.superclass())
        .unwrap_or(Value::NIL))
}
