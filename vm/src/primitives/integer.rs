use object::Value;

use crate::VM;
use crate::error::{ErrorKind, Unwind};
use crate::primitives::{expect_integer, integer_result};

fn operands(
    vm: &VM,
    primitive: &'static str,
    receiver: Value,
    args: &[Value],
) -> Result<(i64, i64), Unwind> {
    let rhs = args
        .first()
        .copied()
        .ok_or(ErrorKind::WrongArgumentCount { expected: 1, got: 0 })?;
    let a = expect_integer(vm, primitive, receiver)?;
    let b = expect_integer(vm, primitive, rhs)?;
    Ok((a, b))
}

/// Signal a `ZeroDivide` for a division by zero.
fn zero_divide(vm: &mut VM) -> Unwind {
    let class = vm.specials.zero_divide;
    match vm.new_exception(class, Some("division by zero")) {
        Some(exception) => vm.signal(exception),
        None => ErrorKind::primitive("integer_div", "division by zero").into(),
    }
}

pub fn integer_add(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let (a, b) = operands(vm, "integer_add", receiver, args)?;
    integer_result(vm, "integer_add", i128::from(a) + i128::from(b))
}

pub fn integer_sub(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let (a, b) = operands(vm, "integer_sub", receiver, args)?;
    integer_result(vm, "integer_sub", i128::from(a) - i128::from(b))
}

pub fn integer_mul(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let (a, b) = operands(vm, "integer_mul", receiver, args)?;
    integer_result(vm, "integer_mul", i128::from(a) * i128::from(b))
}

/// Exact division. A remainder is a primitive failure; there are no
/// fractions.
pub fn integer_div(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let (a, b) = operands(vm, "integer_div", receiver, args)?;
    if b == 0 {
        return Err(zero_divide(vm));
    }
    let (a, b) = (i128::from(a), i128::from(b));
    if a % b != 0 {
        return Err(ErrorKind::primitive(
            "integer_div",
            format!("{a} is not divisible by {b}"),
        )
        .into());
    }
    integer_result(vm, "integer_div", a / b)
}

/// Quotient rounded towards negative infinity.
pub fn integer_quo(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let (a, b) = operands(vm, "integer_quo", receiver, args)?;
    if b == 0 {
        return Err(zero_divide(vm));
    }
    let (a, b) = (i128::from(a), i128::from(b));
    let q = a / b;
    let q = if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q };
    integer_result(vm, "integer_quo", q)
}

/// Modulo with the sign of the divisor.
pub fn integer_mod(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let (a, b) = operands(vm, "integer_mod", receiver, args)?;
    if b == 0 {
        return Err(zero_divide(vm));
    }
    let (a, b) = (i128::from(a), i128::from(b));
    let r = a % b;
    let r = if r != 0 && (r < 0) != (b < 0) { r + b } else { r };
    integer_result(vm, "integer_mod", r)
}

fn compare(
    vm: &mut VM,
    primitive: &'static str,
    receiver: Value,
    args: &[Value],
    test: fn(i64, i64) -> bool,
) -> Result<Value, Unwind> {
    let (a, b) = operands(vm, primitive, receiver, args)?;
    Ok(Value::from_bool(test(a, b)))
}

pub fn integer_lt(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    compare(vm, "integer_lt", receiver, args, |a, b| a < b)
}

pub fn integer_gt(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    compare(vm, "integer_gt", receiver, args, |a, b| a > b)
}

pub fn integer_le(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    compare(vm, "integer_le", receiver, args, |a, b| a <= b)
}

pub fn integer_ge(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    compare(vm, "integer_ge", receiver, args, |a, b| a >= b)
}

/// Equality answers `false` for a non-integer argument instead of failing.
pub fn integer_eq(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let a = expect_integer(vm, "integer_eq", receiver)?;
    let b = args.first().and_then(|&v| vm.heap.integer(v));
    Ok(Value::from_bool(b == Some(a)))
}

pub fn integer_ne(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
    let equal = integer_eq(vm, receiver, args)?;
    Ok(Value::from_bool(!equal.is_true()))
}
