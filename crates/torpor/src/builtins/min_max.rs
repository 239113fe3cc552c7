//! Aggregating builtins over iterables: `min`, `max`, `sum`, `any`, `all`.

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    resource::ResourceTracker,
    types::{iter::collect_iter, long_int::bigint_to_value},
    value::Value,
};

/// Collects the operand set: one iterable argument, or two-plus direct values.
fn gather_operands(
    name: &'static str,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Vec<Value>> {
    let (positional, kwargs) = args.into_parts();
    if !kwargs.is_empty() {
        return Err(ExcType::type_error(format!("{name}() takes no keyword arguments")));
    }
    let mut values: Vec<Value> = positional.collect();
    match values.len() {
        0 => Err(ExcType::type_error_at_least(name, 1, 0)),
        1 => collect_iter(heap, values.pop().expect("len checked"), interns),
        _ => Ok(values),
    }
}

/// min/max selection sharing one traversal.
fn select_extreme(
    name: &'static str,
    want_greater: bool,
    args: ArgValues,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    let values = gather_operands(name, args, heap, interns)?;
    let mut iter = values.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(ExcType::value_error(format!("{name}() arg is an empty sequence")));
    };
    for candidate in iter {
        let Some(ordering) = candidate.py_cmp(&best, heap, interns) else {
            return Err(ExcType::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                candidate.type_name(heap, interns),
                best.type_name(heap, interns)
            )));
        };
        let replace = if want_greater {
            ordering == std::cmp::Ordering::Greater
        } else {
            ordering == std::cmp::Ordering::Less
        };
        if replace {
            best = candidate;
        }
    }
    Ok(best)
}

/// `min(iterable)` / `min(a, b, ...)`.
pub(crate) fn builtin_min(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    select_extreme("min", false, args, heap, interns)
}

/// `max(iterable)` / `max(a, b, ...)`.
pub(crate) fn builtin_max(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    select_extreme("max", true, args, heap, interns)
}

/// `sum(iterable[, start])`.
pub(crate) fn builtin_sum(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let (iterable, start) = args.get_one_two_args("sum")?;
    if start.as_ref().is_some_and(|s| s.as_str(heap, interns).is_some()) {
        return Err(ExcType::type_error("sum() can't sum strings [use ''.join(seq) instead]"));
    }
    let mut total = start.unwrap_or(Value::Int(0));
    for item in collect_iter(heap, iterable, interns)? {
        total = add_numbers(total, item, heap, interns)?;
    }
    Ok(total)
}

/// Numeric addition used by `sum`; promotes on overflow.
fn add_numbers(
    left: Value,
    right: Value,
    heap: &mut Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Value> {
    use crate::types::long_int::value_to_bigint;
    match (left.as_index(), right.as_index()) {
        (Some(a), Some(b)) => match a.checked_add(b) {
            Some(result) => Ok(Value::Int(result)),
            None => bigint_to_value(num_bigint::BigInt::from(a) + num_bigint::BigInt::from(b), heap),
        },
        _ => {
            if let (Some(a), Some(b)) = (value_to_bigint(&left, heap), value_to_bigint(&right, heap)) {
                return bigint_to_value(a + b, heap);
            }
            match (left.as_number(heap), right.as_number(heap)) {
                (Some(a), Some(b)) => Ok(Value::Float(a + b)),
                _ => Err(ExcType::type_error(format!(
                    "unsupported operand type(s) for +: '{}' and '{}'",
                    left.type_name(heap, interns),
                    right.type_name(heap, interns)
                ))),
            }
        }
    }
}

/// `any(iterable)`.
pub(crate) fn builtin_any(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let iterable = args.get_one_arg("any")?;
    for item in collect_iter(heap, iterable, interns)? {
        if item.py_bool(heap, interns) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// `all(iterable)`.
pub(crate) fn builtin_all(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let iterable = args.get_one_arg("all")?;
    for item in collect_iter(heap, iterable, interns)? {
        if !item.py_bool(heap, interns) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}
