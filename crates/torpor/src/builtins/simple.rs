//! Single-value builtins: `len`, `repr`, `abs`, `hash`, `isinstance`.

use num_traits::Signed;

use crate::{
    args::ArgValues,
    builtins::Builtins,
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData},
    intern::Interns,
    resource::ResourceTracker,
    types::{long_int::bigint_to_value, Type},
    value::Value,
};

/// `len(x)`.
pub(crate) fn builtin_len(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let value = args.get_one_arg("len")?;
    match value.py_len(heap, interns) {
        Some(len) => Ok(Value::Int(len as i64)),
        None => Err(ExcType::type_error(format!(
            "object of type '{}' has no len()",
            value.type_name(heap, interns)
        ))),
    }
}

/// `repr(x)`.
pub(crate) fn builtin_repr(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let value = args.get_one_arg("repr")?;
    let repr = value.py_repr(heap, interns);
    Ok(heap.allocate_value(HeapData::Str(repr))?)
}

/// `abs(x)`.
pub(crate) fn builtin_abs(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let value = args.get_one_arg("abs")?;
    match &value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(i) => match i.checked_abs() {
            Some(result) => Ok(Value::Int(result)),
            None => bigint_to_value(num_bigint::BigInt::from(*i).abs(), heap),
        },
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::LongInt(big) => {
                let result = big.abs();
                bigint_to_value(result, heap)
            }
            _ => Err(bad_abs(&value, heap, interns)),
        },
        _ => Err(bad_abs(&value, heap, interns)),
    }
}

fn bad_abs(
    value: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> crate::exception_private::RunError {
    ExcType::type_error(format!(
        "bad operand type for abs(): '{}'",
        value.type_name(heap, interns)
    ))
}

/// `hash(x)`.
pub(crate) fn builtin_hash(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let value = args.get_one_arg("hash")?;
    Ok(Value::Int(value.py_hash(heap, interns)?))
}

/// `isinstance(x, type_or_tuple)`.
pub(crate) fn builtin_isinstance(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let (value, class) = args.get_two_args("isinstance")?;
    let matched = isinstance_check(&value, &class, heap, interns)?;
    Ok(Value::Bool(matched))
}

fn isinstance_check(
    value: &Value,
    class: &Value,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<bool> {
    match class {
        Value::Builtin(Builtins::Type(t)) => Ok(type_matches(value, *t, heap)),
        Value::Builtin(Builtins::ExcType(handler)) => match value {
            Value::Ref(id) => match heap.get(*id) {
                HeapData::Exception(exc) => Ok(exc.exc_type.is_subclass_of(*handler)),
                _ => Ok(false),
            },
            _ => Ok(false),
        },
        Value::RecordType(type_id) => match value {
            Value::Ref(id) => match heap.get(*id) {
                HeapData::Record(record) => Ok(record.type_id == *type_id),
                _ => Ok(false),
            },
            _ => Ok(false),
        },
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Tuple(classes) => {
                for class in classes {
                    if isinstance_check(value, class, heap, interns)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Err(isinstance_arg2_error()),
        },
        _ => Err(isinstance_arg2_error()),
    }
}

fn isinstance_arg2_error() -> crate::exception_private::RunError {
    ExcType::type_error("isinstance() arg 2 must be a type or tuple of types")
}

/// `isinstance` matching with Python's numeric-tower quirk: `bool` is a
/// subclass of `int`.
fn type_matches(value: &Value, t: Type, heap: &Heap<impl ResourceTracker>) -> bool {
    let Some(value_type) = value.builtin_type(heap) else {
        return false;
    };
    if value_type == t {
        return true;
    }
    matches!((value_type, t), (Type::Bool, Type::Int))
}
