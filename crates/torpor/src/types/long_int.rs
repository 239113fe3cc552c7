//! Arbitrary-precision integer support.
//!
//! Small integers live inline as `Value::Int(i64)`; arithmetic that overflows
//! promotes to a heap-allocated `BigInt`. Results are normalized back into the
//! inline form whenever they fit, so bignums only exist while genuinely
//! needed.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    exception_private::RunResult,
    heap::{Heap, HeapData, HeapId},
    resource::ResourceTracker,
    value::Value,
};

/// Wraps a big integer as a value, demoting to `Value::Int` when it fits.
pub(crate) fn bigint_to_value(value: BigInt, heap: &mut Heap<impl ResourceTracker>) -> RunResult<Value> {
    if let Some(small) = value.to_i64() {
        return Ok(Value::Int(small));
    }
    Ok(heap.allocate_value(HeapData::LongInt(value))?)
}

/// Reads a heap slot as a big integer, if it is one.
#[must_use]
pub(crate) fn as_bigint(heap: &Heap<impl ResourceTracker>, id: HeapId) -> Option<&BigInt> {
    match heap.get(id) {
        HeapData::LongInt(value) => Some(value),
        _ => None,
    }
}

/// Extracts any integer value (inline or bignum) as a `BigInt`.
#[must_use]
pub(crate) fn value_to_bigint(value: &Value, heap: &Heap<impl ResourceTracker>) -> Option<BigInt> {
    match value {
        Value::Bool(b) => Some(BigInt::from(i64::from(*b))),
        Value::Int(i) => Some(BigInt::from(*i)),
        Value::Ref(id) => as_bigint(heap, *id).cloned(),
        _ => None,
    }
}
