//! Iterator-producing builtins: `enumerate`, `zip`, `reversed`.
//!
//! `map` and `filter` also belong to this family conceptually, but they call
//! back into compiled code, so the VM dispatches them itself.

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData},
    intern::Interns,
    resource::ResourceTracker,
    types::iter::{collect_iter, make_iter, Iter},
    value::Value,
};

/// `enumerate(iterable, start=0)`.
pub(crate) fn builtin_enumerate(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let (iterable, start) = match args {
        ArgValues::One(iterable) => (iterable, 0),
        ArgValues::Two(iterable, start) => {
            let Some(start) = start.as_index() else {
                return Err(ExcType::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    start.type_name(heap, interns)
                )));
            };
            (iterable, start)
        }
        other => return Err(ExcType::type_error_at_most("enumerate", 2, other.positional_count())),
    };
    let inner = make_iter(heap, iterable, interns)?;
    let Value::Ref(inner_id) = inner else {
        return Err(crate::exception_private::RunError::internal("make_iter returned non-ref"));
    };
    Ok(heap.allocate_value(HeapData::Iter(Iter::Enumerate {
        inner: inner_id,
        count: start,
    }))?)
}

/// `zip(*iterables)`; stops at the shortest input.
pub(crate) fn builtin_zip(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let (positional, kwargs) = args.into_parts();
    if !kwargs.is_empty() {
        return Err(ExcType::type_error("zip() takes no keyword arguments"));
    }
    let mut inners = Vec::new();
    for iterable in positional {
        let inner = make_iter(heap, iterable, interns)?;
        let Value::Ref(inner_id) = inner else {
            return Err(crate::exception_private::RunError::internal("make_iter returned non-ref"));
        };
        inners.push(inner_id);
    }
    Ok(heap.allocate_value(HeapData::Iter(Iter::Zip { inners }))?)
}

/// `reversed(sequence)`: materializes the sequence back-to-front.
pub(crate) fn builtin_reversed(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let sequence = args.get_one_arg("reversed")?;
    let is_sequence = matches!(
        &sequence,
        Value::InternString(_)
    ) || matches!(
        &sequence,
        Value::Ref(id) if matches!(
            heap.get(*id),
            HeapData::List(_) | HeapData::Tuple(_) | HeapData::Str(_) | HeapData::Range(_)
        )
    );
    if !is_sequence {
        return Err(ExcType::type_error(format!(
            "argument to reversed() must be a sequence, not '{}'",
            sequence.type_name(heap, interns)
        )));
    }
    let mut items = collect_iter(heap, sequence, interns)?;
    items.reverse();
    Ok(heap.allocate_value(HeapData::Iter(Iter::Vec { items, index: 0 }))?)
}
