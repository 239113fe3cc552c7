//! Comparison, membership, and identity operators.

use std::cmp::Ordering;

use crate::{
    bytecode::op::CompareOpKind,
    exception_private::{ExcType, RunResult},
    heap::HeapData,
    program::Program,
    resource::ResourceTracker,
    types::{dict::dict_find, set::set_find},
    value::Value,
};

use super::VM;

impl<T: ResourceTracker> VM<T> {
    /// Evaluates a comparison operator.
    pub(super) fn compare_op(
        &mut self,
        kind: CompareOpKind,
        left: Value,
        right: Value,
        program: &Program,
    ) -> RunResult<Value> {
        let interns = &program.interns;
        let result = match kind {
            CompareOpKind::Eq => left.py_eq(&right, &self.heap, interns),
            CompareOpKind::Ne => !left.py_eq(&right, &self.heap, interns),
            CompareOpKind::Lt | CompareOpKind::Le | CompareOpKind::Gt | CompareOpKind::Ge => {
                let Some(ordering) = left.py_cmp(&right, &self.heap, interns) else {
                    return Err(ExcType::type_error(format!(
                        "'{}' not supported between instances of '{}' and '{}'",
                        compare_symbol(kind),
                        left.type_name(&self.heap, interns),
                        right.type_name(&self.heap, interns)
                    )));
                };
                match kind {
                    CompareOpKind::Lt => ordering == Ordering::Less,
                    CompareOpKind::Le => ordering != Ordering::Greater,
                    CompareOpKind::Gt => ordering == Ordering::Greater,
                    CompareOpKind::Ge => ordering != Ordering::Less,
                    _ => unreachable!(),
                }
            }
            CompareOpKind::Is => values_identical(&left, &right),
            CompareOpKind::IsNot => !values_identical(&left, &right),
            CompareOpKind::In => self.contains(&right, &left, program)?,
            CompareOpKind::NotIn => !self.contains(&right, &left, program)?,
        };
        Ok(Value::Bool(result))
    }

    /// Membership test: `needle in container`.
    pub(super) fn contains(&mut self, container: &Value, needle: &Value, program: &Program) -> RunResult<bool> {
        let interns = &program.interns;
        // Substring test for strings.
        if let (Some(haystack), Some(needle)) = (
            container.as_str(&self.heap, interns),
            needle.as_str(&self.heap, interns),
        ) {
            return Ok(haystack.contains(needle));
        }
        match container {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::List(items) | HeapData::Tuple(items) => {
                    Ok(items.iter().any(|item| item.py_eq(needle, &self.heap, interns)))
                }
                HeapData::Dict(_) => {
                    let hash = needle.py_hash(&self.heap, interns).map_err(|_| {
                        ExcType::unhashable(&needle.type_name(&self.heap, interns))
                    })?;
                    Ok(dict_find(&self.heap, *id, hash, needle, interns).is_some())
                }
                HeapData::Set(_) => {
                    let hash = needle.py_hash(&self.heap, interns).map_err(|_| {
                        ExcType::unhashable(&needle.type_name(&self.heap, interns))
                    })?;
                    Ok(set_find(&self.heap, *id, hash, needle, interns).is_some())
                }
                HeapData::Range(range) => match needle.as_index() {
                    Some(value) => Ok(range.contains(value)),
                    None => Ok(false),
                },
                HeapData::Bytes(bytes) => match needle.as_index() {
                    Some(byte) if (0..=255).contains(&byte) => Ok(bytes.contains(&(byte as u8))),
                    _ => match needle.as_bytes(&self.heap, interns) {
                        Some(sub) => Ok(contains_subslice(bytes, sub)),
                        None => Err(ExcType::type_error(format!(
                            "a bytes-like object is required, not '{}'",
                            needle.type_name(&self.heap, interns)
                        ))),
                    },
                },
                _ => Err(self.not_a_container(container, program)),
            },
            Value::InternBytes(bid) => {
                let bytes = interns.get_bytes(*bid);
                match needle.as_index() {
                    Some(byte) if (0..=255).contains(&byte) => Ok(bytes.contains(&(byte as u8))),
                    _ => match needle.as_bytes(&self.heap, interns) {
                        Some(sub) => Ok(contains_subslice(bytes, sub)),
                        None => Err(ExcType::type_error(format!(
                            "a bytes-like object is required, not '{}'",
                            needle.type_name(&self.heap, interns)
                        ))),
                    },
                }
            }
            _ => Err(self.not_a_container(container, program)),
        }
    }

    fn not_a_container(&self, container: &Value, program: &Program) -> crate::exception_private::RunError {
        ExcType::type_error(format!(
            "argument of type '{}' is not iterable",
            container.type_name(&self.heap, &program.interns)
        ))
    }
}

/// Identity: reference equality for heap values, value equality for
/// immediates of the same variant.
fn values_identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Ref(a), Value::Ref(b)) => a == b,
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::InternString(a), Value::InternString(b)) => a == b,
        (Value::InternBytes(a), Value::InternBytes(b)) => a == b,
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        (Value::DefFunction(a), Value::DefFunction(b)) => a == b,
        (Value::ExtFunction(a), Value::ExtFunction(b)) => a == b,
        (Value::RecordType(a), Value::RecordType(b)) => a == b,
        _ => false,
    }
}

/// Whether `needle` occurs as a contiguous subslice of `haystack`.
fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// The comparison's source symbol, for error messages.
fn compare_symbol(kind: CompareOpKind) -> &'static str {
    match kind {
        CompareOpKind::Lt => "<",
        CompareOpKind::Le => "<=",
        CompareOpKind::Gt => ">",
        CompareOpKind::Ge => ">=",
        _ => "==",
    }
}
