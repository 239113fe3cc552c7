//! The host-boundary value type.
//!
//! [`Object`] is the public, deeply-owned form of a Python value: what hosts
//! receive in snapshots and completion results, and what they pass back when
//! resuming. Conversion is always a deep copy — mutations the host performs on
//! its `Object`s never affect interpreter state, and vice versa.

use std::fmt;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    exception_private::ExcType,
    heap::{ExcInstance, Heap, HeapData, HeapId},
    intern::Interns,
    os::StatResult,
    resource::{ResourceError, ResourceTracker},
    types::{dict::dict_insert, set::set_insert, Dict, PyPath, Set},
    value::Value,
};

/// Ordered key/value pairs of a dict crossing the boundary.
///
/// Insertion order is preserved both ways; hosts usually build these via
/// `.into()` from a `Vec` of pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DictPairs(pub Vec<(Object, Object)>);

impl From<Vec<(Object, Object)>> for DictPairs {
    fn from(pairs: Vec<(Object, Object)>) -> Self {
        Self(pairs)
    }
}

/// A Python value that can be passed to or returned from the interpreter.
///
/// Owns all its data and can be freely cloned, stored, or serialized; no heap
/// access is needed to inspect it. `Repr` is output-only: it stands in for
/// values with no boundary form (functions, coroutines, iterators) and is
/// rejected as an input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    /// Python's `None`.
    None,
    /// `True` / `False`.
    Bool(bool),
    /// An integer fitting 64 bits.
    Int(i64),
    /// An integer beyond 64 bits.
    BigInt(BigInt),
    /// A float.
    Float(f64),
    /// A string.
    String(String),
    /// A bytes object.
    Bytes(Vec<u8>),
    /// A list.
    List(Vec<Object>),
    /// A tuple.
    Tuple(Vec<Object>),
    /// An insertion-ordered dict.
    Dict(DictPairs),
    /// A set, in insertion order.
    Set(Vec<Object>),
    /// A pure POSIX path.
    Path(String),
    /// A stat result tuple.
    StatResult(StatResult),
    /// An exception instance (input: raise inside the interpreter; output:
    /// a value that happens to be an exception object).
    Exception {
        /// The exception type.
        exc_type: ExcType,
        /// Optional message argument.
        arg: Option<String>,
    },
    /// A record instance (output-only; record types are per-program, so
    /// instances cannot be passed back in).
    Record {
        /// The record type's name.
        name: String,
        /// Declared fields in declaration order.
        fields: Vec<(String, Object)>,
        /// Whether the record type is frozen.
        frozen: bool,
    },
    /// Output-only fallback carrying the `repr()` of the original value.
    Repr(String),
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Path(p) => f.write_str(p),
            Self::Repr(r) => f.write_str(r),
            other => write!(f, "{other:?}"),
        }
    }
}

/// An input `Object` could not be converted into interpreter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidInputError {
    /// `Object::Repr` and `Object::Record` are output-only.
    OutputOnly,
    /// A set or dict input contained an unhashable element or key.
    Unhashable,
    /// A resource limit tripped while allocating the converted value.
    Resource(ResourceError),
}

impl fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputOnly => f.write_str("output-only value cannot be used as an input"),
            Self::Unhashable => f.write_str("unhashable element in set or dict input"),
            Self::Resource(_) => f.write_str("resource limit exceeded while converting input"),
        }
    }
}

impl std::error::Error for InvalidInputError {}

impl From<ResourceError> for InvalidInputError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}

impl Object {
    /// Converts an interpreter value to its deep host form.
    pub(crate) fn from_value(value: &Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> Self {
        let mut seen = Vec::new();
        Self::from_value_inner(value, heap, interns, &mut seen)
    }

    fn from_value_inner(
        value: &Value,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
        seen: &mut Vec<HeapId>,
    ) -> Self {
        match value {
            Value::Undefined => Self::Repr("<undefined>".to_owned()),
            Value::None => Self::None,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(*f),
            Value::InternString(id) => Self::String(interns.get_str(*id).to_owned()),
            Value::InternBytes(id) => Self::Bytes(interns.get_bytes(*id).to_owned()),
            Value::Builtin(_) | Value::DefFunction(_) | Value::ExtFunction(_) | Value::RecordType(_) => {
                Self::Repr(value.py_repr(heap, interns))
            }
            Value::Ref(id) => {
                if seen.contains(id) {
                    return Self::Repr(value.py_repr(heap, interns));
                }
                match heap.get(*id) {
                    HeapData::Str(s) => Self::String(s.clone()),
                    HeapData::Bytes(b) => Self::Bytes(b.clone()),
                    HeapData::LongInt(big) => Self::BigInt(big.clone()),
                    HeapData::Tuple(items) => {
                        seen.push(*id);
                        let converted = items
                            .iter()
                            .map(|item| Self::from_value_inner(item, heap, interns, seen))
                            .collect();
                        seen.pop();
                        Self::Tuple(converted)
                    }
                    HeapData::List(items) => {
                        seen.push(*id);
                        let converted = items
                            .iter()
                            .map(|item| Self::from_value_inner(item, heap, interns, seen))
                            .collect();
                        seen.pop();
                        Self::List(converted)
                    }
                    HeapData::Dict(dict) => {
                        seen.push(*id);
                        let converted = dict
                            .entries()
                            .iter()
                            .map(|entry| {
                                (
                                    Self::from_value_inner(&entry.key, heap, interns, seen),
                                    Self::from_value_inner(&entry.value, heap, interns, seen),
                                )
                            })
                            .collect();
                        seen.pop();
                        Self::Dict(DictPairs(converted))
                    }
                    HeapData::Set(set) => {
                        seen.push(*id);
                        let converted = set
                            .entries()
                            .iter()
                            .map(|entry| Self::from_value_inner(&entry.value, heap, interns, seen))
                            .collect();
                        seen.pop();
                        Self::Set(converted)
                    }
                    HeapData::Path(path) => Self::Path(path.as_str().to_owned()),
                    HeapData::Stat(stat) => Self::StatResult(*stat),
                    HeapData::Exception(exc) => Self::Exception {
                        exc_type: exc.exc_type,
                        arg: match exc.args.len() {
                            0 => None,
                            _ => Some(crate::value::exception_str(exc, heap, interns)),
                        },
                    },
                    HeapData::Record(record) => {
                        let def = interns.record_type(record.type_id);
                        seen.push(*id);
                        let fields = def
                            .fields
                            .iter()
                            .zip(&record.fields)
                            .map(|(field, field_value)| {
                                (
                                    interns.get_str(field.name).to_owned(),
                                    Self::from_value_inner(field_value, heap, interns, seen),
                                )
                            })
                            .collect();
                        seen.pop();
                        Self::Record {
                            name: interns.get_str(def.name).to_owned(),
                            fields,
                            frozen: def.frozen,
                        }
                    }
                    HeapData::Range(_)
                    | HeapData::BoundMethod(_)
                    | HeapData::Coroutine(_)
                    | HeapData::Gather(_)
                    | HeapData::Iter(_) => Self::Repr(value.py_repr(heap, interns)),
                }
            }
        }
    }

    /// Converts this host object into an interpreter value, allocating
    /// compounds on the heap.
    pub(crate) fn to_value(
        self,
        heap: &mut Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> Result<Value, InvalidInputError> {
        match self {
            Self::None => Ok(Value::None),
            Self::Bool(b) => Ok(Value::Bool(b)),
            Self::Int(i) => Ok(Value::Int(i)),
            Self::BigInt(big) => {
                use num_traits::ToPrimitive;
                match big.to_i64() {
                    Some(small) => Ok(Value::Int(small)),
                    None => Ok(heap.allocate_value(HeapData::LongInt(big))?),
                }
            }
            Self::Float(f) => Ok(Value::Float(f)),
            Self::String(s) => Ok(heap.allocate_value(HeapData::Str(s))?),
            Self::Bytes(b) => Ok(heap.allocate_value(HeapData::Bytes(b))?),
            Self::List(items) => {
                let values = items
                    .into_iter()
                    .map(|item| item.to_value(heap, interns))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(heap.allocate_value(HeapData::List(values))?)
            }
            Self::Tuple(items) => {
                let values = items
                    .into_iter()
                    .map(|item| item.to_value(heap, interns))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(heap.allocate_value(HeapData::Tuple(values))?)
            }
            Self::Dict(pairs) => {
                let dict_value = heap.allocate_value(HeapData::Dict(Dict::new()))?;
                let Value::Ref(dict_id) = dict_value else { unreachable!() };
                for (key, value) in pairs.0 {
                    let key = key.to_value(heap, interns)?;
                    let value = value.to_value(heap, interns)?;
                    dict_insert(heap, dict_id, key, value, interns).map_err(|_| InvalidInputError::Unhashable)?;
                }
                Ok(dict_value)
            }
            Self::Set(items) => {
                let set_value = heap.allocate_value(HeapData::Set(Set::new()))?;
                let Value::Ref(set_id) = set_value else { unreachable!() };
                for item in items {
                    let item = item.to_value(heap, interns)?;
                    set_insert(heap, set_id, item, interns).map_err(|_| InvalidInputError::Unhashable)?;
                }
                Ok(set_value)
            }
            Self::Path(path) => Ok(heap.allocate_value(HeapData::Path(PyPath::new(&path)))?),
            Self::StatResult(stat) => Ok(heap.allocate_value(HeapData::Stat(stat))?),
            Self::Exception { exc_type, arg } => {
                let args = match arg {
                    Some(message) => vec![heap.allocate_value(HeapData::Str(message))?],
                    None => Vec::new(),
                };
                Ok(heap.allocate_value(HeapData::Exception(ExcInstance { exc_type, args }))?)
            }
            Self::Record { .. } | Self::Repr(_) => Err(InvalidInputError::OutputOnly),
        }
    }
}
