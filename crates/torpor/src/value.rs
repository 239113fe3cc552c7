//! The runtime value representation and its Python-semantics operations.
//!
//! `Value` is a small tagged variant: scalars are stored inline, every
//! compound object lives in the registry and is referenced by id. Because the
//! registry never frees slots, `Value` is plain `Clone` — copying a ref copies
//! an id, aliasing the same object, which is exactly Python's semantics.

use std::{borrow::Cow, cmp::Ordering, fmt::Write};

use num_traits::ToPrimitive;

use crate::{
    builtins::Builtins,
    exception_private::{ExcType, RunResult},
    heap::{ExcInstance, Heap, HeapData, HeapId},
    intern::{BytesId, ExtFunctionId, FunctionId, Interns, RecordTypeId, StringId},
    py_hash::{hash_bigint, hash_bytes, hash_float, hash_int, hash_str, hash_tuple_parts},
    resource::ResourceTracker,
    types::{
        bytes::bytes_repr,
        dict::dict_eq,
        set::set_eq,
        str::{float_repr, string_repr},
        Type,
    },
};

/// Hash of `None`; any constant satisfies the hash laws.
const NONE_HASH: i64 = 0x2AD_F00D;

/// A runtime value.
///
/// NOTE: keep this small — it is copied constantly between stack slots.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) enum Value {
    /// An unassigned namespace slot; never user-visible.
    #[default]
    Undefined,
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// An interned string constant; content lives in the interns table.
    InternString(StringId),
    /// An interned bytes constant.
    InternBytes(BytesId),
    /// A builtin function, type constructor, exception type, or module.
    Builtin(Builtins),
    /// A compiled function from the program's function table.
    DefFunction(FunctionId),
    /// An external function implemented by the host.
    ExtFunction(ExtFunctionId),
    /// A record type constructor.
    RecordType(RecordTypeId),
    /// A compound object in the registry.
    Ref(HeapId),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl Value {
    /// The Python type name, for error messages and `repr`.
    pub fn type_name(&self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> Cow<'static, str> {
        match self {
            Self::Undefined => Cow::Borrowed("undefined"),
            Self::None => Cow::Borrowed("NoneType"),
            Self::Bool(_) => Cow::Borrowed("bool"),
            Self::Int(_) => Cow::Borrowed("int"),
            Self::Float(_) => Cow::Borrowed("float"),
            Self::InternString(_) => Cow::Borrowed("str"),
            Self::InternBytes(_) => Cow::Borrowed("bytes"),
            Self::Builtin(builtin) => builtin.type_name(),
            Self::DefFunction(_) => Cow::Borrowed("function"),
            Self::ExtFunction(_) => Cow::Borrowed("function"),
            Self::RecordType(_) => Cow::Borrowed("type"),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(_) => Cow::Borrowed("str"),
                HeapData::Bytes(_) => Cow::Borrowed("bytes"),
                HeapData::LongInt(_) => Cow::Borrowed("int"),
                HeapData::Tuple(_) => Cow::Borrowed("tuple"),
                HeapData::List(_) => Cow::Borrowed("list"),
                HeapData::Dict(_) => Cow::Borrowed("dict"),
                HeapData::Set(_) => Cow::Borrowed("set"),
                HeapData::Range(_) => Cow::Borrowed("range"),
                HeapData::Path(_) => Cow::Borrowed("PurePosixPath"),
                HeapData::Stat(_) => Cow::Borrowed("StatResult"),
                HeapData::Record(record) => {
                    Cow::Owned(interns.get_str(interns.record_type(record.type_id).name).to_owned())
                }
                HeapData::Exception(exc) => Cow::Borrowed(exc.exc_type.into()),
                HeapData::BoundMethod(_) => Cow::Borrowed("method"),
                HeapData::Coroutine(_) => Cow::Borrowed("coroutine"),
                HeapData::Gather(_) => Cow::Borrowed("_GatheringFuture"),
                HeapData::Iter(_) => Cow::Borrowed("iterator"),
            },
        }
    }

    /// The builtin type of this value, when it has one.
    ///
    /// Records, exceptions, and gather futures have no `Type` variant; they
    /// return `None` and are special-cased where it matters.
    pub fn builtin_type(&self, heap: &Heap<impl ResourceTracker>) -> Option<Type> {
        match self {
            Self::None => Some(Type::NoneType),
            Self::Bool(_) => Some(Type::Bool),
            Self::Int(_) => Some(Type::Int),
            Self::Float(_) => Some(Type::Float),
            Self::InternString(_) => Some(Type::Str),
            Self::InternBytes(_) => Some(Type::Bytes),
            Self::DefFunction(_) | Self::ExtFunction(_) => Some(Type::Function),
            Self::Builtin(builtin) => Some(builtin.value_type()),
            Self::RecordType(_) => None,
            Self::Undefined => None,
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(_) => Some(Type::Str),
                HeapData::Bytes(_) => Some(Type::Bytes),
                HeapData::LongInt(_) => Some(Type::Int),
                HeapData::Tuple(_) => Some(Type::Tuple),
                HeapData::List(_) => Some(Type::List),
                HeapData::Dict(_) => Some(Type::Dict),
                HeapData::Set(_) => Some(Type::Set),
                HeapData::Range(_) => Some(Type::Range),
                HeapData::Path(_) => Some(Type::Path),
                HeapData::Stat(_) => Some(Type::StatResult),
                HeapData::BoundMethod(_) => Some(Type::BoundMethod),
                HeapData::Coroutine(_) => Some(Type::Coroutine),
                HeapData::Iter(_) => Some(Type::Iterator),
                HeapData::Record(_) | HeapData::Exception(_) | HeapData::Gather(_) => None,
            },
        }
    }

    /// Truthiness: `False`, `None`, numeric zero, and empty containers are
    /// false; user records are always truthy.
    pub fn py_bool(&self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> bool {
        match self {
            Self::Undefined => false,
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::InternString(id) => !interns.get_str(*id).is_empty(),
            Self::InternBytes(id) => !interns.get_bytes(*id).is_empty(),
            Self::Builtin(_) | Self::DefFunction(_) | Self::ExtFunction(_) | Self::RecordType(_) => true,
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => !s.is_empty(),
                HeapData::Bytes(b) => !b.is_empty(),
                HeapData::LongInt(i) => !num_traits::Zero::is_zero(i),
                HeapData::Tuple(items) | HeapData::List(items) => !items.is_empty(),
                HeapData::Dict(dict) => !dict.is_empty(),
                HeapData::Set(set) => !set.is_empty(),
                HeapData::Range(range) => range.len() > 0,
                _ => true,
            },
        }
    }

    /// Length, for values that have one.
    pub fn py_len(&self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> Option<usize> {
        match self {
            // Count chars, not bytes, to match Python semantics.
            Self::InternString(id) => Some(interns.get_str(*id).chars().count()),
            Self::InternBytes(id) => Some(interns.get_bytes(*id).len()),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Some(s.chars().count()),
                HeapData::Bytes(b) => Some(b.len()),
                HeapData::Tuple(items) | HeapData::List(items) => Some(items.len()),
                HeapData::Dict(dict) => Some(dict.len()),
                HeapData::Set(set) => Some(set.len()),
                HeapData::Range(range) => Some(range.len()),
                HeapData::Stat(_) => Some(10),
                _ => None,
            },
            _ => None,
        }
    }

    /// Reads string content, for values that are strings.
    pub fn as_str<'a>(&'a self, heap: &'a Heap<impl ResourceTracker>, interns: &'a Interns) -> Option<&'a str> {
        match self {
            Self::InternString(id) => Some(interns.get_str(*id)),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Reads bytes content, for values that are bytes.
    pub fn as_bytes<'a>(&'a self, heap: &'a Heap<impl ResourceTracker>, interns: &'a Interns) -> Option<&'a [u8]> {
        match self {
            Self::InternBytes(id) => Some(interns.get_bytes(*id)),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Bytes(b) => Some(b.as_slice()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Reads an index-shaped integer (`int` or `bool`, not `float`).
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Reads a float-shaped number (`int`, `bool`, or `float`).
    pub fn as_number(&self, heap: &Heap<impl ResourceTracker>) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::LongInt(i) => i.to_f64(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Structural equality with Python semantics.
    ///
    /// NaN compares unequal to itself; `1 == 1.0 == True`; lists and records
    /// compare elementwise. Deeply nested structures fall back to `false` at
    /// the data-depth ceiling instead of overflowing the stack.
    pub fn py_eq(&self, other: &Self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> bool {
        if let (Self::Ref(a), Self::Ref(b)) = (self, other)
            && a == b
        {
            return true;
        }
        match (self, other) {
            (Self::Undefined, _) | (_, Self::Undefined) => false,
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bool(a), Self::Int(b)) | (Self::Int(b), Self::Bool(a)) => i64::from(*a) == *b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::Bool(a), Self::Float(b)) | (Self::Float(b), Self::Bool(a)) => f64::from(u8::from(*a)) == *b,
            (Self::InternString(a), Self::InternString(b)) => {
                a == b || interns.get_str(*a) == interns.get_str(*b)
            }
            (Self::InternBytes(a), Self::InternBytes(b)) => {
                a == b || interns.get_bytes(*a) == interns.get_bytes(*b)
            }
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::DefFunction(a), Self::DefFunction(b)) => a == b,
            (Self::ExtFunction(a), Self::ExtFunction(b)) => a == b,
            (Self::RecordType(a), Self::RecordType(b)) => a == b,
            (value, Self::Ref(id)) | (Self::Ref(id), value) if !matches!(value, Self::Ref(_)) => {
                ref_eq_immediate(*id, value, heap, interns)
            }
            (Self::Ref(a), Self::Ref(b)) => {
                if !heap.data_depth_enter() {
                    return false;
                }
                let result = ref_eq_ref(*a, *b, heap, interns);
                heap.data_depth_exit();
                result
            }
            _ => false,
        }
    }

    /// Ordering for `<`/`<=`/`>`/`>=`; `None` means unorderable.
    pub fn py_cmp(&self, other: &Self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), _) => Self::Int(i64::from(*a)).py_cmp(other, heap, interns),
            (_, Self::Bool(b)) => self.py_cmp(&Self::Int(i64::from(*b)), heap, interns),
            (Self::Int(a), Self::Int(b)) => a.partial_cmp(b),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            _ => {
                if let (Some(a), Some(b)) = (self.as_str(heap, interns), other.as_str(heap, interns)) {
                    return a.partial_cmp(b);
                }
                if let (Some(a), Some(b)) = (self.as_bytes(heap, interns), other.as_bytes(heap, interns)) {
                    return a.partial_cmp(b);
                }
                if let Some(ordering) = bigint_cmp(self, other, heap) {
                    return Some(ordering);
                }
                let (Self::Ref(a), Self::Ref(b)) = (self, other) else {
                    return None;
                };
                match (heap.get(*a), heap.get(*b)) {
                    (HeapData::List(left), HeapData::List(right))
                    | (HeapData::Tuple(left), HeapData::Tuple(right)) => {
                        if !heap.data_depth_enter() {
                            return None;
                        }
                        let result = seq_cmp(left, right, heap, interns);
                        heap.data_depth_exit();
                        result
                    }
                    (HeapData::Path(left), HeapData::Path(right)) => left.as_str().partial_cmp(right.as_str()),
                    _ => None,
                }
            }
        }
    }

    /// Python hash; `Err` for unhashable values.
    ///
    /// Guaranteed consistent with [`Value::py_eq`] on hashable values.
    pub fn py_hash(&self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<i64> {
        match self {
            Self::Undefined => Err(ExcType::unhashable("undefined")),
            Self::None => Ok(NONE_HASH),
            Self::Bool(b) => Ok(hash_int(i64::from(*b))),
            Self::Int(i) => Ok(hash_int(*i)),
            Self::Float(f) => Ok(hash_float(*f)),
            Self::InternString(id) => Ok(hash_str(interns.get_str(*id))),
            Self::InternBytes(id) => Ok(hash_bytes(interns.get_bytes(*id))),
            Self::Builtin(builtin) => Ok(builtin.stable_hash()),
            Self::DefFunction(id) => Ok(hash_tuple_parts([1, id.index() as i64].into_iter())),
            Self::ExtFunction(id) => Ok(hash_tuple_parts([2, id.index() as i64].into_iter())),
            Self::RecordType(id) => Ok(hash_tuple_parts([3, id.index() as i64].into_iter())),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Ok(hash_str(s)),
                HeapData::Bytes(b) => Ok(hash_bytes(b)),
                HeapData::LongInt(i) => Ok(hash_bigint(i)),
                HeapData::Tuple(items) => {
                    let items = items.clone();
                    let mut parts = Vec::with_capacity(items.len());
                    for item in &items {
                        parts.push(item.py_hash(heap, interns)?);
                    }
                    Ok(hash_tuple_parts(parts.into_iter()))
                }
                HeapData::Path(path) => Ok(hash_str(path.as_str())),
                HeapData::Stat(stat) => {
                    let mut parts = Vec::with_capacity(10);
                    for value in stat.values() {
                        parts.push(value.py_hash(heap, interns)?);
                    }
                    Ok(hash_tuple_parts(parts.into_iter()))
                }
                HeapData::Range(range) => {
                    // Normalized like equality: empty ranges all hash alike.
                    let len = range.len() as i64;
                    let first = if len > 0 { range.start } else { 0 };
                    let step = if len > 1 { range.step } else { 1 };
                    Ok(hash_tuple_parts([len, first, step].into_iter()))
                }
                HeapData::Record(record) => {
                    let def = interns.record_type(record.type_id);
                    let type_name = interns.get_str(def.name);
                    if !def.frozen {
                        return Err(ExcType::unhashable(type_name));
                    }
                    let fields = record.fields.clone();
                    let mut parts = Vec::with_capacity(fields.len() + 1);
                    parts.push(hash_str(type_name));
                    for field in &fields {
                        parts.push(field.py_hash(heap, interns)?);
                    }
                    Ok(hash_tuple_parts(parts.into_iter()))
                }
                // Identity hash, like CPython's default object hash.
                HeapData::Exception(_)
                | HeapData::BoundMethod(_)
                | HeapData::Coroutine(_)
                | HeapData::Gather(_)
                | HeapData::Iter(_) => Ok(hash_int(id.raw() as i64)),
                HeapData::List(_) => Err(ExcType::unhashable("list")),
                HeapData::Dict(_) => Err(ExcType::unhashable("dict")),
                HeapData::Set(_) => Err(ExcType::unhashable("set")),
            },
        }
    }

    /// Python `repr()`.
    pub fn py_repr(&self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> String {
        let mut out = String::new();
        let mut seen = Vec::new();
        self.repr_into(&mut out, heap, interns, &mut seen);
        out
    }

    /// Python `str()`: string content for strings, message form for
    /// exceptions, the path itself for paths, `repr` otherwise.
    pub fn py_str(&self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> String {
        if let Some(s) = self.as_str(heap, interns) {
            return s.to_owned();
        }
        if let Self::Ref(id) = self {
            match heap.get(*id) {
                HeapData::Path(path) => return path.as_str().to_owned(),
                HeapData::Exception(exc) => return exception_str(exc, heap, interns),
                _ => {}
            }
        }
        self.py_repr(heap, interns)
    }

    fn repr_into(
        &self,
        out: &mut String,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
        seen: &mut Vec<HeapId>,
    ) {
        match self {
            Self::Undefined => out.push_str("<undefined>"),
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => out.push_str(&float_repr(*f)),
            Self::InternString(id) => out.push_str(&string_repr(interns.get_str(*id))),
            Self::InternBytes(id) => out.push_str(&bytes_repr(interns.get_bytes(*id))),
            Self::Builtin(builtin) => builtin.repr_into(out),
            Self::DefFunction(id) => {
                let name = interns.get_str(interns.function(*id).name);
                let _ = write!(out, "<function {name} at 0x{:012x}>", fake_address(4, id.index()));
            }
            Self::ExtFunction(id) => {
                let name = interns.external_function_name(*id);
                let _ = write!(out, "<function {name} at 0x{:012x}>", fake_address(5, id.index()));
            }
            Self::RecordType(id) => {
                let name = interns.get_str(interns.record_type(*id).name);
                let _ = write!(out, "<class '{name}'>");
            }
            Self::Ref(id) => self.ref_repr_into(*id, out, heap, interns, seen),
        }
    }

    fn ref_repr_into(
        &self,
        id: HeapId,
        out: &mut String,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
        seen: &mut Vec<HeapId>,
    ) {
        if seen.contains(&id) {
            out.push_str(match heap.get(id) {
                HeapData::List(_) => "[...]",
                HeapData::Dict(_) => "{...}",
                HeapData::Set(_) => "{...}",
                _ => "(...)",
            });
            return;
        }
        match heap.get(id) {
            HeapData::Str(s) => out.push_str(&string_repr(s)),
            HeapData::Bytes(b) => out.push_str(&bytes_repr(b)),
            HeapData::LongInt(i) => {
                let _ = write!(out, "{i}");
            }
            HeapData::Tuple(items) => {
                seen.push(id);
                out.push('(');
                for (position, item) in items.iter().enumerate() {
                    if position > 0 {
                        out.push_str(", ");
                    }
                    item.repr_into(out, heap, interns, seen);
                }
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
                seen.pop();
            }
            HeapData::List(items) => {
                seen.push(id);
                out.push('[');
                for (position, item) in items.iter().enumerate() {
                    if position > 0 {
                        out.push_str(", ");
                    }
                    item.repr_into(out, heap, interns, seen);
                }
                out.push(']');
                seen.pop();
            }
            HeapData::Dict(dict) => {
                if dict.is_empty() {
                    out.push_str("{}");
                    return;
                }
                seen.push(id);
                out.push('{');
                for (position, entry) in dict.entries().iter().enumerate() {
                    if position > 0 {
                        out.push_str(", ");
                    }
                    entry.key.repr_into(out, heap, interns, seen);
                    out.push_str(": ");
                    entry.value.repr_into(out, heap, interns, seen);
                }
                out.push('}');
                seen.pop();
            }
            HeapData::Set(set) => {
                if set.is_empty() {
                    out.push_str("set()");
                    return;
                }
                seen.push(id);
                out.push('{');
                for (position, entry) in set.entries().iter().enumerate() {
                    if position > 0 {
                        out.push_str(", ");
                    }
                    entry.value.repr_into(out, heap, interns, seen);
                }
                out.push('}');
                seen.pop();
            }
            HeapData::Range(range) => out.push_str(&range.repr()),
            HeapData::Path(path) => out.push_str(&path.repr()),
            HeapData::Stat(stat) => out.push_str(&stat.repr()),
            HeapData::Record(record) => {
                let def = interns.record_type(record.type_id);
                seen.push(id);
                out.push_str(interns.get_str(def.name));
                out.push('(');
                for (position, (field, value)) in def.fields.iter().zip(&record.fields).enumerate() {
                    if position > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(interns.get_str(field.name));
                    out.push('=');
                    value.repr_into(out, heap, interns, seen);
                }
                out.push(')');
                seen.pop();
            }
            HeapData::Exception(exc) => {
                out.push_str(exc.exc_type.into());
                out.push('(');
                for (position, arg) in exc.args.iter().enumerate() {
                    if position > 0 {
                        out.push_str(", ");
                    }
                    arg.repr_into(out, heap, interns, seen);
                }
                out.push(')');
            }
            HeapData::BoundMethod(method) => {
                let type_name = method.receiver.type_name(heap, interns);
                let _ = write!(out, "<bound method of '{type_name}' object>");
            }
            HeapData::Coroutine(coroutine) => {
                let name = interns.get_str(interns.function(coroutine.func_id).name);
                let _ = write!(out, "<coroutine object {name} at 0x{:012x}>", fake_address(6, id.raw() as usize));
            }
            HeapData::Gather(_) => out.push_str("<_GatheringFuture pending>"),
            HeapData::Iter(_) => {
                let _ = write!(out, "<iterator object at 0x{:012x}>", fake_address(7, id.raw() as usize));
            }
        }
    }
}

/// `str(exc)`: empty for no args, the lone argument's `str` for one, the
/// args tuple repr otherwise.
pub(crate) fn exception_str(exc: &ExcInstance, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> String {
    match exc.args.len() {
        0 => String::new(),
        1 => exc.args[0].py_str(heap, interns),
        _ => {
            let mut out = String::from("(");
            for (position, arg) in exc.args.iter().enumerate() {
                if position > 0 {
                    out.push_str(", ");
                }
                out.push_str(&arg.py_repr(heap, interns));
            }
            out.push(')');
            out
        }
    }
}

/// Deterministic fake addresses for function/object reprs.
fn fake_address(space: usize, index: usize) -> usize {
    0x7f6e_2000_0000 + space * 0x10_0000 + index * 0x40
}

/// Equality of a heap value against an immediate.
fn ref_eq_immediate(id: HeapId, value: &Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> bool {
    match (heap.get(id), value) {
        (HeapData::Str(s), Value::InternString(sid)) => s == interns.get_str(*sid),
        (HeapData::Bytes(b), Value::InternBytes(bid)) => b == interns.get_bytes(*bid),
        (HeapData::LongInt(big), Value::Int(_) | Value::Bool(_) | Value::Float(_)) => match value {
            // A LongInt never fits i64, so int/bool can't equal it.
            Value::Int(_) | Value::Bool(_) => false,
            Value::Float(f) => big.to_f64().is_some_and(|bf| bf == *f),
            _ => false,
        },
        _ => false,
    }
}

/// Equality of two heap values.
fn ref_eq_ref(a: HeapId, b: HeapId, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> bool {
    match (heap.get(a), heap.get(b)) {
        (HeapData::Str(x), HeapData::Str(y)) => x == y,
        (HeapData::Bytes(x), HeapData::Bytes(y)) => x == y,
        (HeapData::LongInt(x), HeapData::LongInt(y)) => x == y,
        (HeapData::Tuple(x), HeapData::Tuple(y)) | (HeapData::List(x), HeapData::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| l.py_eq(r, heap, interns))
        }
        (HeapData::Dict(_), HeapData::Dict(_)) => dict_eq(heap, a, b, interns),
        (HeapData::Set(_), HeapData::Set(_)) => set_eq(heap, a, b, interns),
        (HeapData::Range(x), HeapData::Range(y)) => {
            // Ranges compare as the sequences they denote.
            x.len() == y.len()
                && (x.len() == 0 || (x.start == y.start && (x.len() == 1 || x.step == y.step)))
        }
        (HeapData::Path(x), HeapData::Path(y)) => x == y,
        (HeapData::Stat(x), HeapData::Stat(y)) => x == y,
        (HeapData::Record(x), HeapData::Record(y)) => {
            x.type_id == y.type_id
                && x.fields.len() == y.fields.len()
                && x.fields.iter().zip(&y.fields).all(|(l, r)| l.py_eq(r, heap, interns))
        }
        // Exceptions, methods, coroutines compare by identity, which was
        // already handled by the id fast path.
        _ => false,
    }
}

/// Lexicographic sequence comparison.
fn seq_cmp(
    left: &[Value],
    right: &[Value],
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> Option<Ordering> {
    for (l, r) in left.iter().zip(right) {
        if l.py_eq(r, heap, interns) {
            continue;
        }
        return l.py_cmp(r, heap, interns);
    }
    Some(left.len().cmp(&right.len()))
}

/// Comparison involving at least one bignum.
fn bigint_cmp(a: &Value, b: &Value, heap: &Heap<impl ResourceTracker>) -> Option<Ordering> {
    use crate::types::long_int::value_to_bigint;
    let a_is_big = matches!(a, Value::Ref(id) if matches!(heap.get(*id), HeapData::LongInt(_)));
    let b_is_big = matches!(b, Value::Ref(id) if matches!(heap.get(*id), HeapData::LongInt(_)));
    if !a_is_big && !b_is_big {
        return None;
    }
    match (value_to_bigint(a, heap), value_to_bigint(b, heap)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => {
            // Bignum vs float: compare approximately through f64.
            let x = a.as_number(heap)?;
            let y = b.as_number(heap)?;
            x.partial_cmp(&y)
        }
    }
}
