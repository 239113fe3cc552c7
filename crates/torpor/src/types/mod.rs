//! Runtime type surface: the [`Type`] enum plus the concrete container and
//! object implementations referenced from [`crate::heap::HeapData`].

pub(crate) mod bytes;
pub(crate) mod dict;
pub(crate) mod iter;
pub(crate) mod list;
pub(crate) mod long_int;
pub(crate) mod path;
pub(crate) mod range;
pub(crate) mod record;
pub(crate) mod set;
pub(crate) mod stat_result;
pub(crate) mod str;

pub(crate) use dict::Dict;
pub(crate) use iter::Iter;
pub(crate) use path::PyPath;
pub(crate) use range::Range;
pub(crate) use record::{FieldDef, Record, RecordTypeDef};
pub(crate) use set::Set;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    intern::{FunctionId, StringId},
    os::OsFunction,
    value::Value,
};

/// Built-in runtime types.
///
/// The `Display` form is the Python type name used in error messages and
/// `repr`; it is also what `type(x).__name__` would produce for the supported
/// subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum Type {
    #[strum(serialize = "NoneType")]
    NoneType,
    #[strum(serialize = "bool")]
    Bool,
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "str")]
    Str,
    #[strum(serialize = "bytes")]
    Bytes,
    #[strum(serialize = "tuple")]
    Tuple,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "dict")]
    Dict,
    #[strum(serialize = "set")]
    Set,
    #[strum(serialize = "range")]
    Range,
    #[strum(serialize = "PurePosixPath")]
    Path,
    #[strum(serialize = "StatResult")]
    StatResult,
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = "builtin_function_or_method")]
    BuiltinFunction,
    #[strum(serialize = "module")]
    Module,
    #[strum(serialize = "coroutine")]
    Coroutine,
    #[strum(serialize = "method")]
    BoundMethod,
    #[strum(serialize = "iterator")]
    Iterator,
    #[strum(serialize = "type")]
    Type,
}

/// A method bound to a receiver, produced by attribute access.
///
/// Bound methods are first-class heap values: `f = record.method` is valid and
/// `f(x)` later must behave exactly like `record.method(x)`. Calling one
/// prepends the receiver to the pending argument buffer, whatever shape that
/// buffer currently has (see [`crate::args::ArgValues::prepend`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BoundMethod {
    /// The receiver the method was looked up on.
    pub receiver: Value,
    /// What actually runs when the method is called.
    pub kind: MethodKind,
}

/// Dispatch target of a bound method.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) enum MethodKind {
    /// A compiled function from a record type's method table.
    Def(FunctionId),
    /// An interpreter-native method of a builtin type, e.g. `str.upper`.
    Native(Type, StringId),
    /// A filesystem method on `Path`; calling it suspends with an OS call.
    Os(OsFunction),
}
