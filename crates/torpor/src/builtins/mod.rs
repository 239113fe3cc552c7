//! The builtin surface: functions, type constructors, exception types, and
//! the two curated modules (`os`, `asyncio`).
//!
//! Builtins are immediate values — no heap allocation — resolved by name when
//! a global slot is unassigned, which is what makes shadowing work: an
//! assignment to `int` fills the slot and wins every later lookup in that
//! scope.

mod convert;
mod iter_fns;
mod min_max;
mod print;
mod simple;

use std::borrow::Cow;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use convert::call_type;

use crate::{
    args::ArgValues,
    asyncio::GatherFuture,
    exception_private::{ExcType, RunResult},
    heap::{ExcInstance, Heap, HeapData},
    intern::Interns,
    io::PrintWriter,
    py_hash::hash_tuple_parts,
    resource::ResourceTracker,
    types::Type,
    value::Value,
};

/// A builtin callable or module, stored inline in `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) enum Builtins {
    /// A builtin function like `len` or `sorted`.
    Function(BuiltinFunction),
    /// A type constructor like `int` or `list`.
    Type(Type),
    /// An exception type constructor like `ValueError`.
    ExcType(ExcType),
    /// One of the curated modules.
    Module(ModuleKind),
}

/// The curated module shims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub(crate) enum ModuleKind {
    #[strum(serialize = "os")]
    Os,
    #[strum(serialize = "asyncio")]
    Asyncio,
}

/// Interpreter-native builtin functions.
///
/// `sorted`, `map`, and `filter` may need to call back into compiled code, so
/// the VM intercepts them in call dispatch; everything else runs through
/// [`Builtins::call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum BuiltinFunction {
    Len,
    Repr,
    Print,
    Abs,
    Hash,
    Isinstance,
    Min,
    Max,
    Sum,
    Any,
    All,
    Enumerate,
    Zip,
    Map,
    Filter,
    Reversed,
    Sorted,
    /// `os.getenv`; suspends, so the VM handles the actual call.
    Getenv,
    /// `asyncio.gather`.
    Gather,
    /// `StatResult.file_stat`.
    #[strum(serialize = "file_stat")]
    FileStat,
    /// `StatResult.dir_stat`.
    #[strum(serialize = "dir_stat")]
    DirStat,
}

impl Builtins {
    /// Resolves a builtin by its Python name.
    ///
    /// This is the fallback for global loads whose namespace slot is
    /// unassigned, and defines the complete ambient name surface.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if let Ok(exc_type) = ExcType::from_str(name) {
            return Some(Self::ExcType(exc_type));
        }
        let by_type = match name {
            "bool" => Some(Type::Bool),
            "int" => Some(Type::Int),
            "float" => Some(Type::Float),
            "str" => Some(Type::Str),
            "bytes" => Some(Type::Bytes),
            "tuple" => Some(Type::Tuple),
            "list" => Some(Type::List),
            "dict" => Some(Type::Dict),
            "set" => Some(Type::Set),
            "range" => Some(Type::Range),
            "Path" => Some(Type::Path),
            "StatResult" => Some(Type::StatResult),
            _ => None,
        };
        if let Some(t) = by_type {
            return Some(Self::Type(t));
        }
        if let Ok(module) = ModuleKind::from_str(name) {
            return Some(Self::Module(module));
        }
        match name {
            // `file_stat`/`dir_stat` are reachable only via the StatResult
            // class; gather only via the asyncio module.
            "gather" | "file_stat" | "dir_stat" | "getenv" => None,
            _ => BuiltinFunction::from_str(name).ok().map(Self::Function),
        }
    }

    /// The Python type name of this value for error messages.
    #[must_use]
    pub fn type_name(&self) -> Cow<'static, str> {
        match self {
            Self::Function(_) => Cow::Borrowed("builtin_function_or_method"),
            Self::Type(_) | Self::ExcType(_) => Cow::Borrowed("type"),
            Self::Module(_) => Cow::Borrowed("module"),
        }
    }

    /// The `Type` of this value.
    #[must_use]
    pub fn value_type(&self) -> Type {
        match self {
            Self::Function(_) => Type::BuiltinFunction,
            Self::Type(_) | Self::ExcType(_) => Type::Type,
            Self::Module(_) => Type::Module,
        }
    }

    /// A hash stable across runs, mixing the discriminants.
    #[must_use]
    pub fn stable_hash(&self) -> i64 {
        let (space, index) = match self {
            Self::Function(f) => (10, *f as i64),
            Self::Type(t) => (11, *t as i64),
            Self::ExcType(e) => (12, *e as i64),
            Self::Module(m) => (13, *m as i64),
        };
        hash_tuple_parts([space, index].into_iter())
    }

    /// Writes the `repr()` of this value.
    pub fn repr_into(&self, out: &mut String) {
        use std::fmt::Write;
        match self {
            // asyncio.gather is a plain function at the Python level.
            Self::Function(BuiltinFunction::Gather) => {
                let _ = write!(out, "<function gather at 0x{:012x}>", 0x7f6e_2f00_0a40_u64);
            }
            Self::Function(f) => {
                let _ = write!(out, "<built-in function {f}>");
            }
            Self::Type(t) => {
                let _ = write!(out, "<class '{t}'>");
            }
            Self::ExcType(e) => {
                let _ = write!(out, "<class '{e}'>");
            }
            Self::Module(m) => {
                let _ = write!(out, "<module '{m}'>");
            }
        }
    }

    /// Calls this builtin.
    ///
    /// The VM has already intercepted the builtins that can suspend or call
    /// back into compiled code.
    pub fn call(
        self,
        heap: &mut Heap<impl ResourceTracker>,
        args: ArgValues,
        interns: &Interns,
        print: &mut impl PrintWriter,
    ) -> RunResult<Value> {
        match self {
            Self::Function(f) => f.call(heap, args, interns, print),
            Self::Type(t) => call_type(t, heap, args, interns),
            Self::ExcType(exc_type) => construct_exception(exc_type, heap, args),
            Self::Module(_) => Err(ExcType::not_callable("module")),
        }
    }
}

impl BuiltinFunction {
    /// Calls a pure builtin function.
    fn call(
        self,
        heap: &mut Heap<impl ResourceTracker>,
        args: ArgValues,
        interns: &Interns,
        print: &mut impl PrintWriter,
    ) -> RunResult<Value> {
        match self {
            Self::Len => simple::builtin_len(heap, args, interns),
            Self::Repr => simple::builtin_repr(heap, args, interns),
            Self::Abs => simple::builtin_abs(heap, args, interns),
            Self::Hash => simple::builtin_hash(heap, args, interns),
            Self::Isinstance => simple::builtin_isinstance(heap, args, interns),
            Self::Print => print::builtin_print(heap, args, interns, print),
            Self::Min => min_max::builtin_min(heap, args, interns),
            Self::Max => min_max::builtin_max(heap, args, interns),
            Self::Sum => min_max::builtin_sum(heap, args, interns),
            Self::Any => min_max::builtin_any(heap, args, interns),
            Self::All => min_max::builtin_all(heap, args, interns),
            Self::Enumerate => iter_fns::builtin_enumerate(heap, args, interns),
            Self::Zip => iter_fns::builtin_zip(heap, args, interns),
            Self::Reversed => iter_fns::builtin_reversed(heap, args, interns),
            Self::FileStat => convert::builtin_file_stat(heap, args, interns),
            Self::DirStat => convert::builtin_dir_stat(heap, args, interns),
            Self::Gather => builtin_gather(heap, args),
            Self::Sorted | Self::Map | Self::Filter | Self::Getenv => Err(
                crate::exception_private::RunError::internal(format!("builtin {self} must be dispatched by the VM")),
            ),
        }
    }
}

/// `asyncio.gather(*awaitables)`: packages the arguments into a future.
///
/// Nothing is validated here; a non-awaitable raises when the scheduler
/// reaches it.
fn builtin_gather(heap: &mut Heap<impl ResourceTracker>, args: ArgValues) -> RunResult<Value> {
    let (positional, kwargs) = args.into_parts();
    if !kwargs.is_empty() {
        return Err(ExcType::type_error("gather() got an unexpected keyword argument"));
    }
    let items: Vec<Value> = positional.collect();
    Ok(heap.allocate_value(HeapData::Gather(GatherFuture::new(items)))?)
}

/// Constructs an exception instance from `ValueError('msg')`-style calls.
fn construct_exception(
    exc_type: ExcType,
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
) -> RunResult<Value> {
    let (positional, kwargs) = args.into_parts();
    if !kwargs.is_empty() {
        return Err(ExcType::type_error(format!(
            "{exc_type}() takes no keyword arguments"
        )));
    }
    let args: Vec<Value> = positional.collect();
    Ok(heap.allocate_value(HeapData::Exception(ExcInstance { exc_type, args }))?)
}
