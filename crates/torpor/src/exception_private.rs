//! Internal exception taxonomy and error plumbing.
//!
//! Runtime failures flow through the VM as [`RunError`] via `?`. Most carry a
//! [`SimpleException`] (type + optional message) that is only materialized on
//! the heap if a handler actually catches it; exceptions that already live on
//! the heap (raised instances, re-raises) travel by id instead so their
//! argument tuples survive round trips through handlers.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{heap::HeapId, resource::ResourceError};

/// Result type alias for operations that can produce a runtime error.
pub(crate) type RunResult<T> = Result<T, RunError>;

/// Python exception types supported by the interpreter.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>`
/// implementations. The string representation matches the variant name exactly
/// (e.g., `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// Primary exception class - matches any exception in handler checks.
    Exception,
    /// Root of the hierarchy; also catches `Exception`.
    BaseException,

    // --- ArithmeticError hierarchy ---
    /// Intermediate class for arithmetic errors.
    ArithmeticError,
    /// Subclass of ArithmeticError.
    OverflowError,
    /// Subclass of ArithmeticError.
    ZeroDivisionError,

    // --- LookupError hierarchy ---
    /// Intermediate class for lookup errors.
    LookupError,
    /// Subclass of LookupError.
    IndexError,
    /// Subclass of LookupError.
    KeyError,

    // --- RuntimeError hierarchy ---
    /// Intermediate class for runtime errors.
    RuntimeError,
    /// Subclass of RuntimeError, raised when a host call has no handler.
    NotImplementedError,
    /// Subclass of RuntimeError, raised on recursion limits.
    RecursionError,

    // --- AttributeError hierarchy ---
    AttributeError,
    /// Subclass of AttributeError, raised by writes to frozen records.
    FrozenInstanceError,

    // --- NameError hierarchy ---
    NameError,
    /// Subclass of NameError, for locals read before assignment.
    UnboundLocalError,

    // --- OSError hierarchy ---
    /// OS-related errors; hosts typically raise these in answer to OS calls.
    OSError,
    /// Subclass of OSError.
    FileNotFoundError,
    /// Subclass of OSError.
    FileExistsError,
    /// Subclass of OSError.
    IsADirectoryError,
    /// Subclass of OSError.
    NotADirectoryError,
    /// Subclass of OSError.
    PermissionError,

    // --- Standalone exception types ---
    AssertionError,
    MemoryError,
    StopIteration,
    TypeError,
    ValueError,
}

impl ExcType {
    /// Checks if this exception type is a subclass of another exception type.
    ///
    /// Implements the hierarchy used by `except` matching:
    /// - `BaseException` catches everything, `Exception` everything below it
    /// - `LookupError` is the base for `KeyError` and `IndexError`
    /// - `ArithmeticError` is the base for `ZeroDivisionError` and `OverflowError`
    /// - `RuntimeError` is the base for `NotImplementedError` and `RecursionError`
    /// - `AttributeError` is the base for `FrozenInstanceError`
    /// - `NameError` is the base for `UnboundLocalError`
    /// - `OSError` is the base for the filesystem error family
    ///
    /// Returns true if `self` would be caught by `except handler_type:`.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        if self == handler_type {
            return true;
        }
        match handler_type {
            Self::BaseException => true,
            Self::Exception => !matches!(self, Self::BaseException),
            Self::LookupError => matches!(self, Self::KeyError | Self::IndexError),
            Self::ArithmeticError => matches!(self, Self::ZeroDivisionError | Self::OverflowError),
            Self::RuntimeError => matches!(self, Self::NotImplementedError | Self::RecursionError),
            Self::AttributeError => matches!(self, Self::FrozenInstanceError),
            Self::NameError => matches!(self, Self::UnboundLocalError),
            Self::OSError => matches!(
                self,
                Self::FileNotFoundError
                    | Self::FileExistsError
                    | Self::IsADirectoryError
                    | Self::NotADirectoryError
                    | Self::PermissionError
            ),
            _ => false,
        }
    }

    /// Creates a `TypeError` with the given message.
    pub(crate) fn type_error(message: impl Into<Cow<'static, str>>) -> RunError {
        SimpleException::new_msg(Self::TypeError, message).into()
    }

    /// Creates a `ValueError` with the given message.
    pub(crate) fn value_error(message: impl Into<Cow<'static, str>>) -> RunError {
        SimpleException::new_msg(Self::ValueError, message).into()
    }

    /// Creates a `RuntimeError` with the given message.
    pub(crate) fn runtime_error(message: impl Into<Cow<'static, str>>) -> RunError {
        SimpleException::new_msg(Self::RuntimeError, message).into()
    }

    /// Creates a `NotImplementedError` with the given message.
    pub(crate) fn not_implemented(message: impl Into<Cow<'static, str>>) -> RunError {
        SimpleException::new_msg(Self::NotImplementedError, message).into()
    }

    /// Creates an `OverflowError` with the given message.
    pub(crate) fn overflow_error(message: impl Into<Cow<'static, str>>) -> RunError {
        SimpleException::new_msg(Self::OverflowError, message).into()
    }

    /// Creates an `IndexError` with the given message.
    pub(crate) fn index_error(message: impl Into<Cow<'static, str>>) -> RunError {
        SimpleException::new_msg(Self::IndexError, message).into()
    }

    /// Creates a `KeyError` whose message is the repr of the missing key.
    pub(crate) fn key_error(key_repr: String) -> RunError {
        SimpleException::new_msg(Self::KeyError, key_repr).into()
    }

    /// Creates a `ZeroDivisionError` with the canonical message for `/`.
    pub(crate) fn division_by_zero() -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, "division by zero").into()
    }

    /// Creates a `ZeroDivisionError` with the canonical message for `//` and `%`.
    pub(crate) fn int_division_by_zero() -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, "integer division or modulo by zero").into()
    }

    /// Creates a `ZeroDivisionError` for float `/` by zero.
    pub(crate) fn float_division_by_zero() -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, "float division by zero").into()
    }

    /// Creates a `ZeroDivisionError` for float `//` by zero.
    pub(crate) fn float_floor_division_by_zero() -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, "float floor division by zero").into()
    }

    /// Creates a `ZeroDivisionError` for float `%` by zero.
    pub(crate) fn float_modulo_by_zero() -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, "float modulo").into()
    }

    /// Creates a `NameError` for an unresolved global name.
    ///
    /// Message format: `name 'x' is not defined`
    pub(crate) fn name_error(name: &str) -> RunError {
        SimpleException::new_msg(Self::NameError, format!("name '{name}' is not defined")).into()
    }

    /// Creates an `UnboundLocalError` for a local read before assignment.
    pub(crate) fn unbound_local(name: &str) -> RunError {
        SimpleException::new_msg(
            Self::UnboundLocalError,
            format!("cannot access local variable '{name}' where it is not associated with a value"),
        )
        .into()
    }

    /// Creates an `AttributeError` for a missing attribute.
    ///
    /// Message format: `'<TypeName>' object has no attribute '<attr>'`
    pub(crate) fn attribute_error(type_name: &str, attr: &str) -> RunError {
        SimpleException::new_msg(
            Self::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
        .into()
    }

    /// Creates an `AttributeError` for a missing module attribute.
    ///
    /// Message format: `module 'os' has no attribute '<attr>'`
    pub(crate) fn attribute_error_module(module: &str, attr: &str) -> RunError {
        SimpleException::new_msg(
            Self::AttributeError,
            format!("module '{module}' has no attribute '{attr}'"),
        )
        .into()
    }

    /// Creates a `FrozenInstanceError` for assigning to a frozen record.
    ///
    /// A subclass of `AttributeError`, so `except AttributeError` catches it.
    /// Message format: `cannot assign to field '<attr>'`
    pub(crate) fn frozen_instance(attr: &str) -> RunError {
        SimpleException::new_msg(Self::FrozenInstanceError, format!("cannot assign to field '{attr}'")).into()
    }

    /// Creates a `TypeError` for calling a non-callable value.
    ///
    /// Message format: `'<typename>' object is not callable`
    pub(crate) fn not_callable(type_name: &str) -> RunError {
        Self::type_error(format!("'{type_name}' object is not callable"))
    }

    /// Creates a `TypeError` for hashing an unhashable value.
    ///
    /// Message format: `unhashable type: '<typename>'`
    pub(crate) fn unhashable(type_name: &str) -> RunError {
        Self::type_error(format!("unhashable type: '{type_name}'"))
    }

    /// Creates a `TypeError` for a wrong positional argument count.
    ///
    /// Message format: `foo() takes exactly 2 arguments (3 given)`
    pub(crate) fn type_error_arg_count(name: &str, expected: usize, got: usize) -> RunError {
        Self::type_error(format!("{name}() takes exactly {expected} arguments ({got} given)"))
    }

    /// Creates a `TypeError` for too few positional arguments.
    pub(crate) fn type_error_at_least(name: &str, minimum: usize, got: usize) -> RunError {
        Self::type_error(format!("{name}() takes at least {minimum} argument ({got} given)"))
    }

    /// Creates a `TypeError` for too many positional arguments.
    pub(crate) fn type_error_at_most(name: &str, maximum: usize, got: usize) -> RunError {
        Self::type_error(format!("{name}() takes at most {maximum} arguments ({got} given)"))
    }

    /// Creates a `TypeError` for an unexpected keyword argument.
    pub(crate) fn type_error_unexpected_keyword(name: &str, keyword: &str) -> RunError {
        Self::type_error(format!("{name}() got an unexpected keyword argument '{keyword}'"))
    }

    /// Creates a `TypeError` for a keyword duplicating a positional argument.
    pub(crate) fn type_error_multiple_values(name: &str, argument: &str) -> RunError {
        Self::type_error(format!("{name}() got multiple values for argument '{argument}'"))
    }
}

/// An exception that has a type and at most one message argument.
///
/// This is the cheap in-flight representation; it becomes a heap-allocated
/// exception instance only when a handler binds it or the script inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SimpleException {
    pub exc_type: ExcType,
    pub message: Option<String>,
}

impl SimpleException {
    /// Creates an exception without a message, e.g. bare `StopIteration`.
    #[must_use]
    pub fn new(exc_type: ExcType) -> Self {
        Self {
            exc_type,
            message: None,
        }
    }

    /// Creates an exception with a message.
    #[must_use]
    pub fn new_msg(exc_type: ExcType, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            exc_type,
            message: Some(message.into().into_owned()),
        }
    }
}

/// An exception value being propagated through frame unwinding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum PendingExc {
    /// Not yet materialized on the heap.
    Simple(SimpleException),
    /// Already allocated, carrying a full argument tuple.
    Instance(HeapId),
}

/// A runtime error unwinding out of VM dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum RunError {
    /// A Python-level exception; may be caught by script handlers.
    Exc(PendingExc),
    /// A resource limit was exceeded; also catchable (as MemoryError/RecursionError).
    Resource(ResourceError),
    /// Internal consistency violation; surfaces as RuntimeError.
    Internal(String),
}

impl RunError {
    /// Creates an internal-consistency error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The exception type handlers should match this error against.
    #[must_use]
    pub fn exc_type(&self, lookup: impl FnOnce(HeapId) -> ExcType) -> ExcType {
        match self {
            Self::Exc(PendingExc::Simple(simple)) => simple.exc_type,
            Self::Exc(PendingExc::Instance(id)) => lookup(*id),
            Self::Resource(err) => err.exc_type(),
            Self::Internal(_) => ExcType::RuntimeError,
        }
    }
}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Exc(PendingExc::Simple(exc))
    }
}

impl From<ResourceError> for RunError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subclass_lattice() {
        assert!(ExcType::FrozenInstanceError.is_subclass_of(ExcType::AttributeError));
        assert!(ExcType::KeyError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::NotImplementedError.is_subclass_of(ExcType::RuntimeError));
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::Exception));
        assert!(!ExcType::AttributeError.is_subclass_of(ExcType::FrozenInstanceError));
        assert!(ExcType::FileNotFoundError.is_subclass_of(ExcType::OSError));
        assert!(ExcType::Exception.is_subclass_of(ExcType::BaseException));
    }

    #[test]
    fn display_matches_python_names() {
        assert_eq!(ExcType::ZeroDivisionError.to_string(), "ZeroDivisionError");
        assert_eq!(ExcType::FrozenInstanceError.to_string(), "FrozenInstanceError");
    }
}
