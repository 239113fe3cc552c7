//! Pending-call argument buffers.
//!
//! Call sites build an [`ArgValues`] in one of five shapes; the common 0-2
//! positional cases avoid heap allocation. A partially-built buffer can exist
//! while attribute access runs (e.g. `f(x, record.method, y)`), so binding a
//! receiver must work on every shape — [`ArgValues::prepend`] is the single
//! place that happens.

use std::vec::IntoIter;

use serde::{Deserialize, Serialize};

use crate::{
    exception_private::{ExcType, RunResult},
    intern::{Interns, StringId},
    value::Value,
};

/// Arguments of a pending call.
///
/// Uses dedicated variants for the common cases of 0-2 positional arguments;
/// most calls never allocate a `Vec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum ArgValues {
    Empty,
    One(Value),
    Two(Value, Value),
    Kwargs(KwargsValues),
    ArgsKargs { args: Vec<Value>, kwargs: KwargsValues },
}

impl ArgValues {
    /// Builds the tightest shape for a positional argument vector.
    #[must_use]
    pub fn from_positional(mut args: Vec<Value>) -> Self {
        match args.len() {
            0 => Self::Empty,
            1 => Self::One(args.pop().expect("len checked")),
            2 => {
                let second = args.pop().expect("len checked");
                let first = args.pop().expect("len checked");
                Self::Two(first, second)
            }
            _ => Self::ArgsKargs {
                args,
                kwargs: KwargsValues::Empty,
            },
        }
    }

    /// Prepends a bound receiver, preserving whatever shape is current.
    ///
    /// This is the argument-prepend operation behind every bound-method call;
    /// keeping it in one place keeps the five shapes from diverging.
    #[must_use]
    pub fn prepend(self, first: Value) -> Self {
        match self {
            Self::Empty => Self::One(first),
            Self::One(a) => Self::Two(first, a),
            Self::Two(a, b) => Self::ArgsKargs {
                args: vec![first, a, b],
                kwargs: KwargsValues::Empty,
            },
            Self::Kwargs(kwargs) => Self::ArgsKargs {
                args: vec![first],
                kwargs,
            },
            Self::ArgsKargs { mut args, kwargs } => {
                args.insert(0, first);
                Self::ArgsKargs { args, kwargs }
            }
        }
    }

    /// Number of positional arguments.
    #[must_use]
    pub fn positional_count(&self) -> usize {
        match self {
            Self::Empty | Self::Kwargs(_) => 0,
            Self::One(_) => 1,
            Self::Two(_, _) => 2,
            Self::ArgsKargs { args, .. } => args.len(),
        }
    }

    /// Checks that zero arguments were passed.
    pub fn check_zero_args(self, name: &str) -> RunResult<()> {
        match self {
            Self::Empty => Ok(()),
            other => Err(ExcType::type_error_arg_count(name, 0, other.positional_count())),
        }
    }

    /// Checks that exactly one positional argument was passed, returning it.
    pub fn get_one_arg(self, name: &str) -> RunResult<Value> {
        match self {
            Self::One(a) => Ok(a),
            other => Err(ExcType::type_error_arg_count(name, 1, other.positional_count())),
        }
    }

    /// Checks that exactly two positional arguments were passed.
    pub fn get_two_args(self, name: &str) -> RunResult<(Value, Value)> {
        match self {
            Self::Two(a, b) => Ok((a, b)),
            other => Err(ExcType::type_error_arg_count(name, 2, other.positional_count())),
        }
    }

    /// Checks for zero or one positional argument.
    pub fn get_zero_one_arg(self, name: &str) -> RunResult<Option<Value>> {
        match self {
            Self::Empty => Ok(None),
            Self::One(a) => Ok(Some(a)),
            other => Err(ExcType::type_error_at_most(name, 1, other.positional_count())),
        }
    }

    /// Checks for one or two positional arguments.
    pub fn get_one_two_args(self, name: &str) -> RunResult<(Value, Option<Value>)> {
        match self {
            Self::One(a) => Ok((a, None)),
            Self::Two(a, b) => Ok((a, Some(b))),
            Self::Empty | Self::Kwargs(_) => Err(ExcType::type_error_at_least(name, 1, 0)),
            other => Err(ExcType::type_error_at_most(name, 2, other.positional_count())),
        }
    }

    /// Deep-converts the buffer to host objects for a snapshot.
    #[must_use]
    pub fn into_objects(
        self,
        heap: &crate::heap::Heap<impl crate::resource::ResourceTracker>,
        interns: &Interns,
    ) -> (Vec<crate::object::Object>, Vec<(crate::object::Object, crate::object::Object)>) {
        use crate::object::Object;
        let (positional, kwargs) = self.into_parts();
        let args = positional.map(|value| Object::from_value(&value, heap, interns)).collect();
        let kwargs = kwargs
            .into_iter()
            .map(|(key, value)| {
                (
                    Object::String(key.as_str(interns).to_owned()),
                    Object::from_value(&value, heap, interns),
                )
            })
            .collect();
        (args, kwargs)
    }

    /// Splits into a positional iterator and the keyword values.
    #[must_use]
    pub fn into_parts(self) -> (ArgPosIter, KwargsValues) {
        match self {
            Self::Empty => (ArgPosIter::Empty, KwargsValues::Empty),
            Self::One(a) => (ArgPosIter::One(Some(a)), KwargsValues::Empty),
            Self::Two(a, b) => (ArgPosIter::Two(Some(a), Some(b)), KwargsValues::Empty),
            Self::Kwargs(kwargs) => (ArgPosIter::Empty, kwargs),
            Self::ArgsKargs { args, kwargs } => (ArgPosIter::Vec(args.into_iter()), kwargs),
        }
    }
}

/// Iterator over positional arguments without allocation.
pub(crate) enum ArgPosIter {
    Empty,
    One(Option<Value>),
    Two(Option<Value>, Option<Value>),
    Vec(IntoIter<Value>),
}

impl Iterator for ArgPosIter {
    type Item = Value;

    #[inline]
    fn next(&mut self) -> Option<Value> {
        match self {
            Self::Empty => None,
            Self::One(a) => a.take(),
            Self::Two(a, b) => a.take().or_else(|| b.take()),
            Self::Vec(iter) => iter.next(),
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match self {
            Self::Empty => 0,
            Self::One(a) => usize::from(a.is_some()),
            Self::Two(a, b) => usize::from(a.is_some()) + usize::from(b.is_some()),
            Self::Vec(iter) => return iter.size_hint(),
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for ArgPosIter {}

/// Keyword arguments of a pending call.
///
/// `Inline` holds compiler-interned names from `f(x=1)` call sites; `Pairs`
/// holds owned names unpacked from a `**mapping` at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum KwargsValues {
    Empty,
    Inline(Vec<(StringId, Value)>),
    Pairs(Vec<(String, Value)>),
}

impl KwargsValues {
    /// Number of keyword arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Inline(kvs) => kvs.len(),
            Self::Pairs(kvs) => kvs.len(),
        }
    }

    /// True when there are none.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates as `(KwKey, Value)` pairs.
    #[must_use]
    pub fn into_iter(self) -> KwargsIter {
        match self {
            Self::Empty => KwargsIter::Empty,
            Self::Inline(kvs) => KwargsIter::Inline(kvs.into_iter()),
            Self::Pairs(kvs) => KwargsIter::Pairs(kvs.into_iter()),
        }
    }
}

/// A keyword name: interned at compile time or owned at runtime.
#[derive(Debug)]
pub(crate) enum KwKey {
    Id(StringId),
    Name(String),
}

impl KwKey {
    /// The keyword as a string slice.
    #[must_use]
    pub fn as_str<'a>(&'a self, interns: &'a Interns) -> &'a str {
        match self {
            Self::Id(id) => interns.get_str(*id),
            Self::Name(name) => name.as_str(),
        }
    }
}

/// Iterator over keyword argument pairs.
pub(crate) enum KwargsIter {
    Empty,
    Inline(IntoIter<(StringId, Value)>),
    Pairs(IntoIter<(String, Value)>),
}

impl Iterator for KwargsIter {
    type Item = (KwKey, Value);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Empty => None,
            Self::Inline(iter) => iter.next().map(|(k, v)| (KwKey::Id(k), v)),
            Self::Pairs(iter) => iter.next().map(|(k, v)| (KwKey::Name(k), v)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Empty => (0, Some(0)),
            Self::Inline(iter) => iter.size_hint(),
            Self::Pairs(iter) => iter.size_hint(),
        }
    }
}

impl ExactSizeIterator for KwargsIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_covers_every_shape() {
        let receiver = Value::Int(0);

        let one = ArgValues::Empty.prepend(receiver.clone());
        assert!(matches!(one, ArgValues::One(Value::Int(0))));

        let two = ArgValues::One(Value::Int(1)).prepend(receiver.clone());
        assert!(matches!(two, ArgValues::Two(Value::Int(0), Value::Int(1))));

        let three = ArgValues::Two(Value::Int(1), Value::Int(2)).prepend(receiver.clone());
        match three {
            ArgValues::ArgsKargs { args, kwargs } => {
                assert_eq!(args.len(), 3);
                assert!(matches!(args[0], Value::Int(0)));
                assert!(kwargs.is_empty());
            }
            other => panic!("expected ArgsKargs, got {other:?}"),
        }

        let kw = ArgValues::Kwargs(KwargsValues::Pairs(vec![("k".to_owned(), Value::Int(9))]));
        match kw.prepend(receiver) {
            ArgValues::ArgsKargs { args, kwargs } => {
                assert_eq!(args.len(), 1);
                assert_eq!(kwargs.len(), 1);
            }
            other => panic!("expected ArgsKargs, got {other:?}"),
        }
    }

    #[test]
    fn from_positional_picks_tight_shapes() {
        assert!(matches!(ArgValues::from_positional(vec![]), ArgValues::Empty));
        assert!(matches!(ArgValues::from_positional(vec![Value::None]), ArgValues::One(_)));
        assert!(matches!(
            ArgValues::from_positional(vec![Value::None, Value::None]),
            ArgValues::Two(_, _)
        ));
        assert!(matches!(
            ArgValues::from_positional(vec![Value::None, Value::None, Value::None]),
            ArgValues::ArgsKargs { .. }
        ));
    }
}
