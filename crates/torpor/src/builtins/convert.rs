//! Type constructors: `int(x)`, `str(x)`, `list(x)`, …, plus the
//! `StatResult` class constructors.

use num_traits::{FromPrimitive, ToPrimitive};

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData},
    intern::Interns,
    os::StatResult,
    resource::ResourceTracker,
    types::{
        dict::dict_insert,
        iter::collect_iter,
        long_int::{bigint_to_value, value_to_bigint},
        set::set_insert,
        Dict, PyPath, Range, Set, Type,
    },
    value::Value,
};

/// Dispatches a call on a type constructor value.
pub(crate) fn call_type(
    t: Type,
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    match t {
        Type::Bool => {
            let arg = args.get_zero_one_arg("bool")?;
            Ok(Value::Bool(arg.is_some_and(|v| v.py_bool(heap, interns))))
        }
        Type::Int => construct_int(heap, args, interns),
        Type::Float => construct_float(heap, args, interns),
        Type::Str => {
            let arg = args.get_zero_one_arg("str")?;
            let s = arg.map_or_else(String::new, |v| v.py_str(heap, interns));
            Ok(heap.allocate_value(HeapData::Str(s))?)
        }
        Type::Bytes => construct_bytes(heap, args, interns),
        Type::Tuple => {
            let items = match args.get_zero_one_arg("tuple")? {
                None => Vec::new(),
                Some(iterable) => collect_iter(heap, iterable, interns)?,
            };
            Ok(heap.allocate_value(HeapData::Tuple(items))?)
        }
        Type::List => {
            let items = match args.get_zero_one_arg("list")? {
                None => Vec::new(),
                Some(iterable) => collect_iter(heap, iterable, interns)?,
            };
            Ok(heap.allocate_value(HeapData::List(items))?)
        }
        Type::Dict => construct_dict(heap, args, interns),
        Type::Set => {
            let set_value = heap.allocate_value(HeapData::Set(Set::new()))?;
            let Value::Ref(set_id) = set_value else { unreachable!() };
            if let Some(iterable) = args.get_zero_one_arg("set")? {
                for item in collect_iter(heap, iterable, interns)? {
                    set_insert(heap, set_id, item, interns)?;
                }
            }
            Ok(set_value)
        }
        Type::Range => construct_range(heap, args, interns),
        Type::Path => construct_path(heap, args, interns),
        Type::StatResult => Err(ExcType::type_error("cannot create 'StatResult' instances")),
        _ => Err(ExcType::type_error(format!("cannot create '{t}' instances"))),
    }
}

/// `int(x)`: truncating for floats, parsing for strings.
fn construct_int(heap: &mut Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    let Some(arg) = args.get_zero_one_arg("int")? else {
        return Ok(Value::Int(0));
    };
    match &arg {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(_) => Ok(arg),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(ExcType::value_error("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(ExcType::overflow_error("cannot convert float infinity to integer"));
            }
            let truncated = f.trunc();
            if truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64 {
                Ok(Value::Int(truncated as i64))
            } else {
                bigint_to_value(
                    num_bigint::BigInt::from_f64(truncated).expect("finite float converts"),
                    heap,
                )
            }
        }
        Value::Ref(id) if matches!(heap.get(*id), HeapData::LongInt(_)) => Ok(arg),
        _ => {
            let Some(text) = arg.as_str(heap, interns) else {
                return Err(ExcType::type_error(format!(
                    "int() argument must be a string or a number, not '{}'",
                    arg.type_name(heap, interns)
                )));
            };
            let trimmed = text.trim();
            match trimmed.parse::<i64>() {
                Ok(value) => Ok(Value::Int(value)),
                Err(_) => match trimmed.parse::<num_bigint::BigInt>() {
                    Ok(value) => bigint_to_value(value, heap),
                    Err(_) => Err(ExcType::value_error(format!(
                        "invalid literal for int() with base 10: {}",
                        crate::types::str::string_repr(text)
                    ))),
                },
            }
        }
    }
}

/// `float(x)`: widening for ints, parsing for strings.
fn construct_float(heap: &mut Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    let Some(arg) = args.get_zero_one_arg("float")? else {
        return Ok(Value::Float(0.0));
    };
    if let Some(number) = arg.as_number(heap) {
        return Ok(Value::Float(number));
    }
    let Some(text) = arg.as_str(heap, interns) else {
        return Err(ExcType::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            arg.type_name(heap, interns)
        )));
    };
    let trimmed = text.trim();
    let parsed = match trimmed.to_ascii_lowercase().as_str() {
        "inf" | "infinity" | "+inf" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        "nan" | "+nan" | "-nan" => Some(f64::NAN),
        _ => trimmed.parse::<f64>().ok(),
    };
    match parsed {
        Some(value) => Ok(Value::Float(value)),
        None => Err(ExcType::value_error(format!(
            "could not convert string to float: {}",
            crate::types::str::string_repr(text)
        ))),
    }
}

/// `bytes(x)`.
fn construct_bytes(heap: &mut Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    let Some(arg) = args.get_zero_one_arg("bytes")? else {
        return Ok(heap.allocate_value(HeapData::Bytes(Vec::new()))?);
    };
    if let Some(existing) = arg.as_bytes(heap, interns) {
        let copied = existing.to_vec();
        return Ok(heap.allocate_value(HeapData::Bytes(copied))?);
    }
    if let Some(count) = arg.as_index() {
        if count < 0 {
            return Err(ExcType::value_error("negative count"));
        }
        return Ok(heap.allocate_value(HeapData::Bytes(vec![0; count as usize]))?);
    }
    if arg.as_str(heap, interns).is_some() {
        return Err(ExcType::type_error("string argument without an encoding"));
    }
    let items = collect_iter(heap, arg, interns)?;
    let mut bytes = Vec::with_capacity(items.len());
    for item in items {
        let Some(byte) = item.as_index() else {
            return Err(ExcType::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                item.type_name(heap, interns)
            )));
        };
        if !(0..=255).contains(&byte) {
            return Err(ExcType::value_error("bytes must be in range(0, 256)"));
        }
        bytes.push(byte as u8);
    }
    Ok(heap.allocate_value(HeapData::Bytes(bytes))?)
}

/// `dict()`, `dict(mapping_or_pairs)`, `dict(k=v, ...)`.
fn construct_dict(heap: &mut Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    let (mut positional, kwargs) = args.into_parts();
    let dict_value = heap.allocate_value(HeapData::Dict(Dict::new()))?;
    let Value::Ref(dict_id) = dict_value else { unreachable!() };

    let source = positional.next();
    if positional.next().is_some() {
        return Err(ExcType::type_error_at_most("dict", 1, 2));
    }
    if let Some(source) = source {
        match &source {
            Value::Ref(id) if matches!(heap.get(*id), HeapData::Dict(_)) => {
                let HeapData::Dict(existing) = heap.get(*id) else { unreachable!() };
                let pairs: Vec<(Value, Value)> = existing
                    .entries()
                    .iter()
                    .map(|entry| (entry.key.clone(), entry.value.clone()))
                    .collect();
                for (key, value) in pairs {
                    dict_insert(heap, dict_id, key, value, interns)?;
                }
            }
            _ => {
                for (position, pair) in collect_iter(heap, source, interns)?.into_iter().enumerate() {
                    let items = match &pair {
                        Value::Ref(id) => match heap.get(*id) {
                            HeapData::Tuple(items) | HeapData::List(items) if items.len() == 2 => items.clone(),
                            _ => {
                                return Err(ExcType::value_error(format!(
                                    "dictionary update sequence element #{position} is not a pair"
                                )));
                            }
                        },
                        _ => {
                            return Err(ExcType::type_error(format!(
                                "cannot convert dictionary update sequence element #{position} to a sequence"
                            )));
                        }
                    };
                    let mut items = items.into_iter();
                    let key = items.next().expect("len checked");
                    let value = items.next().expect("len checked");
                    dict_insert(heap, dict_id, key, value, interns)?;
                }
            }
        }
    }
    for (key, value) in kwargs.into_iter() {
        let key_string = key.as_str(interns).to_owned();
        let key_value = heap.allocate_value(HeapData::Str(key_string))?;
        dict_insert(heap, dict_id, key_value, value, interns)?;
    }
    Ok(dict_value)
}

/// `range(stop)`, `range(start, stop[, step])`.
fn construct_range(heap: &mut Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    let int_of = |value: &Value| -> RunResult<i64> {
        value.as_index().ok_or_else(|| {
            ExcType::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name(heap, interns)
            ))
        })
    };
    let range = match &args {
        ArgValues::One(stop) => Range {
            start: 0,
            stop: int_of(stop)?,
            step: 1,
        },
        ArgValues::Two(start, stop) => Range {
            start: int_of(start)?,
            stop: int_of(stop)?,
            step: 1,
        },
        ArgValues::ArgsKargs { args: items, kwargs } if kwargs.is_empty() && items.len() == 3 => {
            let step = int_of(&items[2])?;
            if step == 0 {
                return Err(ExcType::value_error("range() arg 3 must not be zero"));
            }
            Range {
                start: int_of(&items[0])?,
                stop: int_of(&items[1])?,
                step,
            }
        }
        other => {
            return Err(ExcType::type_error_at_most("range", 3, other.positional_count()));
        }
    };
    Ok(heap.allocate_value(HeapData::Range(range))?)
}

/// `Path(*segments)`: pure joining, no filesystem access.
fn construct_path(heap: &mut Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    let (positional, kwargs) = args.into_parts();
    if !kwargs.is_empty() {
        return Err(ExcType::type_error("Path() takes no keyword arguments"));
    }
    let mut path = PyPath::new(".");
    let mut first = true;
    for segment in positional {
        let text = match segment.as_str(heap, interns) {
            Some(text) => text.to_owned(),
            None => match &segment {
                Value::Ref(id) => match heap.get(*id) {
                    HeapData::Path(p) => p.as_str().to_owned(),
                    _ => {
                        return Err(ExcType::type_error(format!(
                            "argument should be a str or an os.PathLike object, not '{}'",
                            segment.type_name(heap, interns)
                        )));
                    }
                },
                _ => {
                    return Err(ExcType::type_error(format!(
                        "argument should be a str or an os.PathLike object, not '{}'",
                        segment.type_name(heap, interns)
                    )));
                }
            },
        };
        path = if first { PyPath::new(&text) } else { path.join(&text) };
        first = false;
    }
    Ok(heap.allocate_value(HeapData::Path(path))?)
}

/// `StatResult.file_stat(size, mode, mtime)`.
pub(crate) fn builtin_file_stat(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let (size, mode, mtime) = three_stat_args("file_stat", args, heap, interns)?;
    Ok(heap.allocate_value(HeapData::Stat(StatResult {
        st_mode: mode | crate::os::S_IFREG,
        st_ino: 0,
        st_dev: 0,
        st_nlink: 1,
        st_uid: 0,
        st_gid: 0,
        st_size: size,
        st_atime: 0.0,
        st_mtime: mtime,
        st_ctime: 0.0,
    }))?)
}

/// `StatResult.dir_stat(mode, mtime)`.
pub(crate) fn builtin_dir_stat(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    let (mode, mtime) = args.get_two_args("dir_stat")?;
    let mode = stat_int(&mode, heap, interns)?;
    let mtime = stat_float(&mtime, heap, interns)?;
    Ok(heap.allocate_value(HeapData::Stat(StatResult {
        st_mode: mode | crate::os::S_IFDIR,
        st_ino: 0,
        st_dev: 0,
        st_nlink: 1,
        st_uid: 0,
        st_gid: 0,
        st_size: 0,
        st_atime: 0.0,
        st_mtime: mtime,
        st_ctime: 0.0,
    }))?)
}

fn three_stat_args(
    name: &str,
    args: ArgValues,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<(i64, i64, f64)> {
    match args {
        ArgValues::ArgsKargs { args: items, kwargs } if kwargs.is_empty() && items.len() == 3 => {
            let size = stat_int(&items[0], heap, interns)?;
            let mode = stat_int(&items[1], heap, interns)?;
            let mtime = stat_float(&items[2], heap, interns)?;
            Ok((size, mode, mtime))
        }
        other => Err(ExcType::type_error_arg_count(name, 3, other.positional_count())),
    }
}

fn stat_int(value: &Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<i64> {
    value
        .as_index()
        .or_else(|| value_to_bigint(value, heap).and_then(|big| big.to_i64()))
        .ok_or_else(|| {
            ExcType::type_error(format!(
                "stat field must be an integer, not '{}'",
                value.type_name(heap, interns)
            ))
        })
}

fn stat_float(value: &Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<f64> {
    value.as_number(heap).ok_or_else(|| {
        ExcType::type_error(format!(
            "stat time must be a number, not '{}'",
            value.type_name(heap, interns)
        ))
    })
}
