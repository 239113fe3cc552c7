//! String behavior: repr quoting, float formatting, and `str` methods.

use std::fmt::Write;

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData},
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// Formats a string with Python's repr quoting rules.
///
/// Single quotes are preferred; a string containing `'` but not `"` switches
/// to double quotes. Control characters escape as `\xNN` (or the short forms
/// for tab/newline/return).
#[must_use]
pub(crate) fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Formats a float the way Python's `repr` does.
///
/// Uses `ryu` for the shortest round-trip digits, then adjusts the exponent
/// spelling (`1e16` -> `1e+16`, `1e-5` -> `1e-05`) and guarantees a decimal
/// point on integral values.
#[must_use]
pub(crate) fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let mut buffer = ryu::Buffer::new();
    let printed = buffer.format(value);
    match printed.split_once('e') {
        Some((mantissa, exponent)) => {
            let mantissa = mantissa.strip_suffix(".0").unwrap_or(mantissa);
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(rest) => ('-', rest),
                None => ('+', exponent),
            };
            if digits.len() < 2 {
                format!("{mantissa}e{sign}0{digits}")
            } else {
                format!("{mantissa}e{sign}{digits}")
            }
        }
        None => printed.to_owned(),
    }
}

/// Calls a `str` method on a receiver string.
pub(crate) fn call_str_method(
    heap: &mut Heap<impl ResourceTracker>,
    receiver: &str,
    method: &str,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    match method {
        "upper" => {
            args.check_zero_args("str.upper")?;
            Ok(heap.allocate_value(HeapData::Str(receiver.to_uppercase()))?)
        }
        "lower" => {
            args.check_zero_args("str.lower")?;
            Ok(heap.allocate_value(HeapData::Str(receiver.to_lowercase()))?)
        }
        "strip" => {
            let chars = optional_str_arg(args, "str.strip", heap, interns)?;
            let stripped = match &chars {
                Some(set) => receiver.trim_matches(|c| set.contains(c)),
                None => receiver.trim(),
            };
            Ok(heap.allocate_value(HeapData::Str(stripped.to_owned()))?)
        }
        "lstrip" => {
            let chars = optional_str_arg(args, "str.lstrip", heap, interns)?;
            let stripped = match &chars {
                Some(set) => receiver.trim_start_matches(|c| set.contains(c)),
                None => receiver.trim_start(),
            };
            Ok(heap.allocate_value(HeapData::Str(stripped.to_owned()))?)
        }
        "rstrip" => {
            let chars = optional_str_arg(args, "str.rstrip", heap, interns)?;
            let stripped = match &chars {
                Some(set) => receiver.trim_end_matches(|c| set.contains(c)),
                None => receiver.trim_end(),
            };
            Ok(heap.allocate_value(HeapData::Str(stripped.to_owned()))?)
        }
        "startswith" => {
            let prefix = required_str_arg(args, "str.startswith", heap, interns)?;
            Ok(Value::Bool(receiver.starts_with(&prefix)))
        }
        "endswith" => {
            let suffix = required_str_arg(args, "str.endswith", heap, interns)?;
            Ok(Value::Bool(receiver.ends_with(&suffix)))
        }
        "find" => {
            let needle = required_str_arg(args, "str.find", heap, interns)?;
            let position = receiver.find(&needle).map_or(-1, |byte_idx| {
                receiver[..byte_idx].chars().count() as i64
            });
            Ok(Value::Int(position))
        }
        "split" => {
            let sep = optional_str_arg(args, "str.split", heap, interns)?;
            let pieces: Vec<&str> = match &sep {
                Some(sep) if sep.is_empty() => return Err(ExcType::value_error("empty separator")),
                Some(sep) => receiver.split(sep.as_str()).collect(),
                None => receiver.split_whitespace().collect(),
            };
            let mut items = Vec::with_capacity(pieces.len());
            for piece in pieces {
                items.push(heap.allocate_value(HeapData::Str(piece.to_owned()))?);
            }
            Ok(heap.allocate_value(HeapData::List(items))?)
        }
        "join" => {
            let iterable = args.get_one_arg("str.join")?;
            let items: Vec<Value> = match &iterable {
                Value::Ref(id) => match heap.get(*id) {
                    HeapData::List(items) | HeapData::Tuple(items) => items.clone(),
                    HeapData::Set(set) => set.entries().iter().map(|entry| entry.value.clone()).collect(),
                    _ => {
                        return Err(ExcType::type_error(format!(
                            "can only join an iterable, not '{}'",
                            iterable.type_name(heap, interns)
                        )));
                    }
                },
                _ => {
                    return Err(ExcType::type_error(format!(
                        "can only join an iterable, not '{}'",
                        iterable.type_name(heap, interns)
                    )));
                }
            };
            let mut out = String::new();
            for (position, item) in items.iter().enumerate() {
                let Some(piece) = item.as_str(heap, interns) else {
                    return Err(ExcType::type_error(format!(
                        "sequence item {position}: expected str instance, {} found",
                        item.type_name(heap, interns)
                    )));
                };
                if position > 0 {
                    out.push_str(receiver);
                }
                out.push_str(piece);
            }
            Ok(heap.allocate_value(HeapData::Str(out))?)
        }
        "replace" => {
            let (old, new) = args.get_two_args("str.replace")?;
            let (Some(old), Some(new)) = (old.as_str(heap, interns), new.as_str(heap, interns)) else {
                return Err(ExcType::type_error("replace arguments must be str"));
            };
            let replaced = receiver.replace(old, new);
            Ok(heap.allocate_value(HeapData::Str(replaced))?)
        }
        _ => Err(ExcType::attribute_error("str", method)),
    }
}

/// Extracts a required single string argument.
fn required_str_arg(
    args: ArgValues,
    name: &str,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<String> {
    let value = args.get_one_arg(name)?;
    value
        .as_str(heap, interns)
        .map(str::to_owned)
        .ok_or_else(|| ExcType::type_error(format!("{name}() argument must be str")))
}

/// Extracts an optional single string argument.
fn optional_str_arg(
    args: ArgValues,
    name: &str,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<Option<String>> {
    match args.get_zero_one_arg(name)? {
        None | Some(Value::None) => Ok(None),
        Some(value) => value
            .as_str(heap, interns)
            .map(|s| Some(s.to_owned()))
            .ok_or_else(|| ExcType::type_error(format!("{name}() argument must be str"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_quoting() {
        assert_eq!(string_repr("hi"), "'hi'");
        assert_eq!(string_repr("it's"), "\"it's\"");
        assert_eq!(string_repr("a\"b'c"), "'a\"b\\'c'");
        assert_eq!(string_repr("line\n"), "'line\\n'");
        assert_eq!(string_repr("\x01"), "'\\x01'");
    }

    #[test]
    fn float_repr_matches_python() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.5), "0.5");
        assert_eq!(float_repr(-2.25), "-2.25");
        assert_eq!(float_repr(f64::NAN), "nan");
        assert_eq!(float_repr(f64::INFINITY), "inf");
        assert_eq!(float_repr(1e17), "1e+17");
        assert_eq!(float_repr(1e-7), "1e-07");
    }
}
