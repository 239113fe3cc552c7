//! Implementation of the print() builtin function.

use std::borrow::Cow;

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    io::PrintWriter,
    resource::ResourceTracker,
    value::Value,
};

/// `print(*args, sep=' ', end='\n')`.
pub(crate) fn builtin_print(
    heap: &mut Heap<impl ResourceTracker>,
    args: ArgValues,
    interns: &Interns,
    print: &mut impl PrintWriter,
) -> RunResult<Value> {
    let (positional, kwargs) = args.into_parts();

    let mut sep: Option<String> = None;
    let mut end: Option<String> = None;
    for (key, value) in kwargs.into_iter() {
        let keyword = key.as_str(interns);
        let target = match keyword {
            "sep" => &mut sep,
            "end" => &mut end,
            other => {
                return Err(ExcType::type_error(format!(
                    "'{other}' is an invalid keyword argument for print()"
                )));
            }
        };
        match &value {
            Value::None => {}
            _ => match value.as_str(heap, interns) {
                Some(text) => *target = Some(text.to_owned()),
                None => {
                    return Err(ExcType::type_error(format!(
                        "{keyword} must be None or a string, not {}",
                        value.type_name(heap, interns)
                    )));
                }
            },
        }
    }
    let sep = sep.unwrap_or_else(|| " ".to_owned());
    let end = end.unwrap_or_else(|| "\n".to_owned());

    for (position, value) in positional.enumerate() {
        if position > 0 {
            for ch in sep.chars() {
                print.stdout_push(ch);
            }
        }
        print.stdout_write(Cow::Owned(value.py_str(heap, interns)));
    }
    for ch in end.chars() {
        print.stdout_push(ch);
    }
    Ok(Value::None)
}
