//! Call dispatch.
//!
//! Calling is where every value family meets: builtins, type constructors,
//! record construction, compiled functions (sync and async), bound methods,
//! external functions, and the OS-call surface. The VM also implements the
//! builtins that call back into compiled code (`sorted` with a key, `map`,
//! `filter`, `list.sort`) via a nested synchronous dispatch floor.

use crate::{
    args::{ArgValues, KwargsValues},
    asyncio::Coroutine,
    builtins::{BuiltinFunction, Builtins},
    exception_private::{ExcType, RunError, RunResult},
    heap::{HeapData, HeapId},
    intern::{FunctionId, Interns, StringId},
    io::PrintWriter,
    os::OsFunction,
    program::Program,
    resource::ResourceTracker,
    types::{
        dict::call_dict_method,
        iter::{collect_iter, Iter},
        list::{call_list_method, sort_values},
        record::bind_record_fields,
        set::call_set_method,
        str::call_str_method,
        MethodKind, Type,
    },
    value::Value,
};

use super::{Frame, VM};

/// What a call produced.
pub(super) enum CallResult {
    /// The call completed with a value.
    Value(Value),
    /// A frame was pushed; dispatch continues inside it.
    FramePushed,
    /// The call must leave the sandbox as an OS call.
    OsCall(OsFunction, ArgValues),
    /// The call must leave the sandbox as an external function call.
    External(crate::intern::ExtFunctionId, ArgValues),
}

impl<T: ResourceTracker> VM<T> {
    /// Calls any callable value with the given arguments.
    pub(super) fn call_value(
        &mut self,
        callee: Value,
        args: ArgValues,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<CallResult> {
        match callee {
            Value::Builtin(Builtins::Function(BuiltinFunction::Sorted)) => {
                self.builtin_sorted(args, program, print).map(CallResult::Value)
            }
            Value::Builtin(Builtins::Function(BuiltinFunction::Map)) => {
                self.builtin_map(args, program, print).map(CallResult::Value)
            }
            Value::Builtin(Builtins::Function(BuiltinFunction::Filter)) => {
                self.builtin_filter(args, program, print).map(CallResult::Value)
            }
            Value::Builtin(Builtins::Function(BuiltinFunction::Getenv)) => {
                let (key, default) = args.get_one_two_args("getenv")?;
                if key.as_str(&self.heap, &program.interns).is_none() {
                    return Err(ExcType::type_error(format!(
                        "str expected, not {}",
                        key.type_name(&self.heap, &program.interns)
                    )));
                }
                Ok(CallResult::OsCall(
                    OsFunction::Getenv,
                    ArgValues::Two(key, default.unwrap_or(Value::None)),
                ))
            }
            Value::Builtin(builtin) => builtin
                .call(&mut self.heap, args, &program.interns, print)
                .map(CallResult::Value),
            Value::RecordType(type_id) => {
                let def = program.interns.record_type(type_id);
                let record = bind_record_fields(def, type_id, args, &program.interns)?;
                Ok(CallResult::Value(self.heap.allocate_value(HeapData::Record(record))?))
            }
            Value::DefFunction(function_id) => self.call_function(function_id, args, program),
            Value::ExtFunction(ext_id) => Ok(CallResult::External(ext_id, args)),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::BoundMethod(method) => {
                    let method = method.clone();
                    self.call_bound_method(method.receiver, method.kind, args, program, print)
                }
                _ => Err(self.not_callable(&Value::Ref(id), program)),
            },
            other => Err(self.not_callable(&other, program)),
        }
    }

    /// Calls a compiled function: binds parameters, then either pushes a
    /// frame (sync) or allocates a coroutine (async).
    fn call_function(&mut self, function_id: FunctionId, args: ArgValues, program: &Program) -> RunResult<CallResult> {
        let info = program.interns.function(function_id);
        let locals = bind_params(info.name, &info.params, usize::from(info.code.num_locals()), args, &program.interns)?;
        if info.is_async {
            let coroutine = Coroutine::new(function_id, locals);
            return Ok(CallResult::Value(
                self.heap.allocate_value(HeapData::Coroutine(coroutine))?,
            ));
        }
        self.heap.tracker().check_frame_depth(self.frames.len() + 1)?;
        self.frames.push(Frame::function(function_id, locals));
        Ok(CallResult::FramePushed)
    }

    /// Calls a bound method, prepending the receiver to the argument buffer.
    fn call_bound_method(
        &mut self,
        receiver: Value,
        kind: MethodKind,
        args: ArgValues,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<CallResult> {
        match kind {
            MethodKind::Def(function_id) => self.call_function(function_id, args.prepend(receiver), program),
            MethodKind::Os(os_fn) => Ok(CallResult::OsCall(os_fn, args.prepend(receiver))),
            MethodKind::Native(ty, name_id) => self
                .call_native_method(ty, name_id, receiver, args, program, print)
                .map(CallResult::Value),
        }
    }

    /// Dispatches an interpreter-native method by receiver type.
    fn call_native_method(
        &mut self,
        ty: Type,
        name_id: StringId,
        receiver: Value,
        args: ArgValues,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<Value> {
        let interns = &program.interns;
        let name = interns.get_str(name_id).to_owned();
        match ty {
            Type::Str => {
                let receiver_str = receiver
                    .as_str(&self.heap, interns)
                    .ok_or_else(|| RunError::internal("str method on non-str"))?
                    .to_owned();
                call_str_method(&mut self.heap, &receiver_str, &name, args, interns)
            }
            Type::List => {
                let Value::Ref(list_id) = receiver else {
                    return Err(RunError::internal("list method on non-list"));
                };
                if name == "sort" {
                    return self.list_sort(list_id, args, program, print);
                }
                call_list_method(&mut self.heap, list_id, &name, args, interns)
            }
            Type::Dict => {
                let Value::Ref(dict_id) = receiver else {
                    return Err(RunError::internal("dict method on non-dict"));
                };
                call_dict_method(&mut self.heap, dict_id, &name, args, interns)
            }
            Type::Set => {
                let Value::Ref(set_id) = receiver else {
                    return Err(RunError::internal("set method on non-set"));
                };
                call_set_method(&mut self.heap, set_id, &name, args, interns)
            }
            Type::Path => self.call_path_method(receiver, &name, args, program),
            _ => Err(RunError::internal(format!("native method on unsupported type {ty}"))),
        }
    }

    /// Pure `Path` methods (the OS ones never reach here).
    fn call_path_method(
        &mut self,
        receiver: Value,
        name: &str,
        args: ArgValues,
        program: &Program,
    ) -> RunResult<Value> {
        let interns = &program.interns;
        let Value::Ref(path_id) = &receiver else {
            return Err(RunError::internal("path method on non-path"));
        };
        let HeapData::Path(path) = self.heap.get(*path_id) else {
            return Err(RunError::internal("path method on non-path"));
        };
        let path = path.clone();
        match name {
            "as_posix" => {
                args.check_zero_args("Path.as_posix")?;
                let text = path.as_str().to_owned();
                Ok(self.heap.allocate_value(HeapData::Str(text))?)
            }
            "is_absolute" => {
                args.check_zero_args("Path.is_absolute")?;
                Ok(Value::Bool(path.is_absolute()))
            }
            "with_name" => {
                let new_name = self.required_str_arg(args, "Path.with_name", program)?;
                let renamed = path.with_name(&new_name).map_err(ExcType::value_error)?;
                Ok(self.heap.allocate_value(HeapData::Path(renamed))?)
            }
            "with_suffix" => {
                let suffix = self.required_str_arg(args, "Path.with_suffix", program)?;
                let renamed = path.with_suffix(&suffix).map_err(ExcType::value_error)?;
                Ok(self.heap.allocate_value(HeapData::Path(renamed))?)
            }
            "joinpath" => {
                let (positional, kwargs) = args.into_parts();
                if !kwargs.is_empty() {
                    return Err(ExcType::type_error("Path.joinpath() takes no keyword arguments"));
                }
                let mut joined = path;
                for segment in positional {
                    let Some(text) = segment.as_str(&self.heap, interns) else {
                        return Err(ExcType::type_error(format!(
                            "argument should be a str or an os.PathLike object, not '{}'",
                            segment.type_name(&self.heap, interns)
                        )));
                    };
                    joined = joined.join(text);
                }
                Ok(self.heap.allocate_value(HeapData::Path(joined))?)
            }
            _ => Err(ExcType::attribute_error("PurePosixPath", name)),
        }
    }

    /// Extracts a required single string argument for a method.
    fn required_str_arg(&self, args: ArgValues, name: &str, program: &Program) -> RunResult<String> {
        let value = args.get_one_arg(name)?;
        value
            .as_str(&self.heap, &program.interns)
            .map(str::to_owned)
            .ok_or_else(|| ExcType::type_error(format!("{name}() argument must be str")))
    }

    /// `sorted(iterable, *, key=None, reverse=False)` with a stable sort.
    fn builtin_sorted(
        &mut self,
        args: ArgValues,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<Value> {
        let (mut positional, kwargs) = args.into_parts();
        let Some(iterable) = positional.next() else {
            return Err(ExcType::type_error_arg_count("sorted", 1, 0));
        };
        if positional.next().is_some() {
            return Err(ExcType::type_error("sorted expected 1 argument"));
        }
        let (key_fn, reverse) = self.sort_kwargs(kwargs, "sorted", program)?;
        let mut items = collect_iter(&mut self.heap, iterable, &program.interns)?;
        self.sort_items(&mut items, key_fn, reverse, program, print)?;
        Ok(self.heap.allocate_value(HeapData::List(items))?)
    }

    /// `list.sort(*, key=None, reverse=False)`, in place.
    fn list_sort(
        &mut self,
        list_id: HeapId,
        args: ArgValues,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<Value> {
        let (mut positional, kwargs) = args.into_parts();
        if positional.next().is_some() {
            return Err(ExcType::type_error("sort() takes no positional arguments"));
        }
        let (key_fn, reverse) = self.sort_kwargs(kwargs, "sort", program)?;
        let HeapData::List(items) = self.heap.get(list_id) else {
            return Err(RunError::internal("sort on non-list"));
        };
        let mut items = items.clone();
        self.sort_items(&mut items, key_fn, reverse, program, print)?;
        let HeapData::List(slot) = self.heap.get_mut(list_id) else {
            return Err(RunError::internal("sort on non-list"));
        };
        *slot = items;
        Ok(Value::None)
    }

    /// Parses `key=`/`reverse=` keyword arguments.
    fn sort_kwargs(
        &self,
        kwargs: KwargsValues,
        name: &str,
        program: &Program,
    ) -> RunResult<(Option<Value>, bool)> {
        let interns = &program.interns;
        let mut key_fn = None;
        let mut reverse = false;
        for (key, value) in kwargs.into_iter() {
            match key.as_str(interns) {
                "key" => {
                    if !matches!(value, Value::None) {
                        key_fn = Some(value);
                    }
                }
                "reverse" => reverse = value.py_bool(&self.heap, interns),
                other => {
                    return Err(ExcType::type_error(format!(
                        "'{other}' is an invalid keyword argument for {name}()"
                    )));
                }
            }
        }
        Ok((key_fn, reverse))
    }

    /// Applies the optional key function and sorts stably.
    fn sort_items(
        &mut self,
        items: &mut [Value],
        key_fn: Option<Value>,
        reverse: bool,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<()> {
        let mut keys = match key_fn {
            Some(function) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in items.iter() {
                    let key = self.call_sync(function.clone(), ArgValues::One(item.clone()), program, print)?;
                    keys.push(key);
                }
                Some(keys)
            }
            None => None,
        };
        sort_values(items, keys.as_mut(), reverse, &self.heap, &program.interns)
    }

    /// `map(function, *iterables)`: eager over the shortest input, returning
    /// an iterator over the results.
    fn builtin_map(&mut self, args: ArgValues, program: &Program, print: &mut impl PrintWriter) -> RunResult<Value> {
        let (positional, kwargs) = args.into_parts();
        if !kwargs.is_empty() {
            return Err(ExcType::type_error("map() takes no keyword arguments"));
        }
        let mut positional: Vec<Value> = positional.collect();
        if positional.len() < 2 {
            return Err(ExcType::type_error("map() must have at least two arguments."));
        }
        let function = positional.remove(0);
        let mut columns = Vec::with_capacity(positional.len());
        for iterable in positional {
            columns.push(collect_iter(&mut self.heap, iterable, &program.interns)?);
        }
        let shortest = columns.iter().map(Vec::len).min().unwrap_or(0);
        let mut results = Vec::with_capacity(shortest);
        for row in 0..shortest {
            let call_args = ArgValues::from_positional(columns.iter().map(|column| column[row].clone()).collect());
            results.push(self.call_sync(function.clone(), call_args, program, print)?);
        }
        Ok(self
            .heap
            .allocate_value(HeapData::Iter(Iter::Vec { items: results, index: 0 }))?)
    }

    /// `filter(function_or_None, iterable)`, eager like `map`.
    fn builtin_filter(
        &mut self,
        args: ArgValues,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<Value> {
        let (function, iterable) = args.get_two_args("filter")?;
        let items = collect_iter(&mut self.heap, iterable, &program.interns)?;
        let mut kept = Vec::new();
        for item in items {
            let keep = match &function {
                Value::None => item.py_bool(&self.heap, &program.interns),
                _ => {
                    let verdict = self.call_sync(function.clone(), ArgValues::One(item.clone()), program, print)?;
                    verdict.py_bool(&self.heap, &program.interns)
                }
            };
            if keep {
                kept.push(item);
            }
        }
        Ok(self
            .heap
            .allocate_value(HeapData::Iter(Iter::Vec { items: kept, index: 0 }))?)
    }

    /// The canonical non-callable error.
    fn not_callable(&self, value: &Value, program: &Program) -> RunError {
        ExcType::not_callable(&value.type_name(&self.heap, &program.interns))
    }
}

/// Binds call arguments to a function's parameter slots.
///
/// Returns the frame's local vector: bound parameters first, then
/// `Undefined` padding up to the code's local count.
fn bind_params(
    name_id: StringId,
    params: &crate::intern::ParamSpec,
    num_locals: usize,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Vec<Value>> {
    let name = interns.get_str(name_id);
    let param_count = params.names.len();
    let (positional, kwargs) = args.into_parts();

    let mut slots: Vec<Option<Value>> = vec![None; param_count];
    let mut extra_positional = 0_usize;
    for (index, value) in positional.enumerate() {
        if index < param_count {
            slots[index] = Some(value);
        } else {
            extra_positional += 1;
        }
    }
    if extra_positional > 0 {
        let given = param_count + extra_positional;
        return Err(ExcType::type_error(format!(
            "{name}() takes {param_count} positional arguments but {given} were given"
        )));
    }

    for (key, value) in kwargs.into_iter() {
        let key_name = key.as_str(interns);
        let Some(index) = params
            .names
            .iter()
            .position(|&param| interns.get_str(param) == key_name)
        else {
            return Err(ExcType::type_error_unexpected_keyword(name, key_name));
        };
        if slots[index].is_some() {
            return Err(ExcType::type_error_multiple_values(name, key_name));
        }
        slots[index] = Some(value);
    }

    let first_default = params.first_default();
    let mut locals = Vec::with_capacity(num_locals);
    let mut missing = Vec::new();
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(value) => locals.push(value),
            None => {
                if index >= first_default {
                    locals.push(params.defaults[index - first_default].clone());
                } else {
                    missing.push(interns.get_str(params.names[index]).to_owned());
                    locals.push(Value::Undefined);
                }
            }
        }
    }
    if !missing.is_empty() {
        let quoted: Vec<String> = missing.iter().map(|param| format!("'{param}'")).collect();
        let listed = match quoted.as_slice() {
            [single] => single.clone(),
            [first, second] => format!("{first} and {second}"),
            [head @ .., last] => format!("{}, and {last}", head.join(", ")),
            [] => unreachable!("missing checked non-empty"),
        };
        let plural = if missing.len() == 1 { "argument" } else { "arguments" };
        return Err(ExcType::type_error(format!(
            "{name}() missing {} required positional {plural}: {listed}",
            missing.len()
        )));
    }
    locals.resize(num_locals, Value::Undefined);
    Ok(locals)
}
