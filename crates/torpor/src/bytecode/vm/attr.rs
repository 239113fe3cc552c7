//! Attribute access and assignment.
//!
//! Lookup order on records: declared field, then the type's method table,
//! then extra attributes (mutable records only). Builtin-type methods bind
//! lazily into heap `BoundMethod` values so `f = x.method` works; unknown
//! names raise `AttributeError` at access time, as in Python.

use crate::{
    builtins::{BuiltinFunction, Builtins, ModuleKind},
    exception_private::{ExcType, RunResult},
    heap::HeapData,
    intern::StringId,
    os::OsFunction,
    program::Program,
    resource::ResourceTracker,
    types::{BoundMethod, MethodKind, Type},
    value::Value,
};

use super::VM;

/// `str` methods the interpreter implements.
const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "startswith", "endswith", "find", "split", "join", "replace",
];

/// `list` methods.
const LIST_METHODS: &[&str] = &[
    "append", "extend", "pop", "insert", "remove", "index", "count", "reverse", "clear", "sort",
];

/// `dict` methods.
const DICT_METHODS: &[&str] = &["get", "keys", "values", "items", "pop", "setdefault", "update", "clear"];

/// `set` methods.
const SET_METHODS: &[&str] = &["add", "remove", "discard", "clear", "union", "intersection"];

/// Pure (non-suspending) `Path` methods.
const PATH_PURE_METHODS: &[&str] = &["with_name", "with_suffix", "joinpath", "as_posix", "is_absolute"];

impl<T: ResourceTracker> VM<T> {
    /// `owner.name`.
    pub(super) fn load_attr(&mut self, owner: Value, name_id: StringId, program: &Program) -> RunResult<Value> {
        let interns = &program.interns;
        let name = interns.get_str(name_id).to_owned();

        match &owner {
            Value::Ref(id) => {
                let id = *id;
                match self.heap.get(id) {
                    HeapData::Record(record) => {
                        let def = interns.record_type(record.type_id);
                        if let Some(index) = def.field_index(name_id) {
                            return Ok(record.fields[index].clone());
                        }
                        if let Some(func_id) = def.method(name_id) {
                            return Ok(self.heap.allocate_value(HeapData::BoundMethod(BoundMethod {
                                receiver: owner.clone(),
                                kind: MethodKind::Def(func_id),
                            }))?);
                        }
                        if let Some(value) = record.extra_attr(name_id) {
                            return Ok(value.clone());
                        }
                        let type_name = interns.get_str(def.name).to_owned();
                        Err(ExcType::attribute_error(&type_name, &name))
                    }
                    HeapData::Path(path) => {
                        match name.as_str() {
                            "parts" => {
                                let parts = path.parts();
                                let mut items = Vec::with_capacity(parts.len());
                                for part in parts {
                                    items.push(self.heap.allocate_value(HeapData::Str(part))?);
                                }
                                Ok(self.heap.allocate_value(HeapData::Tuple(items))?)
                            }
                            "name" => {
                                let file_name = path.name().to_owned();
                                Ok(self.heap.allocate_value(HeapData::Str(file_name))?)
                            }
                            "parent" => {
                                let parent = path.parent();
                                Ok(self.heap.allocate_value(HeapData::Path(parent))?)
                            }
                            "suffix" => {
                                let suffix = path.suffix().to_owned();
                                Ok(self.heap.allocate_value(HeapData::Str(suffix))?)
                            }
                            "stem" => {
                                let stem = path.stem().to_owned();
                                Ok(self.heap.allocate_value(HeapData::Str(stem))?)
                            }
                            _ => {
                                if let Some(os_fn) = OsFunction::from_path_method(&name) {
                                    return Ok(self.heap.allocate_value(HeapData::BoundMethod(BoundMethod {
                                        receiver: owner.clone(),
                                        kind: MethodKind::Os(os_fn),
                                    }))?);
                                }
                                if PATH_PURE_METHODS.contains(&name.as_str()) {
                                    return self.bind_native(owner.clone(), Type::Path, name_id);
                                }
                                Err(ExcType::attribute_error("PurePosixPath", &name))
                            }
                        }
                    }
                    HeapData::Stat(stat) => stat
                        .get_field(&name)
                        .ok_or_else(|| ExcType::attribute_error("StatResult", &name)),
                    HeapData::Exception(exc) => {
                        if name == "args" {
                            let args = exc.args.clone();
                            return Ok(self.heap.allocate_value(HeapData::Tuple(args))?);
                        }
                        let type_name: &'static str = exc.exc_type.into();
                        Err(ExcType::attribute_error(type_name, &name))
                    }
                    HeapData::Str(_) => {
                        if STR_METHODS.contains(&name.as_str()) {
                            self.bind_native(owner.clone(), Type::Str, name_id)
                        } else {
                            Err(ExcType::attribute_error("str", &name))
                        }
                    }
                    HeapData::List(_) => {
                        if LIST_METHODS.contains(&name.as_str()) {
                            self.bind_native(owner.clone(), Type::List, name_id)
                        } else {
                            Err(ExcType::attribute_error("list", &name))
                        }
                    }
                    HeapData::Dict(_) => {
                        if DICT_METHODS.contains(&name.as_str()) {
                            self.bind_native(owner.clone(), Type::Dict, name_id)
                        } else {
                            Err(ExcType::attribute_error("dict", &name))
                        }
                    }
                    HeapData::Set(_) => {
                        if SET_METHODS.contains(&name.as_str()) {
                            self.bind_native(owner.clone(), Type::Set, name_id)
                        } else {
                            Err(ExcType::attribute_error("set", &name))
                        }
                    }
                    _ => {
                        let type_name = owner.type_name(&self.heap, interns).into_owned();
                        Err(ExcType::attribute_error(&type_name, &name))
                    }
                }
            }
            Value::InternString(_) => {
                if STR_METHODS.contains(&name.as_str()) {
                    self.bind_native(owner.clone(), Type::Str, name_id)
                } else {
                    Err(ExcType::attribute_error("str", &name))
                }
            }
            Value::Builtin(Builtins::Module(ModuleKind::Os)) => match name.as_str() {
                "getenv" => Ok(Value::Builtin(Builtins::Function(BuiltinFunction::Getenv))),
                _ => Err(ExcType::attribute_error_module("os", &name)),
            },
            Value::Builtin(Builtins::Module(ModuleKind::Asyncio)) => match name.as_str() {
                "gather" => Ok(Value::Builtin(Builtins::Function(BuiltinFunction::Gather))),
                _ => Err(ExcType::attribute_error_module("asyncio", &name)),
            },
            Value::Builtin(Builtins::Type(Type::StatResult)) => match name.as_str() {
                "file_stat" => Ok(Value::Builtin(Builtins::Function(BuiltinFunction::FileStat))),
                "dir_stat" => Ok(Value::Builtin(Builtins::Function(BuiltinFunction::DirStat))),
                _ => Err(ExcType::attribute_error("StatResult", &name)),
            },
            _ => {
                let type_name = owner.type_name(&self.heap, interns).into_owned();
                Err(ExcType::attribute_error(&type_name, &name))
            }
        }
    }

    /// Allocates a bound native-method value.
    fn bind_native(&mut self, receiver: Value, ty: Type, name_id: StringId) -> RunResult<Value> {
        Ok(self.heap.allocate_value(HeapData::BoundMethod(BoundMethod {
            receiver,
            kind: MethodKind::Native(ty, name_id),
        }))?)
    }

    /// `owner.name = value`.
    pub(super) fn store_attr(
        &mut self,
        owner: Value,
        name_id: StringId,
        value: Value,
        program: &Program,
    ) -> RunResult<()> {
        let interns = &program.interns;
        if let Value::Ref(id) = &owner
            && let HeapData::Record(record) = self.heap.get(*id)
        {
            let def = interns.record_type(record.type_id);
            if def.frozen {
                // Declared or not, frozen records reject all assignment.
                return Err(ExcType::frozen_instance(interns.get_str(name_id)));
            }
            let field_index = def.field_index(name_id);
            let HeapData::Record(record) = self.heap.get_mut(*id) else {
                unreachable!("checked above");
            };
            match field_index {
                Some(index) => record.fields[index] = value,
                None => record.set_extra_attr(name_id, value),
            }
            return Ok(());
        }
        let type_name = owner.type_name(&self.heap, interns).into_owned();
        Err(ExcType::attribute_error(&type_name, interns.get_str(name_id)))
    }
}
