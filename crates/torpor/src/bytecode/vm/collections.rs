//! Container construction, splat variants, and subscript access.

use crate::{
    args::{ArgValues, KwargsValues},
    bytecode::op::Opcode,
    exception_private::{ExcType, RunError, RunResult},
    heap::{HeapData, HeapId},
    program::Program,
    resource::ResourceTracker,
    types::{
        dict::{dict_get, dict_insert},
        iter::collect_iter,
        set::set_insert,
        Dict, Set,
    },
    value::Value,
};

use super::VM;

impl<T: ResourceTracker> VM<T> {
    /// Handles the `Build*` family: pops `count` elements (or pairs) and
    /// pushes the new container.
    pub(super) fn build_container(&mut self, op: Opcode, count: u16, program: &Program) -> RunResult<Value> {
        let interns = &program.interns;
        match op {
            Opcode::BuildTuple | Opcode::BuildList => {
                let mut items = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    items.push(self.pop()?);
                }
                items.reverse();
                let data = if matches!(op, Opcode::BuildTuple) {
                    HeapData::Tuple(items)
                } else {
                    HeapData::List(items)
                };
                Ok(self.heap.allocate_value(data)?)
            }
            Opcode::BuildDict => {
                let mut pairs = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    let value = self.pop()?;
                    let key = self.pop()?;
                    pairs.push((key, value));
                }
                pairs.reverse();
                let dict_value = self.heap.allocate_value(HeapData::Dict(Dict::new()))?;
                let Value::Ref(dict_id) = dict_value else { unreachable!() };
                for (key, value) in pairs {
                    dict_insert(&mut self.heap, dict_id, key, value, interns)?;
                }
                Ok(dict_value)
            }
            Opcode::BuildSet => {
                let mut items = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    items.push(self.pop()?);
                }
                items.reverse();
                let set_value = self.heap.allocate_value(HeapData::Set(Set::new()))?;
                let Value::Ref(set_id) = set_value else { unreachable!() };
                for item in items {
                    set_insert(&mut self.heap, set_id, item, interns)?;
                }
                Ok(set_value)
            }
            _ => Err(RunError::internal("not a build opcode")),
        }
    }

    /// Handles the splat helpers that mutate the container below the top of
    /// stack.
    pub(super) fn container_splat(&mut self, op: Opcode, program: &Program) -> RunResult<()> {
        let interns = &program.interns;
        match op {
            Opcode::ListAppend => {
                let item = self.pop()?;
                let list_id = self.peek_ref()?;
                let HeapData::List(items) = self.heap.get_mut(list_id) else {
                    return Err(RunError::internal("ListAppend below non-list"));
                };
                items.push(item);
            }
            Opcode::ListExtend => {
                let iterable = self.pop()?;
                let new_items = collect_iter(&mut self.heap, iterable, interns)?;
                let list_id = self.peek_ref()?;
                let HeapData::List(items) = self.heap.get_mut(list_id) else {
                    return Err(RunError::internal("ListExtend below non-list"));
                };
                items.extend(new_items);
            }
            Opcode::ListToTuple => {
                let list = self.pop()?;
                let Value::Ref(list_id) = list else {
                    return Err(RunError::internal("ListToTuple on non-list"));
                };
                let HeapData::List(items) = self.heap.get(list_id) else {
                    return Err(RunError::internal("ListToTuple on non-list"));
                };
                let items = items.clone();
                let tuple = self.heap.allocate_value(HeapData::Tuple(items))?;
                self.push(tuple);
            }
            Opcode::SetAdd => {
                let item = self.pop()?;
                let set_id = self.peek_ref()?;
                set_insert(&mut self.heap, set_id, item, interns)?;
            }
            Opcode::SetUpdate => {
                let iterable = self.pop()?;
                let new_items = collect_iter(&mut self.heap, iterable, interns)?;
                let set_id = self.peek_ref()?;
                for item in new_items {
                    set_insert(&mut self.heap, set_id, item, interns)?;
                }
            }
            Opcode::DictUpdate => {
                let mapping = self.pop()?;
                let Value::Ref(other_id) = mapping else {
                    return Err(ExcType::type_error(format!(
                        "argument must be a mapping, not '{}'",
                        mapping.type_name(&self.heap, interns)
                    )));
                };
                let HeapData::Dict(other) = self.heap.get(other_id) else {
                    return Err(ExcType::type_error(format!(
                        "argument must be a mapping, not '{}'",
                        mapping.type_name(&self.heap, interns)
                    )));
                };
                let pairs: Vec<(Value, Value)> = other
                    .entries()
                    .iter()
                    .map(|entry| (entry.key.clone(), entry.value.clone()))
                    .collect();
                let dict_id = self.peek_ref()?;
                for (key, value) in pairs {
                    dict_insert(&mut self.heap, dict_id, key, value, interns)?;
                }
            }
            _ => return Err(RunError::internal("not a splat opcode")),
        }
        Ok(())
    }

    /// The heap id at the top of the operand stack.
    fn peek_ref(&mut self) -> RunResult<HeapId> {
        match self.top_value()? {
            Value::Ref(id) => Ok(id),
            _ => Err(RunError::internal("expected heap ref on stack")),
        }
    }

    fn top_value(&mut self) -> RunResult<Value> {
        self.frames
            .last()
            .and_then(|frame| frame.stack.last())
            .cloned()
            .ok_or_else(|| RunError::internal("peek on empty stack"))
    }

    /// `container[key]`.
    pub(super) fn load_subscr(&mut self, container: Value, key: Value, program: &Program) -> RunResult<Value> {
        let interns = &program.interns;
        // Strings index by character.
        if let Some(s) = container.as_str(&self.heap, interns) {
            let Some(index) = key.as_index() else {
                return Err(ExcType::type_error(format!(
                    "string indices must be integers, not '{}'",
                    key.type_name(&self.heap, interns)
                )));
            };
            let chars: Vec<char> = s.chars().collect();
            let Some(position) = normalize_index(index, chars.len()) else {
                return Err(ExcType::index_error("string index out of range"));
            };
            let piece = chars[position].to_string();
            return Ok(self.heap.allocate_value(HeapData::Str(piece))?);
        }
        if let Some(bytes) = container.as_bytes(&self.heap, interns) {
            let Some(index) = key.as_index() else {
                return Err(ExcType::type_error(format!(
                    "byte indices must be integers, not '{}'",
                    key.type_name(&self.heap, interns)
                )));
            };
            let Some(position) = normalize_index(index, bytes.len()) else {
                return Err(ExcType::index_error("index out of range"));
            };
            return Ok(Value::Int(i64::from(bytes[position])));
        }
        let Value::Ref(id) = &container else {
            return Err(self.not_subscriptable(&container, program));
        };
        match self.heap.get(*id) {
            HeapData::List(items) => {
                let Some(index) = key.as_index() else {
                    return Err(ExcType::type_error(format!(
                        "list indices must be integers, not '{}'",
                        key.type_name(&self.heap, interns)
                    )));
                };
                match normalize_index(index, items.len()) {
                    Some(position) => Ok(items[position].clone()),
                    None => Err(ExcType::index_error("list index out of range")),
                }
            }
            HeapData::Tuple(items) => {
                let Some(index) = key.as_index() else {
                    return Err(ExcType::type_error(format!(
                        "tuple indices must be integers, not '{}'",
                        key.type_name(&self.heap, interns)
                    )));
                };
                match normalize_index(index, items.len()) {
                    Some(position) => Ok(items[position].clone()),
                    None => Err(ExcType::index_error("tuple index out of range")),
                }
            }
            HeapData::Dict(_) => match dict_get(&self.heap, *id, &key, interns)? {
                Some(value) => Ok(value),
                None => Err(ExcType::key_error(key.py_repr(&self.heap, interns))),
            },
            HeapData::Stat(stat) => {
                let Some(index) = key.as_index() else {
                    return Err(ExcType::type_error(format!(
                        "tuple indices must be integers, not '{}'",
                        key.type_name(&self.heap, interns)
                    )));
                };
                let normalized = normalize_index(index, 10);
                normalized
                    .and_then(|position| stat.get_index(position))
                    .ok_or_else(|| ExcType::index_error("tuple index out of range"))
            }
            HeapData::Range(range) => {
                let Some(index) = key.as_index() else {
                    return Err(ExcType::type_error(format!(
                        "range indices must be integers, not '{}'",
                        key.type_name(&self.heap, interns)
                    )));
                };
                let range = *range;
                match normalize_index(index, range.len()).and_then(|position| range.get(position)) {
                    Some(value) => Ok(Value::Int(value)),
                    None => Err(ExcType::index_error("range object index out of range")),
                }
            }
            _ => Err(self.not_subscriptable(&container, program)),
        }
    }

    /// `container[key] = value`.
    pub(super) fn store_subscr(
        &mut self,
        container: Value,
        key: Value,
        value: Value,
        program: &Program,
    ) -> RunResult<()> {
        let interns = &program.interns;
        let Value::Ref(id) = &container else {
            return Err(self.not_item_assignable(&container, program));
        };
        match self.heap.get(*id) {
            HeapData::List(items) => {
                let len = items.len();
                let Some(index) = key.as_index() else {
                    return Err(ExcType::type_error(format!(
                        "list indices must be integers, not '{}'",
                        key.type_name(&self.heap, interns)
                    )));
                };
                let Some(position) = normalize_index(index, len) else {
                    return Err(ExcType::index_error("list assignment index out of range"));
                };
                let HeapData::List(items) = self.heap.get_mut(*id) else {
                    unreachable!("checked above");
                };
                items[position] = value;
                Ok(())
            }
            HeapData::Dict(_) => dict_insert(&mut self.heap, *id, key, value, interns),
            _ => Err(self.not_item_assignable(&container, program)),
        }
    }

    fn not_subscriptable(&self, container: &Value, program: &Program) -> RunError {
        ExcType::type_error(format!(
            "'{}' object is not subscriptable",
            container.type_name(&self.heap, &program.interns)
        ))
    }

    fn not_item_assignable(&self, container: &Value, program: &Program) -> RunError {
        ExcType::type_error(format!(
            "'{}' object does not support item assignment",
            container.type_name(&self.heap, &program.interns)
        ))
    }

    /// Builds the argument buffer for `CallFunctionKw`.
    pub(super) fn pop_keyword_call(&mut self, argc: u8, kw_index: u16, program: &Program) -> RunResult<ArgValues> {
        let kw_names: Vec<_> = self.code(program).kw_names(kw_index).to_vec();
        let kw_count = kw_names.len();
        let mut values = Vec::with_capacity(usize::from(argc));
        for _ in 0..argc {
            values.push(self.pop()?);
        }
        values.reverse();
        if kw_count > values.len() {
            return Err(RunError::internal("more keyword names than call values"));
        }
        let kw_values = values.split_off(values.len() - kw_count);
        let kwargs = KwargsValues::Inline(kw_names.into_iter().zip(kw_values).collect());
        if values.is_empty() {
            Ok(ArgValues::Kwargs(kwargs))
        } else {
            Ok(ArgValues::ArgsKargs { args: values, kwargs })
        }
    }

    /// Builds the argument buffer for `CallFunctionEx`.
    pub(super) fn pop_splat_call(&mut self, flags: u8, program: &Program) -> RunResult<ArgValues> {
        let interns = &program.interns;
        let kwargs = if flags & 1 != 0 {
            let mapping = self.pop()?;
            let Value::Ref(id) = &mapping else {
                return Err(ExcType::type_error("argument after ** must be a mapping"));
            };
            let HeapData::Dict(dict) = self.heap.get(*id) else {
                return Err(ExcType::type_error("argument after ** must be a mapping"));
            };
            let mut pairs = Vec::with_capacity(dict.len());
            for entry in dict.entries() {
                let Some(name) = entry.key.as_str(&self.heap, interns) else {
                    return Err(ExcType::type_error("keywords must be strings"));
                };
                pairs.push((name.to_owned(), entry.value.clone()));
            }
            KwargsValues::Pairs(pairs)
        } else {
            KwargsValues::Empty
        };
        let args_value = self.pop()?;
        let args = collect_iter(&mut self.heap, args_value, interns)?;
        if kwargs.is_empty() {
            Ok(ArgValues::from_positional(args))
        } else {
            Ok(ArgValues::ArgsKargs { args, kwargs })
        }
    }
}

/// Maps a possibly negative Python index into `0..len`.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let position = if index < 0 { index + len } else { index };
    if (0..len).contains(&position) {
        usize::try_from(position).ok()
    } else {
        None
    }
}
