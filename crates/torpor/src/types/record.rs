//! User-defined record types and their instances.
//!
//! A record type is what the Python source level calls a dataclass: a named,
//! ordered set of fields, optionally frozen, with a method table of compiled
//! functions. Type descriptors are registered once per program by the front
//! end; the interpreter only constructs and manipulates instances.

use serde::{Deserialize, Serialize};

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult},
    intern::{FunctionId, Interns, RecordTypeId, StringId},
    value::Value,
};

/// One declared field of a record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FieldDef {
    /// Field name.
    pub name: StringId,
    /// Default value; immediate constants only (front-end contract).
    pub default: Option<Value>,
}

/// A record type descriptor, registered once per program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RecordTypeDef {
    /// Type name, used in repr, hashing, and error messages.
    pub name: StringId,
    /// Declared fields in declaration order.
    pub fields: Vec<FieldDef>,
    /// Frozen records reject all attribute assignment and are hashable.
    pub frozen: bool,
    /// Method table: name -> compiled function taking `self` first.
    pub methods: Vec<(StringId, FunctionId)>,
}

impl RecordTypeDef {
    /// Position of a declared field.
    #[must_use]
    pub fn field_index(&self, name: StringId) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Looks up a method by name.
    #[must_use]
    pub fn method(&self, name: StringId) -> Option<FunctionId> {
        self.methods
            .iter()
            .find(|(method_name, _)| *method_name == name)
            .map(|&(_, func_id)| func_id)
    }
}

/// A record instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Record {
    /// The instance's type.
    pub type_id: RecordTypeId,
    /// Declared field values, aligned with the descriptor's field order.
    pub fields: Vec<Value>,
    /// Attributes assigned after construction (mutable records only). These
    /// never appear in repr or equality.
    pub extra: Vec<(StringId, Value)>,
}

impl Record {
    /// Looks up an extra attribute.
    #[must_use]
    pub fn extra_attr(&self, name: StringId) -> Option<&Value> {
        self.extra
            .iter()
            .find(|(attr_name, _)| *attr_name == name)
            .map(|(_, value)| value)
    }

    /// Sets or replaces an extra attribute.
    pub fn set_extra_attr(&mut self, name: StringId, value: Value) {
        for (attr_name, attr_value) in &mut self.extra {
            if *attr_name == name {
                *attr_value = value;
                return;
            }
        }
        self.extra.push((name, value));
    }
}

/// Binds constructor arguments to declared fields, applying defaults.
///
/// Errors use the record type's name, e.g.
/// `Point() missing required argument: 'y'`.
pub(crate) fn bind_record_fields(
    def: &RecordTypeDef,
    type_id: RecordTypeId,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Record> {
    let type_name = interns.get_str(def.name);
    let (positional, kwargs) = args.into_parts();

    let positional: Vec<Value> = positional.collect();
    if positional.len() > def.fields.len() {
        return Err(ExcType::type_error_at_most(type_name, def.fields.len(), positional.len()));
    }
    let mut fields: Vec<Option<Value>> = vec![None; def.fields.len()];
    for (index, value) in positional.into_iter().enumerate() {
        fields[index] = Some(value);
    }

    for (key, value) in kwargs.into_iter() {
        let key_name = key.as_str(interns);
        let Some(index) = def
            .fields
            .iter()
            .position(|field| interns.get_str(field.name) == key_name)
        else {
            return Err(ExcType::type_error_unexpected_keyword(type_name, key_name));
        };
        if fields[index].is_some() {
            return Err(ExcType::type_error_multiple_values(type_name, key_name));
        }
        fields[index] = Some(value);
    }

    let mut bound = Vec::with_capacity(def.fields.len());
    for (field, slot) in def.fields.iter().zip(fields) {
        match slot.or_else(|| field.default.clone()) {
            Some(value) => bound.push(value),
            None => {
                return Err(ExcType::type_error(format!(
                    "{type_name}() missing required argument: '{}'",
                    interns.get_str(field.name)
                )));
            }
        }
    }

    Ok(Record {
        type_id,
        fields: bound,
        extra: Vec::new(),
    })
}
