//! The compiled-program container and its builder.
//!
//! Source-to-bytecode compilation happens outside this crate; `Program` is
//! the contract between that front end and the interpreter: module code, the
//! function table, record type descriptors, interned data, the global name
//! layout, and the declared external functions. [`ProgramBuilder`] is the
//! assembly API the front end (and the test suite) drives.

use serde::{Deserialize, Serialize};

use crate::{
    bytecode::Code,
    intern::{BytesId, ExtFunctionId, FunctionId, FunctionInfo, Interns, InternsBuilder, ParamSpec, RecordTypeId, StringId},
    types::{FieldDef, RecordTypeDef},
    value::Value,
};

/// An immediate constant usable as a parameter or field default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(StringId),
    Bytes(BytesId),
}

impl ConstValue {
    fn into_value(self) -> Value {
        match self {
            Self::None => Value::None,
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::Int(i),
            Self::Float(f) => Value::Float(f),
            Self::Str(id) => Value::InternString(id),
            Self::Bytes(id) => Value::InternBytes(id),
        }
    }
}

/// A complete compiled program, ready to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub(crate) module: Code,
    pub(crate) interns: Interns,
    /// Global slot names, in slot order. External-function slots come first,
    /// then input slots, then plain globals.
    pub(crate) global_names: Vec<StringId>,
    /// Number of leading global slots bound to external functions.
    pub(crate) external_count: usize,
    /// Number of global slots filled from host inputs at start.
    pub(crate) input_count: usize,
}

impl Program {
    /// Number of global slots.
    #[must_use]
    pub(crate) fn global_count(&self) -> usize {
        self.global_names.len()
    }

    /// The name of a global slot.
    #[must_use]
    pub(crate) fn global_name(&self, slot: u16) -> &str {
        self.interns.get_str(self.global_names[slot as usize])
    }

    /// Local slot count of the module body.
    #[must_use]
    pub(crate) fn module_num_locals(&self) -> u16 {
        self.module.num_locals()
    }
}

/// Builder for [`Program`].
///
/// Slot and id allocation is strictly sequential; contract violations (e.g.
/// declaring inputs after plain globals) panic, since this API is driven by a
/// compiler front end rather than untrusted input.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    interns: InternsBuilder,
    global_names: Vec<StringId>,
    external_count: usize,
    input_count: usize,
    plain_globals_started: bool,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string.
    pub fn intern_str(&mut self, s: &str) -> StringId {
        self.interns.intern_str(s)
    }

    /// Interns a bytes literal.
    pub fn intern_bytes(&mut self, b: &[u8]) -> BytesId {
        self.interns.intern_bytes(b)
    }

    /// Declares an external function, binding the next global slot to it.
    ///
    /// Must precede input and plain global declarations.
    pub fn declare_external(&mut self, name: &str) -> (ExtFunctionId, u16) {
        assert!(
            self.input_count == 0 && !self.plain_globals_started,
            "external functions must be declared first"
        );
        let ext_id = self.interns.add_external_function(name);
        let name_id = self.interns.intern_str(name);
        let slot = self.push_global(name_id);
        self.external_count += 1;
        (ext_id, slot)
    }

    /// Declares an input variable filled from the host at start.
    ///
    /// Must precede plain global declarations.
    pub fn declare_input(&mut self, name: &str) -> u16 {
        assert!(!self.plain_globals_started, "inputs must precede plain globals");
        let name_id = self.interns.intern_str(name);
        let slot = self.push_global(name_id);
        self.input_count += 1;
        slot
    }

    /// Declares a plain global slot (initially unassigned, so loads fall
    /// back to the builtin of the same name while it stays unassigned).
    pub fn declare_global(&mut self, name: &str) -> u16 {
        self.plain_globals_started = true;
        let name_id = self.interns.intern_str(name);
        self.push_global(name_id)
    }

    fn push_global(&mut self, name_id: StringId) -> u16 {
        let slot = u16::try_from(self.global_names.len()).expect("more than u16 globals");
        self.global_names.push(name_id);
        slot
    }

    /// Registers a compiled function.
    ///
    /// The function's parameters occupy its first `param_names.len()` local
    /// slots; `defaults` aligns with the tail of `param_names`.
    pub fn add_function(
        &mut self,
        name: &str,
        param_names: &[StringId],
        defaults: Vec<ConstValue>,
        code: Code,
        is_async: bool,
    ) -> FunctionId {
        assert!(
            defaults.len() <= param_names.len(),
            "more defaults than parameters"
        );
        assert!(
            usize::from(code.num_locals()) >= param_names.len(),
            "parameters exceed local slots"
        );
        let name_id = self.interns.intern_str(name);
        self.interns.add_function(FunctionInfo {
            name: name_id,
            params: ParamSpec {
                names: param_names.to_vec(),
                defaults: defaults.into_iter().map(ConstValue::into_value).collect(),
            },
            code,
            is_async,
        })
    }

    /// Registers a record type.
    pub fn add_record_type(
        &mut self,
        name: &str,
        frozen: bool,
        fields: &[(&str, Option<ConstValue>)],
        methods: &[(&str, FunctionId)],
    ) -> RecordTypeId {
        let name_id = self.interns.intern_str(name);
        let fields = fields
            .iter()
            .map(|(field_name, default)| FieldDef {
                name: self.interns.intern_str(field_name),
                default: default.map(ConstValue::into_value),
            })
            .collect();
        let methods = methods
            .iter()
            .map(|(method_name, func_id)| (self.interns.intern_str(method_name), *func_id))
            .collect();
        self.interns.add_record_type(RecordTypeDef {
            name: name_id,
            fields,
            frozen,
            methods,
        })
    }

    /// Finishes the program with the given module body.
    #[must_use]
    pub fn build(self, module: Code) -> Program {
        Program {
            module,
            interns: self.interns.build(),
            global_names: self.global_names,
            external_count: self.external_count,
            input_count: self.input_count,
        }
    }
}
