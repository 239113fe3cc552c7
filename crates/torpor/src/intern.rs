//! Interned program data shared by the compiler front end and the VM.
//!
//! Strings and bytes literals are deduplicated at program-build time and
//! referenced by id from bytecode, so runtime name lookups and constant loads
//! never allocate. The table also carries the compiled function bodies, the
//! record type descriptors, and the declared external function names, making
//! `Interns` the single read-only context the VM needs alongside the heap.

use ahash::AHashMap;

use crate::{
    bytecode::Code,
    types::RecordTypeDef,
    value::Value,
};

macro_rules! intern_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an id from a raw index.
            #[inline]
            #[must_use]
            pub fn new(raw: usize) -> Self {
                Self(u32::try_from(raw).expect("intern table index exceeds u32"))
            }

            /// Returns the raw index.
            #[inline]
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

intern_id!(
    /// Id of an interned string.
    StringId
);
intern_id!(
    /// Id of an interned bytes literal.
    BytesId
);
intern_id!(
    /// Id of a compiled function in the program's function table.
    FunctionId
);
intern_id!(
    /// Id of an external function declared by the host.
    ExtFunctionId
);
intern_id!(
    /// Id of a record type registered in the program's type table.
    RecordTypeId
);

/// Parameter metadata for a compiled function.
///
/// Only positional-or-keyword parameters exist in this subset; a default, when
/// present, must be an immediate constant (the front end rejects anything
/// else).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ParamSpec {
    /// Parameter names in declaration order.
    pub names: Vec<StringId>,
    /// Default values aligned to the tail of `names`.
    pub defaults: Vec<Value>,
}

impl ParamSpec {
    /// A spec taking no parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            defaults: Vec::new(),
        }
    }

    /// Index of the first parameter that has a default.
    #[must_use]
    pub fn first_default(&self) -> usize {
        self.names.len() - self.defaults.len()
    }
}

/// A compiled function body plus its calling metadata.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionInfo {
    /// Function name, for error messages and repr.
    pub name: StringId,
    /// Parameter layout used to bind call arguments to local slots.
    pub params: ParamSpec,
    /// Compiled body.
    pub code: Code,
    /// Whether calling this function produces a coroutine instead of running.
    pub is_async: bool,
}

/// Read-only interned data for one program.
///
/// Built once by [`crate::ProgramBuilder`] and shared by every execution of
/// the program. Nothing in here is mutated at runtime.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Interns {
    strings: Vec<String>,
    bytes: Vec<Vec<u8>>,
    functions: Vec<FunctionInfo>,
    record_types: Vec<RecordTypeDef>,
    external_functions: Vec<String>,
}

impl Interns {
    /// Returns the content of an interned string.
    ///
    /// # Panics
    /// Panics if the id did not come from this table.
    #[must_use]
    pub fn get_str(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Returns the content of an interned bytes literal.
    #[must_use]
    pub fn get_bytes(&self, id: BytesId) -> &[u8] {
        &self.bytes[id.index()]
    }

    /// Returns a compiled function by id.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> &FunctionInfo {
        &self.functions[id.index()]
    }

    /// Returns a record type descriptor by id.
    #[must_use]
    pub fn record_type(&self, id: RecordTypeId) -> &RecordTypeDef {
        &self.record_types[id.index()]
    }

    /// Returns the declared name of an external function.
    #[must_use]
    pub fn external_function_name(&self, id: ExtFunctionId) -> &str {
        &self.external_functions[id.index()]
    }

    /// Number of declared external functions.
    #[must_use]
    pub fn external_function_count(&self) -> usize {
        self.external_functions.len()
    }
}

/// Mutable builder half of [`Interns`], used while assembling a program.
///
/// Strings are deduplicated; bytes are not (literal bytes rarely repeat and
/// content comparison at build time is not worth it).
#[derive(Debug, Default)]
pub(crate) struct InternsBuilder {
    interns: Interns,
    string_index: AHashMap<String, StringId>,
}

impl InternsBuilder {
    /// Interns a string, returning the existing id when already present.
    pub fn intern_str(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.string_index.get(s) {
            return id;
        }
        let id = StringId::new(self.interns.strings.len());
        self.interns.strings.push(s.to_owned());
        self.string_index.insert(s.to_owned(), id);
        id
    }

    /// Interns a bytes literal.
    pub fn intern_bytes(&mut self, b: &[u8]) -> BytesId {
        let id = BytesId::new(self.interns.bytes.len());
        self.interns.bytes.push(b.to_vec());
        id
    }

    /// Registers a compiled function, returning its id.
    pub fn add_function(&mut self, info: FunctionInfo) -> FunctionId {
        let id = FunctionId::new(self.interns.functions.len());
        self.interns.functions.push(info);
        id
    }

    /// Registers a record type descriptor, returning its id.
    pub fn add_record_type(&mut self, def: RecordTypeDef) -> RecordTypeId {
        let id = RecordTypeId::new(self.interns.record_types.len());
        self.interns.record_types.push(def);
        id
    }

    /// Declares an external function name, returning its id.
    pub fn add_external_function(&mut self, name: &str) -> ExtFunctionId {
        let id = ExtFunctionId::new(self.interns.external_functions.len());
        self.interns.external_functions.push(name.to_owned());
        id
    }

    /// Finishes building and returns the immutable table.
    pub fn build(self) -> Interns {
        self.interns
    }
}
