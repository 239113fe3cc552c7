//! Code object containing compiled bytecode and metadata.
//!
//! A `Code` object represents one compiled function body or the module body.
//! It contains the raw instruction bytes, a constant pool, keyword-name
//! tables for keyword call sites, and a static exception handler table.

use serde::{Deserialize, Serialize};

use crate::{intern::StringId, value::Value};

/// Compiled bytecode for a function or module.
///
/// This is the output of the external compiler front end (via
/// [`crate::bytecode::CodeBuilder`]) and the input to the VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Code {
    /// Raw instruction bytes: 1-byte opcodes with inline operands.
    bytecode: Vec<u8>,

    /// Constant pool referenced by `LoadConst`.
    ///
    /// Constants are immediate values only (numbers, interned strings/bytes,
    /// builtins, function references); compounds are built by instructions.
    constants: Vec<Value>,

    /// Keyword-name lists referenced by `CallFunctionKw`.
    kw_names: Vec<Vec<StringId>>,

    /// Exception handler table, innermost-first for nested `try` blocks.
    ///
    /// Consulted when an exception is raised; there are no runtime
    /// setup/pop-handler instructions.
    exception_table: Vec<ExceptionEntry>,

    /// Number of local slots to allocate per frame.
    num_locals: u16,

    /// Local variable names, for UnboundLocalError messages.
    local_names: Vec<StringId>,
}

impl Code {
    /// Assembles a code object; normally called through `CodeBuilder::build`.
    #[must_use]
    pub(crate) fn new(
        bytecode: Vec<u8>,
        constants: Vec<Value>,
        kw_names: Vec<Vec<StringId>>,
        exception_table: Vec<ExceptionEntry>,
        num_locals: u16,
        local_names: Vec<StringId>,
    ) -> Self {
        Self {
            bytecode,
            constants,
            kw_names,
            exception_table,
            num_locals,
            local_names,
        }
    }

    /// The raw instruction bytes.
    #[must_use]
    pub(crate) fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// The constant at a pool index.
    ///
    /// # Panics
    /// Panics on an out-of-range index; indices come from the compiler.
    #[must_use]
    pub(crate) fn constant(&self, index: u16) -> &Value {
        &self.constants[index as usize]
    }

    /// The keyword-name list at an index.
    #[must_use]
    pub(crate) fn kw_names(&self, index: u16) -> &[StringId] {
        &self.kw_names[index as usize]
    }

    /// Number of local slots frames of this code need.
    #[must_use]
    pub(crate) fn num_locals(&self) -> u16 {
        self.num_locals
    }

    /// The name of a local slot, if recorded.
    #[must_use]
    pub(crate) fn local_name(&self, slot: u16) -> Option<StringId> {
        self.local_names.get(slot as usize).copied()
    }

    /// Finds the innermost exception handler covering a bytecode offset.
    #[must_use]
    pub(crate) fn find_exception_handler(&self, offset: u32) -> Option<&ExceptionEntry> {
        self.exception_table.iter().find(|entry| entry.contains(offset))
    }
}

/// Entry in the exception table: a protected bytecode range and its handler.
///
/// For nested try blocks multiple entries may cover the same offset; entries
/// are ordered innermost-first, so the first match wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExceptionEntry {
    /// Start of the protected range (inclusive).
    start: u32,
    /// End of the protected range (exclusive).
    end: u32,
    /// Bytecode offset of the handler.
    handler: u32,
    /// Operand stack depth to unwind to before pushing the exception value.
    stack_depth: u16,
}

impl ExceptionEntry {
    /// Creates an entry.
    #[must_use]
    pub(crate) fn new(start: u32, end: u32, handler: u32, stack_depth: u16) -> Self {
        Self {
            start,
            end,
            handler,
            stack_depth,
        }
    }

    /// The handler's bytecode offset.
    #[must_use]
    pub(crate) fn handler(&self) -> u32 {
        self.handler
    }

    /// The stack depth to unwind to.
    #[must_use]
    pub(crate) fn stack_depth(&self) -> u16 {
        self.stack_depth
    }

    /// Whether the protected range contains an offset.
    #[must_use]
    pub(crate) fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }
}
