//! CodeBuilder: the emission API the compiler front end targets.
//!
//! Supports forward jumps through patchable labels, backward jumps to
//! recorded positions, and protected regions for the exception table.
//! Contract violations (unbound labels, oversized pools) panic — this API is
//! driven by a compiler, not by untrusted input.

use crate::{
    bytecode::{
        code::{Code, ExceptionEntry},
        op::{BinaryOpKind, CompareOpKind, Opcode},
    },
    intern::StringId,
    value::Value,
};

/// A forward-jump placeholder returned by the `emit_jump_*` methods.
///
/// Must be bound with [`CodeBuilder::bind`] exactly once.
#[derive(Debug, Clone, Copy)]
#[must_use = "unbound labels leave a zero jump offset"]
pub struct JumpLabel {
    /// Byte position of the i16 offset to patch.
    patch_at: usize,
}

/// Builder for one [`Code`] object.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    bytecode: Vec<u8>,
    constants: Vec<Value>,
    kw_names: Vec<Vec<StringId>>,
    exception_table: Vec<ExceptionEntry>,
    num_locals: u16,
    local_names: Vec<StringId>,
}

impl CodeBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a local slot, returning its index.
    pub fn add_local(&mut self, name: StringId) -> u16 {
        let slot = self.num_locals;
        self.num_locals = self.num_locals.checked_add(1).expect("more than u16 locals");
        self.local_names.push(name);
        slot
    }

    /// Adds a `None` constant.
    pub fn const_none(&mut self) -> u16 {
        self.add_const(Value::None)
    }

    /// Adds a bool constant.
    pub fn const_bool(&mut self, value: bool) -> u16 {
        self.add_const(Value::Bool(value))
    }

    /// Adds an int constant.
    pub fn const_int(&mut self, value: i64) -> u16 {
        self.add_const(Value::Int(value))
    }

    /// Adds a float constant.
    pub fn const_float(&mut self, value: f64) -> u16 {
        self.add_const(Value::Float(value))
    }

    /// Adds an interned-string constant.
    pub fn const_str(&mut self, id: StringId) -> u16 {
        self.add_const(Value::InternString(id))
    }

    /// Adds an interned-bytes constant.
    pub fn const_bytes(&mut self, id: crate::intern::BytesId) -> u16 {
        self.add_const(Value::InternBytes(id))
    }

    /// Adds a compiled-function constant.
    pub fn const_function(&mut self, id: crate::intern::FunctionId) -> u16 {
        self.add_const(Value::DefFunction(id))
    }

    /// Adds a record-type constant.
    pub fn const_record_type(&mut self, id: crate::intern::RecordTypeId) -> u16 {
        self.add_const(Value::RecordType(id))
    }

    /// Adds a constant, reusing an existing equal immediate when possible.
    pub(crate) fn add_const(&mut self, value: Value) -> u16 {
        let found = self.constants.iter().position(|existing| const_eq(existing, &value));
        let index = found.unwrap_or_else(|| {
            self.constants.push(value);
            self.constants.len() - 1
        });
        u16::try_from(index).expect("constant pool exceeds u16")
    }

    /// Adds a keyword-name list for a `CallFunctionKw` site.
    pub fn add_kw_names(&mut self, names: Vec<StringId>) -> u16 {
        self.kw_names.push(names);
        u16::try_from(self.kw_names.len() - 1).expect("kw-name pool exceeds u16")
    }

    /// Current bytecode offset.
    #[must_use]
    pub fn here(&self) -> u32 {
        u32::try_from(self.bytecode.len()).expect("bytecode exceeds u32")
    }

    /// Emits an operand-less instruction.
    pub fn emit(&mut self, op: Opcode) {
        self.bytecode.push(op as u8);
    }

    /// Emits an instruction with a u8 operand.
    pub fn emit_u8(&mut self, op: Opcode, operand: u8) {
        self.bytecode.push(op as u8);
        self.bytecode.push(operand);
    }

    /// Emits an instruction with a u16 operand.
    pub fn emit_u16(&mut self, op: Opcode, operand: u16) {
        self.bytecode.push(op as u8);
        self.bytecode.extend_from_slice(&operand.to_le_bytes());
    }

    /// Emits `CallFunctionKw` with its two operands.
    pub fn emit_call_kw(&mut self, argc: u8, kw_names_index: u16) {
        self.bytecode.push(Opcode::CallFunctionKw as u8);
        self.bytecode.push(argc);
        self.bytecode.extend_from_slice(&kw_names_index.to_le_bytes());
    }

    /// Emits a binary operation.
    pub fn emit_binary(&mut self, kind: BinaryOpKind) {
        self.emit_u8(Opcode::BinaryOp, kind as u8);
    }

    /// Emits a comparison.
    pub fn emit_compare(&mut self, kind: CompareOpKind) {
        self.emit_u8(Opcode::CompareOp, kind as u8);
    }

    /// Emits a forward jump, returning the label to bind at the target.
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        debug_assert!(matches!(
            op,
            Opcode::Jump | Opcode::PopJumpIfFalse | Opcode::PopJumpIfTrue | Opcode::ForIter
        ));
        self.bytecode.push(op as u8);
        let patch_at = self.bytecode.len();
        self.bytecode.extend_from_slice(&0_i16.to_le_bytes());
        JumpLabel { patch_at }
    }

    /// Binds a forward-jump label to the current position.
    pub fn bind(&mut self, label: JumpLabel) {
        let after_operand = label.patch_at + 2;
        let offset = i64::try_from(self.bytecode.len()).expect("bytecode exceeds i64")
            - i64::try_from(after_operand).expect("position exceeds i64");
        let offset = i16::try_from(offset).expect("jump offset exceeds i16");
        self.bytecode[label.patch_at..after_operand].copy_from_slice(&offset.to_le_bytes());
    }

    /// Emits a backward jump to a previously recorded position.
    pub fn emit_jump_back(&mut self, op: Opcode, target: u32) {
        debug_assert!(matches!(op, Opcode::Jump));
        self.bytecode.push(op as u8);
        let after_operand = self.bytecode.len() + 2;
        let offset = i64::from(target) - i64::try_from(after_operand).expect("position exceeds i64");
        let offset = i16::try_from(offset).expect("jump offset exceeds i16");
        self.bytecode.extend_from_slice(&offset.to_le_bytes());
    }

    /// Records an exception handler for the byte range `[start, end)`.
    ///
    /// `stack_depth` is the operand stack depth at `try` entry; the VM
    /// unwinds to it before pushing the exception value and jumping to
    /// `handler`. Nested regions must be added innermost-first.
    pub fn add_exception_handler(&mut self, start: u32, end: u32, handler: u32, stack_depth: u16) {
        self.exception_table
            .push(ExceptionEntry::new(start, end, handler, stack_depth));
    }

    /// Finishes the code object.
    #[must_use]
    pub fn build(self) -> Code {
        Code::new(
            self.bytecode,
            self.constants,
            self.kw_names,
            self.exception_table,
            self.num_locals,
            self.local_names,
        )
    }
}

/// Constant-pool deduplication equality: identical immediates only.
fn const_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::InternString(x), Value::InternString(y)) => x == y,
        (Value::InternBytes(x), Value::InternBytes(y)) => x == y,
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        (Value::DefFunction(x), Value::DefFunction(y)) => x == y,
        (Value::ExtFunction(x), Value::ExtFunction(y)) => x == y,
        (Value::RecordType(x), Value::RecordType(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_jump_patching() {
        let mut b = CodeBuilder::new();
        b.emit(Opcode::Nop);
        let label = b.emit_jump(Opcode::Jump);
        b.emit(Opcode::Nop);
        b.emit(Opcode::Nop);
        b.bind(label);
        let code = b.build();
        // Nop, Jump, i16 LE offset, Nop, Nop -> offset must skip 2 bytes.
        assert_eq!(code.bytecode()[0], Opcode::Nop as u8);
        assert_eq!(code.bytecode()[1], Opcode::Jump as u8);
        let offset = i16::from_le_bytes([code.bytecode()[2], code.bytecode()[3]]);
        assert_eq!(offset, 2);
    }

    #[test]
    fn backward_jump_is_negative() {
        let mut b = CodeBuilder::new();
        let top = b.here();
        b.emit(Opcode::Nop);
        b.emit_jump_back(Opcode::Jump, top);
        let code = b.build();
        let offset = i16::from_le_bytes([code.bytecode()[2], code.bytecode()[3]]);
        assert_eq!(offset, -4);
    }

    #[test]
    fn const_dedup() {
        let mut b = CodeBuilder::new();
        let a = b.add_const(Value::Int(42));
        let c = b.add_const(Value::Int(42));
        let d = b.add_const(Value::Int(43));
        assert_eq!(a, c);
        assert_ne!(a, d);
    }
}
