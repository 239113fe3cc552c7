//! Opcode definitions.
//!
//! Instructions are byte-encoded: a 1-byte opcode followed by 0-3 operand
//! bytes. Indices are little-endian `u16`; jump offsets are signed `i16`
//! relative to the instruction pointer *after* the operand.

use serde::{Deserialize, Serialize};
use strum::FromRepr;

/// One instruction's opcode. Operand widths are documented per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// Push constant; operand: u16 const-pool index.
    LoadConst,
    /// Push a local slot; operand: u16 slot. Unassigned slot raises
    /// UnboundLocalError.
    LoadLocal,
    /// Pop into a local slot; operand: u16 slot.
    StoreLocal,
    /// Push a global slot, falling back to the builtin table while the slot
    /// is unassigned; operand: u16 slot.
    LoadGlobal,
    /// Pop into a global slot; operand: u16 slot.
    StoreGlobal,

    /// Pop and discard.
    PopTop,
    /// Duplicate the top of stack.
    DupTop,

    /// Logical not.
    UnaryNot,
    /// Numeric negation.
    UnaryNeg,
    /// Numeric identity (`+x`).
    UnaryPos,
    /// Bitwise invert.
    UnaryInvert,
    /// Binary arithmetic; operand: u8 [`BinaryOpKind`].
    BinaryOp,
    /// Comparison / membership / identity; operand: u8 [`CompareOpKind`].
    CompareOp,

    /// Pop n values, push a tuple; operand: u16 n.
    BuildTuple,
    /// Pop n values, push a list; operand: u16 n.
    BuildList,
    /// Pop n key/value pairs, push a dict; operand: u16 n.
    BuildDict,
    /// Pop n values, push a set; operand: u16 n.
    BuildSet,
    /// Pop item, append to the list below it.
    ListAppend,
    /// Pop iterable, extend the list below it (splat element).
    ListExtend,
    /// Pop a list, push a tuple of its items.
    ListToTuple,
    /// Pop item, add to the set below it.
    SetAdd,
    /// Pop iterable, update the set below it (splat element).
    SetUpdate,
    /// Pop mapping, merge into the dict below it (`**` splat).
    DictUpdate,

    /// Unconditional jump; operand: i16 offset.
    Jump,
    /// Pop; jump when falsey; operand: i16 offset.
    PopJumpIfFalse,
    /// Pop; jump when truthy; operand: i16 offset.
    PopJumpIfTrue,

    /// Pop a value, push an iterator over it.
    GetIter,
    /// Advance the iterator at top of stack: push the next value, or pop the
    /// iterator and jump on exhaustion; operand: i16 offset.
    ForIter,

    /// Push an attribute of the popped object; operand: u16 interned name.
    LoadAttr,
    /// Pop owner then value, assign `owner.attr = value`; operand: u16
    /// interned name.
    StoreAttr,
    /// Pop key then container, push `container[key]`.
    LoadSubscr,
    /// Pop key, container, value, assign `container[key] = value`.
    StoreSubscr,

    /// Call with positional args; operand: u8 argc. Stack: callee, args...
    CallFunction,
    /// Call with keywords; operands: u8 argc, u16 kw-names index. The last
    /// `len(kw_names)` of the argc values are keyword values.
    CallFunctionKw,
    /// Call with splatted args; operand: u8 flags (bit 0: kwargs dict on
    /// stack above the args list).
    CallFunctionEx,

    /// Return top of stack from the current frame.
    Return,

    /// Raise; operand: u8 argc (0: bare re-raise, 1: pop exception or type).
    Raise,
    /// Pop a handler type, test the exception below it, push bool.
    ExcMatch,

    /// Await the popped awaitable (coroutine or gather future).
    Await,

    /// No operation.
    Nop,
}

/// Binary operator operands for [`Opcode::BinaryOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum BinaryOpKind {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
}

/// Comparison operands for [`Opcode::CompareOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompareOpKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}
