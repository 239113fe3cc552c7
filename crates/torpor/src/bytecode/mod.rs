//! Bytecode representation and virtual machine.
//!
//! - `op` - opcode definitions
//! - `code` - code objects (instructions + constant pool + exception table)
//! - `builder` - `CodeBuilder` used by the external compiler front end
//! - `vm` - the stack-based virtual machine

pub use builder::{CodeBuilder, JumpLabel};
pub use code::Code;
pub use op::{BinaryOpKind, CompareOpKind, Opcode};
pub(crate) use vm::{FrameExit, VM};

mod builder;
mod code;
mod op;
pub(crate) mod vm;
