//! Shared helpers for integration tests.
//!
//! The compiler front end lives outside this crate, so tests assemble
//! programs directly through `ProgramBuilder`/`CodeBuilder`. `ModuleBuilder`
//! wraps the pair with name caching so test bodies read close to the Python
//! they encode.

use std::collections::HashMap;

use torpor::{
    CodeBuilder, CollectStringPrint, Exception, NoLimitTracker, Object, Opcode, OsFunction, Program, ProgramBuilder,
    RunProgress, Runner, Snapshot,
};

/// Builder for a test program's module body.
pub struct ModuleBuilder {
    pub pb: ProgramBuilder,
    pub cb: CodeBuilder,
    globals: HashMap<String, u16>,
}

#[allow(dead_code, reason = "not every test file uses every helper")]
impl ModuleBuilder {
    pub fn new() -> Self {
        Self {
            pb: ProgramBuilder::new(),
            cb: CodeBuilder::new(),
            globals: HashMap::new(),
        }
    }

    /// Declares (once) and returns the slot of a plain global.
    pub fn global(&mut self, name: &str) -> u16 {
        if let Some(&slot) = self.globals.get(name) {
            return slot;
        }
        let slot = self.pb.declare_global(name);
        self.globals.insert(name.to_owned(), slot);
        slot
    }

    /// Emits `LoadGlobal name` (builtins resolve through the fallback).
    pub fn load_global(&mut self, name: &str) {
        let slot = self.global(name);
        self.cb.emit_u16(Opcode::LoadGlobal, slot);
    }

    /// Emits `StoreGlobal name`.
    pub fn store_global(&mut self, name: &str) {
        let slot = self.global(name);
        self.cb.emit_u16(Opcode::StoreGlobal, slot);
    }

    /// Emits `LoadConst` for a string literal.
    pub fn load_str(&mut self, value: &str) {
        let id = self.pb.intern_str(value);
        let index = self.cb.const_str(id);
        self.cb.emit_u16(Opcode::LoadConst, index);
    }

    /// Emits `LoadConst` for an int literal.
    pub fn load_int(&mut self, value: i64) {
        let index = self.cb.const_int(value);
        self.cb.emit_u16(Opcode::LoadConst, index);
    }

    /// Emits `LoadConst` for a float literal.
    pub fn load_float(&mut self, value: f64) {
        let index = self.cb.const_float(value);
        self.cb.emit_u16(Opcode::LoadConst, index);
    }

    /// Emits `LoadConst None`.
    pub fn load_none(&mut self) {
        let index = self.cb.const_none();
        self.cb.emit_u16(Opcode::LoadConst, index);
    }

    /// Emits `LoadConst` for a bool literal.
    pub fn load_bool(&mut self, value: bool) {
        let index = self.cb.const_bool(value);
        self.cb.emit_u16(Opcode::LoadConst, index);
    }

    /// Emits `LoadAttr name`.
    pub fn attr(&mut self, name: &str) {
        let id = self.pb.intern_str(name);
        let operand = u16::try_from(id.index()).expect("intern id fits u16");
        self.cb.emit_u16(Opcode::LoadAttr, operand);
    }

    /// Emits `StoreAttr name` (stack: value, owner).
    pub fn store_attr(&mut self, name: &str) {
        let id = self.pb.intern_str(name);
        let operand = u16::try_from(id.index()).expect("intern id fits u16");
        self.cb.emit_u16(Opcode::StoreAttr, operand);
    }

    /// Emits `CallFunction argc`.
    pub fn call(&mut self, argc: u8) {
        self.cb.emit_u8(Opcode::CallFunction, argc);
    }

    /// Emits `Return`.
    pub fn ret(&mut self) {
        self.cb.emit(Opcode::Return);
    }

    /// Finishes the program.
    pub fn finish(self) -> Program {
        let Self { pb, cb, .. } = self;
        pb.build(cb.build())
    }
}

/// Starts a program with no inputs, panicking on pre-run errors.
#[allow(dead_code, reason = "not every test file uses every helper")]
pub fn start(program: Program) -> RunProgress<NoLimitTracker> {
    Runner::new(program)
        .start(vec![], NoLimitTracker, &mut CollectStringPrint::new())
        .expect("start failed")
}

/// Runs a program with no inputs to completion via the fast path.
#[allow(dead_code, reason = "not every test file uses every helper")]
pub fn run(program: Program) -> Result<Object, Exception> {
    Runner::new(program).run(vec![], NoLimitTracker, &mut CollectStringPrint::new())
}

/// Unwraps completed progress.
#[allow(dead_code, reason = "not every test file uses every helper")]
pub fn complete(progress: RunProgress<NoLimitTracker>) -> Object {
    progress.into_complete().expect("expected Complete")
}

/// Unwraps an OS-call suspension.
#[allow(dead_code, reason = "not every test file uses every helper")]
pub fn expect_os_call(
    progress: RunProgress<NoLimitTracker>,
) -> (OsFunction, Vec<Object>, Snapshot<NoLimitTracker>) {
    match progress {
        RunProgress::OsCall {
            function, args, state, ..
        } => (function, args, state),
        other => panic!("expected OsCall, got {other:?}"),
    }
}

/// Resumes a snapshot with a plain return value.
#[allow(dead_code, reason = "not every test file uses every helper")]
pub fn resume(state: Snapshot<NoLimitTracker>, value: Object) -> RunProgress<NoLimitTracker> {
    state
        .resume(value, &mut CollectStringPrint::new())
        .expect("resume failed")
}
