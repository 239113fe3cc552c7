//! The bytecode virtual machine.
//!
//! The VM is a re-entrant state machine, not a recursive evaluator: every
//! call pushes a [`Frame`] onto an explicit frame stack, and each frame owns
//! its locals, operand stack, and instruction pointer. That is what makes
//! suspension work — a host call can occur arbitrarily deep inside expression
//! evaluation, and the whole machine (frames, stacks, heap, scheduler) is
//! plain data that can be parked, serialized, and resumed.

mod attr;
mod binary;
mod call;
mod collections;
mod compare;
mod exceptions;
mod scheduler;

use serde::{Deserialize, Serialize};

use call::CallResult;
use scheduler::Scheduler;

use crate::{
    args::ArgValues,
    asyncio::CallId,
    bytecode::{
        code::Code,
        op::{BinaryOpKind, CompareOpKind, Opcode},
    },
    exception_private::{ExcType, RunError, RunResult},
    heap::{Heap, HeapId},
    intern::{ExtFunctionId, FunctionId, StringId},
    io::PrintWriter,
    os::OsFunction,
    program::Program,
    resource::ResourceTracker,
    types::iter::{advance, make_iter},
    value::Value,
};

/// Result of VM execution.
pub(crate) enum FrameExit {
    /// Execution completed with the module's final value.
    Return(Value),

    /// Execution paused for an OS call.
    ///
    /// The embedder should perform the operation and resume with its result.
    OsCall {
        /// Which OS function to perform.
        function: OsFunction,
        /// Arguments, path first for `Path.*` calls.
        args: ArgValues,
        /// Unique id for this call.
        call_id: CallId,
    },

    /// Execution paused for an external function call.
    ExternalCall {
        /// Which declared external function.
        ext_function_id: ExtFunctionId,
        /// Call arguments.
        args: ArgValues,
        /// Unique id for this call.
        call_id: CallId,
    },
}

/// Outcome of the internal dispatch loop.
enum ExecOutcome {
    /// Left the loop entirely (module done or host call).
    Exit(FrameExit),
    /// A nested synchronous call returned this value.
    SyncReturn(Value),
}

/// Which code object a frame executes.
///
/// Frames reference code by id rather than by borrow so the whole frame
/// stack is owned data and serializes with the snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) enum CodeSource {
    /// The module body.
    Module,
    /// A compiled function body.
    Function(FunctionId),
}

/// A single function activation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Frame {
    /// Code being executed.
    code: CodeSource,
    /// Instruction pointer into the code's bytecode.
    ip: usize,
    /// Local variable slots.
    locals: Vec<Value>,
    /// Operand stack.
    stack: Vec<Value>,
    /// The exception being handled, for bare `raise`.
    current_exc: Option<Value>,
    /// The coroutine this frame executes, if it is a coroutine body.
    coroutine: Option<HeapId>,
}

impl Frame {
    /// Creates the module-level frame.
    fn module(num_locals: u16) -> Self {
        Self {
            code: CodeSource::Module,
            ip: 0,
            locals: vec![Value::Undefined; usize::from(num_locals)],
            stack: Vec::new(),
            current_exc: None,
            coroutine: None,
        }
    }

    /// Creates a function frame with pre-bound locals.
    fn function(function_id: FunctionId, locals: Vec<Value>) -> Self {
        Self {
            code: CodeSource::Function(function_id),
            ip: 0,
            locals,
            stack: Vec::new(),
            current_exc: None,
            coroutine: None,
        }
    }

    /// Creates a frame executing a coroutine body.
    fn coroutine(function_id: FunctionId, locals: Vec<Value>, coroutine_id: HeapId) -> Self {
        Self {
            coroutine: Some(coroutine_id),
            ..Self::function(function_id, locals)
        }
    }
}

/// The virtual machine: heap, globals, frame stack, and task scheduler.
///
/// Everything here is owned data; a suspended `VM` inside a snapshot is the
/// complete interpreter state.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: serde::de::DeserializeOwned"))]
pub(crate) struct VM<T: ResourceTracker> {
    /// The object registry.
    pub(crate) heap: Heap<T>,
    /// Global namespace slots, laid out per the program's declarations.
    pub(crate) globals: Vec<Value>,
    /// Frames of the currently running task.
    frames: Vec<Frame>,
    /// Cooperative task scheduler for `gather`.
    scheduler: Scheduler,
    /// Next host-call correlation id.
    next_call_id: u32,
    /// Frame-stack floor for nested synchronous calls (sort keys etc.).
    /// Always 0 while suspendable code runs, so it is not serialized.
    #[serde(skip)]
    sync_floor: usize,
}

impl<T: ResourceTracker> VM<T> {
    /// Creates a VM with the given heap and prepared globals.
    pub fn new(heap: Heap<T>, globals: Vec<Value>) -> Self {
        Self {
            heap,
            globals,
            frames: Vec::new(),
            scheduler: Scheduler::new(),
            next_call_id: 0,
            sync_floor: 0,
        }
    }

    /// Starts executing the module body.
    pub fn run_module(&mut self, program: &Program, print: &mut impl PrintWriter) -> RunResult<FrameExit> {
        self.frames.push(Frame::module(program.module_num_locals()));
        self.run(program, print)
    }

    /// Continues dispatch until completion or the next host call.
    pub fn run(&mut self, program: &Program, print: &mut impl PrintWriter) -> RunResult<FrameExit> {
        match self.execute(program, print)? {
            ExecOutcome::Exit(exit) => Ok(exit),
            ExecOutcome::SyncReturn(_) => Err(RunError::internal("sync return escaped dispatch")),
        }
    }

    /// Resumes after a host call with the call's result.
    ///
    /// Pushes the value where the suspended call left its stack, rotates the
    /// ready queue when the call happened inside a gathered task, and
    /// continues dispatch.
    pub fn resume(&mut self, value: Value, program: &Program, print: &mut impl PrintWriter) -> RunResult<FrameExit> {
        self.push(value);
        self.rotate_after_resume();
        self.run(program, print)
    }

    /// Resumes after a host call that raised instead of returning.
    ///
    /// The exception surfaces at the suspended call site, where script
    /// handlers can catch it.
    pub fn resume_with_exception(
        &mut self,
        error: RunError,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<FrameExit> {
        self.raise_and_continue(error, program, print)
    }

    /// Allocates the next host-call id.
    fn allocate_call_id(&mut self) -> CallId {
        let id = CallId::new(self.next_call_id);
        self.next_call_id += 1;
        id
    }

    /// The currently executing frame.
    fn top(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("dispatch with empty frame stack")
    }

    /// Pushes onto the current operand stack.
    pub(super) fn push(&mut self, value: Value) {
        self.top().stack.push(value);
    }

    /// Pops from the current operand stack.
    pub(super) fn pop(&mut self) -> RunResult<Value> {
        self.top()
            .stack
            .pop()
            .ok_or_else(|| RunError::internal("operand stack underflow"))
    }

    /// Resolves the current frame's code object.
    fn code<'p>(&self, program: &'p Program) -> &'p Code {
        match self.frames.last().expect("dispatch with empty frame stack").code {
            CodeSource::Module => &program.module,
            CodeSource::Function(id) => &program.interns.function(id).code,
        }
    }

    /// Fetches the next byte, advancing the instruction pointer.
    fn fetch_u8(&mut self, program: &Program) -> u8 {
        let byte = {
            let code = self.code(program);
            let frame = self.frames.last().expect("dispatch with empty frame stack");
            code.bytecode()[frame.ip]
        };
        self.top().ip += 1;
        byte
    }

    /// Fetches a little-endian u16 operand.
    fn fetch_u16(&mut self, program: &Program) -> u16 {
        let lo = self.fetch_u8(program);
        let hi = self.fetch_u8(program);
        u16::from_le_bytes([lo, hi])
    }

    /// Fetches a little-endian i16 operand.
    fn fetch_i16(&mut self, program: &Program) -> i16 {
        let lo = self.fetch_u8(program);
        let hi = self.fetch_u8(program);
        i16::from_le_bytes([lo, hi])
    }

    /// Applies a relative jump to the current instruction pointer.
    fn jump(&mut self, offset: i16) {
        let frame = self.top();
        let ip = i64::try_from(frame.ip).expect("ip exceeds i64") + i64::from(offset);
        frame.ip = usize::try_from(ip).expect("jump to negative ip");
    }

    /// The main dispatch loop.
    ///
    /// Runs until the module returns, a host call suspends execution, or —
    /// when `sync_floor` is raised — a nested synchronous call returns.
    #[expect(clippy::too_many_lines, reason = "single dispatch table")]
    fn execute(&mut self, program: &Program, print: &mut impl PrintWriter) -> RunResult<ExecOutcome> {
        loop {
            let op_byte = self.fetch_u8(program);
            let op = Opcode::from_repr(op_byte)
                .ok_or_else(|| RunError::internal(format!("unknown opcode {op_byte:#04x}")))?;

            let step = self.step(op, program, print);
            match step {
                Ok(StepFlow::Continue) => {}
                Ok(StepFlow::Exit(exit)) => return Ok(ExecOutcome::Exit(exit)),
                Ok(StepFlow::SyncReturn(value)) => return Ok(ExecOutcome::SyncReturn(value)),
                Err(error) => {
                    if let Some(unhandled) = self.handle_exception(error, program)? {
                        return Err(unhandled);
                    }
                    // A handler was entered; dispatch continues there.
                }
            }
        }
    }

    /// Executes one instruction.
    fn step(
        &mut self,
        op: Opcode,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<StepFlow> {
        match op {
            Opcode::Nop => {}
            Opcode::LoadConst => {
                let index = self.fetch_u16(program);
                let value = self.code(program).constant(index).clone();
                self.push(value);
            }
            Opcode::LoadLocal => {
                let slot = self.fetch_u16(program);
                let value = self.top().locals[usize::from(slot)].clone();
                if matches!(value, Value::Undefined) {
                    let name = self
                        .code(program)
                        .local_name(slot)
                        .map_or_else(|| format!("<slot {slot}>"), |id| program.interns.get_str(id).to_owned());
                    return Err(ExcType::unbound_local(&name));
                }
                self.push(value);
            }
            Opcode::StoreLocal => {
                let slot = self.fetch_u16(program);
                let value = self.pop()?;
                self.top().locals[usize::from(slot)] = value;
            }
            Opcode::LoadGlobal => {
                let slot = self.fetch_u16(program);
                let value = self.globals[usize::from(slot)].clone();
                if matches!(value, Value::Undefined) {
                    // Unassigned slot: fall back to the builtin of this name.
                    let name = program.global_name(slot);
                    match crate::builtins::Builtins::from_name(name) {
                        Some(builtin) => self.push(Value::Builtin(builtin)),
                        None => return Err(ExcType::name_error(name)),
                    }
                } else {
                    self.push(value);
                }
            }
            Opcode::StoreGlobal => {
                let slot = self.fetch_u16(program);
                let value = self.pop()?;
                self.globals[usize::from(slot)] = value;
            }
            Opcode::PopTop => {
                self.pop()?;
            }
            Opcode::DupTop => {
                let value = self
                    .top()
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| RunError::internal("DupTop on empty stack"))?;
                self.push(value);
            }
            Opcode::UnaryNot => {
                let value = self.pop()?;
                let truthy = value.py_bool(&self.heap, &program.interns);
                self.push(Value::Bool(!truthy));
            }
            Opcode::UnaryNeg | Opcode::UnaryPos | Opcode::UnaryInvert => {
                let value = self.pop()?;
                let result = self.unary_op(op, value, program)?;
                self.push(result);
            }
            Opcode::BinaryOp => {
                let kind_byte = self.fetch_u8(program);
                let kind = BinaryOpKind::from_repr(kind_byte)
                    .ok_or_else(|| RunError::internal(format!("unknown binary op {kind_byte}")))?;
                let right = self.pop()?;
                let left = self.pop()?;
                let result = self.binary_op(kind, left, right, program)?;
                self.push(result);
            }
            Opcode::CompareOp => {
                let kind_byte = self.fetch_u8(program);
                let kind = CompareOpKind::from_repr(kind_byte)
                    .ok_or_else(|| RunError::internal(format!("unknown compare op {kind_byte}")))?;
                let right = self.pop()?;
                let left = self.pop()?;
                let result = self.compare_op(kind, left, right, program)?;
                self.push(result);
            }
            Opcode::BuildTuple | Opcode::BuildList | Opcode::BuildDict | Opcode::BuildSet => {
                let count = self.fetch_u16(program);
                let value = self.build_container(op, count, program)?;
                self.push(value);
            }
            Opcode::ListAppend | Opcode::ListExtend | Opcode::ListToTuple | Opcode::SetAdd
            | Opcode::SetUpdate | Opcode::DictUpdate => {
                self.container_splat(op, program)?;
            }
            Opcode::Jump => {
                let offset = self.fetch_i16(program);
                self.jump(offset);
            }
            Opcode::PopJumpIfFalse => {
                let offset = self.fetch_i16(program);
                let value = self.pop()?;
                if !value.py_bool(&self.heap, &program.interns) {
                    self.jump(offset);
                }
            }
            Opcode::PopJumpIfTrue => {
                let offset = self.fetch_i16(program);
                let value = self.pop()?;
                if value.py_bool(&self.heap, &program.interns) {
                    self.jump(offset);
                }
            }
            Opcode::GetIter => {
                let value = self.pop()?;
                let iter = make_iter(&mut self.heap, value, &program.interns)?;
                self.push(iter);
            }
            Opcode::ForIter => {
                let offset = self.fetch_i16(program);
                let iter_value = self
                    .top()
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| RunError::internal("ForIter on empty stack"))?;
                let Value::Ref(iter_id) = iter_value else {
                    return Err(RunError::internal("ForIter on non-iterator"));
                };
                match advance(&mut self.heap, iter_id, &program.interns)? {
                    Some(item) => self.push(item),
                    None => {
                        self.pop()?;
                        self.jump(offset);
                    }
                }
            }
            Opcode::LoadAttr => {
                let name = self.fetch_u16(program);
                let owner = self.pop()?;
                let value = self.load_attr(owner, StringId::new(usize::from(name)), program)?;
                self.push(value);
            }
            Opcode::StoreAttr => {
                let name = self.fetch_u16(program);
                let owner = self.pop()?;
                let value = self.pop()?;
                self.store_attr(owner, StringId::new(usize::from(name)), value, program)?;
            }
            Opcode::LoadSubscr => {
                let key = self.pop()?;
                let container = self.pop()?;
                let value = self.load_subscr(container, key, program)?;
                self.push(value);
            }
            Opcode::StoreSubscr => {
                let key = self.pop()?;
                let container = self.pop()?;
                let value = self.pop()?;
                self.store_subscr(container, key, value, program)?;
            }
            Opcode::CallFunction => {
                let argc = self.fetch_u8(program);
                let args = self.pop_positional(argc)?;
                let callee = self.pop()?;
                return self.finish_call(callee, args, program, print);
            }
            Opcode::CallFunctionKw => {
                let argc = self.fetch_u8(program);
                let kw_index = self.fetch_u16(program);
                let args = self.pop_keyword_call(argc, kw_index, program)?;
                let callee = self.pop()?;
                return self.finish_call(callee, args, program, print);
            }
            Opcode::CallFunctionEx => {
                let flags = self.fetch_u8(program);
                let args = self.pop_splat_call(flags, program)?;
                let callee = self.pop()?;
                return self.finish_call(callee, args, program, print);
            }
            Opcode::Return => {
                let value = self.pop()?;
                return self.finish_return(value);
            }
            Opcode::Raise => {
                let argc = self.fetch_u8(program);
                return Err(self.build_raise(argc, program)?);
            }
            Opcode::ExcMatch => {
                let handler_type = self.pop()?;
                let exc = self
                    .top()
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| RunError::internal("ExcMatch with no exception on stack"))?;
                let matched = self.exc_match(&exc, &handler_type, program)?;
                self.push(Value::Bool(matched));
            }
            Opcode::Await => {
                let awaitable = self.pop()?;
                return self.execute_await(awaitable, program);
            }
        }
        Ok(StepFlow::Continue)
    }

    /// Pops `argc` positional arguments in call order.
    fn pop_positional(&mut self, argc: u8) -> RunResult<ArgValues> {
        let mut values = Vec::with_capacity(usize::from(argc));
        for _ in 0..argc {
            values.push(self.pop()?);
        }
        values.reverse();
        Ok(ArgValues::from_positional(values))
    }

    /// Completes a call instruction from its [`CallResult`].
    fn finish_call(
        &mut self,
        callee: Value,
        args: ArgValues,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<StepFlow> {
        match self.call_value(callee, args, program, print)? {
            CallResult::Value(value) => {
                self.push(value);
                Ok(StepFlow::Continue)
            }
            CallResult::FramePushed => Ok(StepFlow::Continue),
            CallResult::OsCall(function, args) => {
                if self.sync_floor > 0 {
                    return Err(ExcType::runtime_error("host call not allowed in this context"));
                }
                let call_id = self.allocate_call_id();
                Ok(StepFlow::Exit(FrameExit::OsCall {
                    function,
                    args,
                    call_id,
                }))
            }
            CallResult::External(ext_function_id, args) => {
                if self.sync_floor > 0 {
                    return Err(ExcType::runtime_error("host call not allowed in this context"));
                }
                let call_id = self.allocate_call_id();
                Ok(StepFlow::Exit(FrameExit::ExternalCall {
                    ext_function_id,
                    args,
                    call_id,
                }))
            }
        }
    }

    /// Handles `Return`: frame teardown, coroutine completion, task and
    /// module completion.
    fn finish_return(&mut self, value: Value) -> RunResult<StepFlow> {
        let frame = self.frames.pop().expect("return with empty frame stack");

        if let Some(coroutine_id) = frame.coroutine {
            self.mark_coroutine_complete(coroutine_id, value.clone());
        }

        if self.sync_floor > 0 && self.frames.len() == self.sync_floor {
            return Ok(StepFlow::SyncReturn(value));
        }

        if self.frames.is_empty() {
            if self.scheduler.on_main_task() {
                return Ok(StepFlow::Exit(FrameExit::Return(value)));
            }
            // A gathered task finished; record its result and keep going.
            return self.finish_task(value);
        }

        self.push(value);
        Ok(StepFlow::Continue)
    }

    /// Runs a callable to completion on a nested frame floor.
    ///
    /// Used by builtins that invoke user code (`sorted` keys, `map`,
    /// `filter`). Host calls and gather awaits cannot suspend here; they
    /// raise `RuntimeError` instead.
    pub(super) fn call_sync(
        &mut self,
        callee: Value,
        args: ArgValues,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<Value> {
        match self.call_value(callee, args, program, print)? {
            CallResult::Value(value) => Ok(value),
            CallResult::OsCall(..) | CallResult::External(..) => {
                Err(ExcType::runtime_error("host call not allowed in this context"))
            }
            CallResult::FramePushed => {
                let saved_floor = self.sync_floor;
                self.sync_floor = self.frames.len() - 1;
                let outcome = self.execute(program, print);
                self.sync_floor = saved_floor;
                match outcome? {
                    ExecOutcome::SyncReturn(value) => Ok(value),
                    ExecOutcome::Exit(_) => Err(RunError::internal("nested call escaped its frame floor")),
                }
            }
        }
    }

    /// Raises an error at the current point and continues dispatch if a
    /// handler catches it.
    fn raise_and_continue(
        &mut self,
        error: RunError,
        program: &Program,
        print: &mut impl PrintWriter,
    ) -> RunResult<FrameExit> {
        if let Some(unhandled) = self.handle_exception(error, program)? {
            return Err(unhandled);
        }
        self.run(program, print)
    }
}

/// Flow control for a single instruction step.
enum StepFlow {
    Continue,
    Exit(FrameExit),
    SyncReturn(Value),
}
