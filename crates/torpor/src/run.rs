//! Public interface for running compiled programs.
//!
//! Two execution modes:
//! - **Simple execution**: [`Runner::run`] / [`Runner::run_with_handlers`]
//!   drive the program to completion, the latter answering each host call
//!   through the supplied handlers.
//! - **Iterative execution**: [`Runner::start`] pauses at every host call and
//!   hands back a [`RunProgress`] carrying the call plus a consumable
//!   [`Snapshot`]; `Snapshot::resume` continues with the host's answer.
//!
//! Resuming twice is impossible by construction: `resume` consumes the
//! snapshot, so the exactly-once protocol is enforced by ownership rather
//! than a runtime error.

use serde::{Deserialize, Serialize};

use crate::{
    bytecode::{FrameExit, VM},
    exception_private::{ExcType, PendingExc, RunError, RunResult},
    exception_public::Exception,
    heap::{ExcInstance, Heap, HeapData},
    intern::Interns,
    io::PrintWriter,
    object::Object,
    os::OsFunction,
    program::Program,
    resource::ResourceTracker,
    value::{exception_str, Value},
};

/// Primary interface for executing a compiled [`Program`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runner {
    program: Program,
}

impl Runner {
    /// Wraps a compiled program for execution.
    #[must_use]
    pub fn new(program: Program) -> Self {
        Self { program }
    }

    /// Serializes the runner to a binary format.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Deserializes a runner from [`Runner::dump`] output.
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Runs to completion with no host-call handlers.
    ///
    /// This is the fast path for programs that never leave the sandbox. A
    /// host call terminates execution with `NotImplementedError`, e.g.
    /// `OS function 'Path.exists' not implemented with standard execution`.
    pub fn run<T: ResourceTracker>(
        &self,
        inputs: Vec<Object>,
        tracker: T,
        print: &mut impl PrintWriter,
    ) -> Result<Object, Exception> {
        let mut heap = Heap::new(tracker);
        let globals = prepare_globals(&self.program, inputs, &mut heap)?;
        let mut vm = VM::new(heap, globals);
        let result = vm.run_module(&self.program, print);
        match result {
            Ok(FrameExit::Return(value)) => Ok(Object::from_value(&value, &vm.heap, &self.program.interns)),
            Ok(FrameExit::OsCall { function, .. }) => Err(Exception::new(
                ExcType::NotImplementedError,
                format!("OS function '{function}' not implemented with standard execution"),
            )),
            Ok(FrameExit::ExternalCall { ext_function_id, .. }) => {
                let name = self.program.interns.external_function_name(ext_function_id);
                Err(Exception::new(
                    ExcType::NotImplementedError,
                    format!("External function '{name}' not implemented with standard execution"),
                ))
            }
            Err(error) => Err(run_error_to_exception(&error, &vm.heap, &self.program.interns)),
        }
    }

    /// Runs to completion, answering host calls through the given handlers.
    ///
    /// An OS call with `os: None`, or an external call with no matching
    /// handler, raises `NotImplementedError` *inside* the interpreter (so
    /// script-level `except` blocks can catch it) with the message
    /// `OS function '<name>' not implemented`.
    pub fn run_with_handlers<T: ResourceTracker>(
        self,
        inputs: Vec<Object>,
        tracker: T,
        print: &mut impl PrintWriter,
        mut os: Option<&mut dyn OsHandler>,
        mut external: Option<&mut dyn ExternalHandler>,
    ) -> Result<Object, Exception> {
        let mut progress = self.start(inputs, tracker, print)?;
        loop {
            progress = match progress {
                RunProgress::Complete(value) => return Ok(value),
                RunProgress::OsCall {
                    function,
                    args,
                    kwargs,
                    state,
                    ..
                } => match os.as_mut() {
                    Some(handler) => match handler.os_call(function, &args, &kwargs) {
                        Ok(value) => state.resume(value, print)?,
                        Err(exception) => state.resume(exception, print)?,
                    },
                    None => state.resume(
                        Exception::new(
                            ExcType::NotImplementedError,
                            format!("OS function '{function}' not implemented"),
                        ),
                        print,
                    )?,
                },
                RunProgress::FunctionCall {
                    function_name,
                    args,
                    kwargs,
                    state,
                    ..
                } => match external.as_mut() {
                    Some(handler) => match handler.external_call(&function_name, &args, &kwargs) {
                        Ok(value) => state.resume(value, print)?,
                        Err(exception) => state.resume(exception, print)?,
                    },
                    None => state.resume(
                        Exception::new(
                            ExcType::NotImplementedError,
                            format!("External function '{function_name}' not implemented"),
                        ),
                        print,
                    )?,
                },
            };
        }
    }

    /// Starts execution, consuming self.
    ///
    /// Returns [`RunProgress::Complete`] directly when the program finishes
    /// without any host call.
    pub fn start<T: ResourceTracker>(
        self,
        inputs: Vec<Object>,
        tracker: T,
        print: &mut impl PrintWriter,
    ) -> Result<RunProgress<T>, Exception> {
        let Self { program } = self;
        let mut heap = Heap::new(tracker);
        let globals = prepare_globals(&program, inputs, &mut heap)?;
        let mut vm = VM::new(heap, globals);
        let result = vm.run_module(&program, print);
        handle_vm_result(result, program, vm)
    }
}

/// Handles OS calls for [`Runner::run_with_handlers`].
pub trait OsHandler {
    /// Performs one OS operation and returns its result.
    fn os_call(
        &mut self,
        function: OsFunction,
        args: &[Object],
        kwargs: &[(Object, Object)],
    ) -> Result<Object, Exception>;
}

impl<F> OsHandler for F
where
    F: FnMut(OsFunction, &[Object], &[(Object, Object)]) -> Result<Object, Exception>,
{
    fn os_call(
        &mut self,
        function: OsFunction,
        args: &[Object],
        kwargs: &[(Object, Object)],
    ) -> Result<Object, Exception> {
        self(function, args, kwargs)
    }
}

/// Handles external function calls for [`Runner::run_with_handlers`].
pub trait ExternalHandler {
    /// Invokes the named external function.
    fn external_call(
        &mut self,
        name: &str,
        args: &[Object],
        kwargs: &[(Object, Object)],
    ) -> Result<Object, Exception>;
}

impl<F> ExternalHandler for F
where
    F: FnMut(&str, &[Object], &[(Object, Object)]) -> Result<Object, Exception>,
{
    fn external_call(
        &mut self,
        name: &str,
        args: &[Object],
        kwargs: &[(Object, Object)],
    ) -> Result<Object, Exception> {
        self(name, args, kwargs)
    }
}

/// Result of one step of iterative execution.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: serde::de::DeserializeOwned"))]
pub enum RunProgress<T: ResourceTracker> {
    /// Execution paused for an OS-level operation.
    ///
    /// The host should perform it and call `state.resume(result)`.
    OsCall {
        /// The OS function to execute.
        function: OsFunction,
        /// Positional arguments; `args[0]` is the path for `Path.*` calls.
        args: Vec<Object>,
        /// Keyword arguments as key/value pairs.
        kwargs: Vec<(Object, Object)>,
        /// Unique identifier for this call.
        call_id: u32,
        /// The suspended state; resume it exactly once.
        state: Snapshot<T>,
    },
    /// Execution paused at a declared external function call.
    FunctionCall {
        /// The external function's declared name.
        function_name: String,
        /// Positional arguments.
        args: Vec<Object>,
        /// Keyword arguments as key/value pairs.
        kwargs: Vec<(Object, Object)>,
        /// Unique identifier for this call.
        call_id: u32,
        /// The suspended state; resume it exactly once.
        state: Snapshot<T>,
    },
    /// Execution completed with the final expression value.
    Complete(Object),
}

impl<T: ResourceTracker> RunProgress<T> {
    /// Consumes the progress, returning the final value if complete.
    #[must_use]
    pub fn into_complete(self) -> Option<Object> {
        match self {
            Self::Complete(value) => Some(value),
            _ => None,
        }
    }

    /// Whether this progress is an OS call.
    #[must_use]
    pub fn is_os_function(&self) -> bool {
        matches!(self, Self::OsCall { .. })
    }

    /// Serializes the suspended state to a binary format.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error>
    where
        T: Serialize,
    {
        postcard::to_allocvec(self)
    }

    /// Deserializes suspended state from [`RunProgress::dump`] output.
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        postcard::from_bytes(bytes)
    }
}

/// Return value or exception supplied by the host for a suspended call.
#[derive(Debug)]
pub enum ExternalResult {
    /// Continue with this return value.
    Return(Object),
    /// Raise this exception at the suspended call site.
    Error(Exception),
}

impl From<Object> for ExternalResult {
    fn from(value: Object) -> Self {
        Self::Return(value)
    }
}

impl From<Exception> for ExternalResult {
    fn from(exception: Exception) -> Self {
        Self::Error(exception)
    }
}

/// A suspended interpreter, paused at one host call.
///
/// Owns the complete execution state. [`Snapshot::resume`] consumes it, so a
/// snapshot can be resumed exactly once; keep the serialized form from
/// [`Snapshot::dump`] if you need to retry.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: serde::de::DeserializeOwned"))]
pub struct Snapshot<T: ResourceTracker> {
    program: Program,
    vm: VM<T>,
}

impl<T: ResourceTracker> Snapshot<T> {
    /// Continues execution with the host's answer to the pending call.
    pub fn resume(
        mut self,
        result: impl Into<ExternalResult>,
        print: &mut impl PrintWriter,
    ) -> Result<RunProgress<T>, Exception> {
        let outcome = match result.into() {
            ExternalResult::Return(object) => {
                let value = object
                    .to_value(&mut self.vm.heap, &self.program.interns)
                    .map_err(|error| {
                        Exception::new(ExcType::RuntimeError, format!("invalid resume value: {error}"))
                    })?;
                self.vm.resume(value, &self.program, print)
            }
            ExternalResult::Error(exception) => {
                let error = exception_to_run_error(&exception, &mut self.vm.heap);
                match error {
                    Ok(error) => self.vm.resume_with_exception(error, &self.program, print),
                    Err(error) => Err(error),
                }
            }
        };
        handle_vm_result(outcome, self.program, self.vm)
    }

    /// Serializes the suspended state.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error>
    where
        T: Serialize,
    {
        postcard::to_allocvec(self)
    }

    /// Deserializes suspended state from [`Snapshot::dump`] output.
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        postcard::from_bytes(bytes)
    }
}

/// Builds the global slot vector: external-function bindings, converted
/// inputs, then unassigned padding.
fn prepare_globals<T: ResourceTracker>(
    program: &Program,
    inputs: Vec<Object>,
    heap: &mut Heap<T>,
) -> Result<Vec<Value>, Exception> {
    if inputs.len() != program.input_count {
        return Err(Exception::new(
            ExcType::RuntimeError,
            format!("expected {} inputs, got {}", program.input_count, inputs.len()),
        ));
    }
    let mut globals = Vec::with_capacity(program.global_count());
    for index in 0..program.external_count {
        globals.push(Value::ExtFunction(crate::intern::ExtFunctionId::new(index)));
    }
    for input in inputs {
        let value = input
            .to_value(heap, &program.interns)
            .map_err(|error| Exception::new(ExcType::RuntimeError, format!("invalid input type: {error}")))?;
        globals.push(value);
    }
    globals.resize(program.global_count(), Value::Undefined);
    Ok(globals)
}

/// Converts a VM exit into host-facing progress.
fn handle_vm_result<T: ResourceTracker>(
    result: RunResult<FrameExit>,
    program: Program,
    vm: VM<T>,
) -> Result<RunProgress<T>, Exception> {
    match result {
        Ok(FrameExit::Return(value)) => {
            let object = Object::from_value(&value, &vm.heap, &program.interns);
            Ok(RunProgress::Complete(object))
        }
        Ok(FrameExit::OsCall {
            function,
            args,
            call_id,
        }) => {
            let (args, kwargs) = args.into_objects(&vm.heap, &program.interns);
            Ok(RunProgress::OsCall {
                function,
                args,
                kwargs,
                call_id: call_id.raw(),
                state: Snapshot { program, vm },
            })
        }
        Ok(FrameExit::ExternalCall {
            ext_function_id,
            args,
            call_id,
        }) => {
            let function_name = program.interns.external_function_name(ext_function_id).to_owned();
            let (args, kwargs) = args.into_objects(&vm.heap, &program.interns);
            Ok(RunProgress::FunctionCall {
                function_name,
                args,
                kwargs,
                call_id: call_id.raw(),
                state: Snapshot { program, vm },
            })
        }
        Err(error) => Err(run_error_to_exception(&error, &vm.heap, &program.interns)),
    }
}

/// Converts an unhandled interpreter error into the host-visible exception.
fn run_error_to_exception<T: ResourceTracker>(error: &RunError, heap: &Heap<T>, interns: &Interns) -> Exception {
    match error {
        RunError::Exc(PendingExc::Simple(simple)) => match &simple.message {
            Some(message) => Exception::new(simple.exc_type, message.clone()),
            None => Exception::bare(simple.exc_type),
        },
        RunError::Exc(PendingExc::Instance(id)) => match heap.get(*id) {
            HeapData::Exception(instance) => {
                let message = exception_str(instance, heap, interns);
                if message.is_empty() {
                    Exception::bare(instance.exc_type)
                } else {
                    Exception::new(instance.exc_type, message)
                }
            }
            _ => Exception::new(ExcType::RuntimeError, "invalid exception reference"),
        },
        RunError::Resource(resource) => Exception::new(resource.exc_type(), resource.message()),
        RunError::Internal(message) => Exception::new(ExcType::RuntimeError, message.clone()),
    }
}

/// Converts a host-supplied exception into a raisable interpreter error.
fn exception_to_run_error<T: ResourceTracker>(exception: &Exception, heap: &mut Heap<T>) -> RunResult<RunError> {
    let args = match exception.message() {
        Some(message) => vec![heap.allocate_value(HeapData::Str(message.to_owned()))?],
        None => Vec::new(),
    };
    let id = heap.allocate(HeapData::Exception(ExcInstance {
        exc_type: exception.exc_type(),
        args,
    }))?;
    Ok(RunError::Exc(PendingExc::Instance(id)))
}
