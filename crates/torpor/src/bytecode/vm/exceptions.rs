//! Raising, handler lookup, and frame unwinding.
//!
//! Handlers come from each code object's static exception table; there are no
//! runtime setup/pop instructions. When an exception is raised the VM walks
//! the current task's frames innermost-first: the first table entry covering
//! the faulting offset wins, the operand stack is cut back to the entry's
//! recorded depth, and the exception value is pushed for the handler.

use crate::{
    builtins::Builtins,
    exception_private::{ExcType, PendingExc, RunError, RunResult},
    heap::{ExcInstance, HeapData},
    program::Program,
    resource::ResourceTracker,
    value::Value,
};

use super::VM;

impl<T: ResourceTracker> VM<T> {
    /// Builds the error for a `Raise` instruction.
    pub(super) fn build_raise(&mut self, argc: u8, _program: &Program) -> RunResult<RunError> {
        match argc {
            0 => {
                // Bare `raise`: re-raise the exception being handled.
                let current = self.frames.iter().rev().find_map(|frame| frame.current_exc.clone());
                match current {
                    Some(Value::Ref(id)) => Ok(RunError::Exc(PendingExc::Instance(id))),
                    _ => Ok(ExcType::runtime_error("No active exception to re-raise")),
                }
            }
            1 => {
                let value = self.pop()?;
                match &value {
                    Value::Ref(id) if matches!(self.heap.get(*id), HeapData::Exception(_)) => {
                        Ok(RunError::Exc(PendingExc::Instance(*id)))
                    }
                    // `raise ValueError` constructs a bare instance.
                    Value::Builtin(Builtins::ExcType(exc_type)) => {
                        let id = self.heap.allocate(HeapData::Exception(ExcInstance {
                            exc_type: *exc_type,
                            args: Vec::new(),
                        }))?;
                        Ok(RunError::Exc(PendingExc::Instance(id)))
                    }
                    _ => Ok(ExcType::type_error("exceptions must derive from BaseException")),
                }
            }
            _ => Err(RunError::internal(format!("Raise with argc {argc}"))),
        }
    }

    /// Tests an exception value against a handler type (or tuple of types).
    pub(super) fn exc_match(&self, exc: &Value, handler: &Value, _program: &Program) -> RunResult<bool> {
        let exc_type = match exc {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Exception(instance) => instance.exc_type,
                _ => return Err(RunError::internal("ExcMatch on non-exception")),
            },
            _ => return Err(RunError::internal("ExcMatch on non-exception")),
        };
        match handler {
            Value::Builtin(Builtins::ExcType(handler_type)) => Ok(exc_type.is_subclass_of(*handler_type)),
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Tuple(handlers) => {
                    for candidate in handlers {
                        match candidate {
                            Value::Builtin(Builtins::ExcType(handler_type)) => {
                                if exc_type.is_subclass_of(*handler_type) {
                                    return Ok(true);
                                }
                            }
                            _ => return Err(catch_non_class_error()),
                        }
                    }
                    Ok(false)
                }
                _ => Err(catch_non_class_error()),
            },
            _ => Err(catch_non_class_error()),
        }
    }

    /// Unwinds after an error.
    ///
    /// Returns `Ok(None)` when a handler was entered (dispatch continues
    /// there) and `Ok(Some(err))` when the exception escaped the main task.
    /// Task failures are routed to their gather's awaiter and unwinding
    /// continues in that context.
    pub(super) fn handle_exception(&mut self, error: RunError, program: &Program) -> RunResult<Option<RunError>> {
        let mut error = error;
        loop {
            // Internal errors are never catchable by script handlers.
            if matches!(error, RunError::Internal(_)) {
                return Ok(Some(error));
            }
            // Walk the current context's frames innermost-first. The ip has
            // already advanced past the faulting instruction's operands, so
            // probe the table with the last byte it consumed.
            while let Some(frame) = self.frames.last() {
                let ip = u32::try_from(frame.ip.saturating_sub(1))
                    .map_err(|_| RunError::internal("ip exceeds u32"))?;
                let entry = self.code(program).find_exception_handler(ip).copied();
                if let Some(entry) = entry {
                    let exc_value = self.materialize_exception(&error)?;
                    let frame = self.top();
                    frame.stack.truncate(usize::from(entry.stack_depth()));
                    frame.stack.push(exc_value.clone());
                    frame.ip = entry.handler() as usize;
                    frame.current_exc = Some(exc_value);
                    return Ok(None);
                }
                let popped = self.frames.pop().expect("frame checked above");
                if let Some(coroutine_id) = popped.coroutine {
                    self.mark_coroutine_failed(coroutine_id);
                }
                if self.sync_floor > 0 && self.frames.len() == self.sync_floor {
                    // Nested synchronous call unwound completely: hand the
                    // error back to the builtin that started it; outer
                    // frames may still catch it.
                    return Ok(Some(error));
                }
            }
            // The current context ran out of frames.
            if self.scheduler.on_main_task() {
                return Ok(Some(error));
            }
            // A gathered task failed: siblings are dropped and the exception
            // continues unwinding in the awaiting context.
            error = self.fail_task(error)?;
        }
    }

    /// Allocates (or reuses) the heap instance for a propagating error.
    pub(super) fn materialize_exception(&mut self, error: &RunError) -> RunResult<Value> {
        match error {
            RunError::Exc(PendingExc::Instance(id)) => Ok(Value::Ref(*id)),
            RunError::Exc(PendingExc::Simple(simple)) => {
                let args = match &simple.message {
                    Some(message) => {
                        vec![self.heap.allocate_value(HeapData::Str(message.clone()))?]
                    }
                    None => Vec::new(),
                };
                Ok(self.heap.allocate_value(HeapData::Exception(ExcInstance {
                    exc_type: simple.exc_type,
                    args,
                }))?)
            }
            RunError::Resource(resource) => {
                let message = self
                    .heap
                    .allocate_value(HeapData::Str(resource.message().to_owned()))?;
                Ok(self.heap.allocate_value(HeapData::Exception(ExcInstance {
                    exc_type: resource.exc_type(),
                    args: vec![message],
                }))?)
            }
            RunError::Internal(message) => {
                let message = self.heap.allocate_value(HeapData::Str(message.clone()))?;
                Ok(self.heap.allocate_value(HeapData::Exception(ExcInstance {
                    exc_type: ExcType::RuntimeError,
                    args: vec![message],
                }))?)
            }
        }
    }
}

/// The canonical error for `except <non-class>`.
fn catch_non_class_error() -> RunError {
    ExcType::type_error("catching classes that do not inherit from BaseException is not allowed")
}
