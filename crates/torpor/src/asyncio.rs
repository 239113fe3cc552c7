//! Async/await support types.
//!
//! Coroutines and gather futures are heap objects; the scheduler that steps
//! them lives in [`crate::bytecode::vm`]. All "I/O" is synchronous host
//! callbacks, so scheduling is fully deterministic.

use serde::{Deserialize, Serialize};

use crate::{intern::FunctionId, value::Value};

/// Unique identifier for host calls (OS and external), for correlation.
///
/// Sequential integers allocated by the VM; the counter always increments so
/// ids stay unique across an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct CallId(u32);

impl CallId {
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Unique identifier for an async task.
///
/// Task 0 is always the main task, which owns the module frame; tasks spawned
/// by `gather` get ids 1+.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct TaskId(u32);

impl TaskId {
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Returns true for the main task.
    #[inline]
    pub fn is_main(self) -> bool {
        self.0 == 0
    }
}

/// Coroutine execution state (single-shot semantics).
///
/// Coroutines can only be awaited once; a second await raises RuntimeError.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum CoroutineState {
    /// Created but not yet awaited.
    New,
    /// Currently executing (has been awaited).
    Running,
    /// Finished execution.
    Completed,
}

/// A coroutine object: the result of calling an `async def` function.
///
/// Argument binding happens at call time and is stored in `locals`; no code
/// runs until the coroutine is awaited (or scheduled by `gather`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Coroutine {
    /// The async function to execute.
    pub func_id: FunctionId,
    /// Pre-bound local slots, sized to the function's local count.
    pub locals: Vec<Value>,
    /// Current execution state.
    pub state: CoroutineState,
    /// Completion value, kept so an already-completed coroutine handed to
    /// `gather` can contribute its result without a scheduling step.
    pub result: Option<Value>,
}

impl Coroutine {
    /// Creates a fresh coroutine for an async function call.
    pub fn new(func_id: FunctionId, locals: Vec<Value>) -> Self {
        Self {
            func_id,
            locals,
            state: CoroutineState::New,
            result: None,
        }
    }
}

/// The future returned by `asyncio.gather(*awaitables)`.
///
/// Creation stores the raw arguments; nothing is validated or spawned until
/// the future is awaited. Results land in argument order regardless of
/// completion order. A non-awaitable argument raises `TypeError` when it is
/// reached during spawning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GatherFuture {
    /// The awaitables, exactly as passed.
    pub items: Vec<Value>,
    /// Results per item, filled as tasks complete.
    pub results: Vec<Option<Value>>,
    /// The task blocked awaiting this gather, once awaited.
    pub waiter: Option<TaskId>,
    /// Number of items still running.
    pub remaining: usize,
    /// Guards single-shot semantics.
    pub awaited: bool,
}

impl GatherFuture {
    /// Creates a gather future over the given awaitables.
    pub fn new(items: Vec<Value>) -> Self {
        let count = items.len();
        Self {
            items,
            results: vec![None; count],
            waiter: None,
            remaining: count,
            awaited: false,
        }
    }
}
