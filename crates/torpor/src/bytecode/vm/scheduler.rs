//! The cooperative task scheduler behind `await` and `asyncio.gather`.
//!
//! Exactly one task's frames are loaded in the VM at a time; every other
//! task's frame stack is parked here. Tasks are stepped round-robin in
//! registration order, and every host-call suspension inside a gathered task
//! is a scheduling boundary: after the host resumes, the supplying task goes
//! to the back of the ready queue. With all "I/O" being synchronous host
//! callbacks, the interleaving is fully deterministic.

use std::collections::VecDeque;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    asyncio::{CoroutineState, TaskId},
    exception_private::{ExcType, RunError, RunResult},
    heap::{HeapData, HeapId},
    program::Program,
    resource::ResourceTracker,
    value::Value,
};

use super::{Frame, StepFlow, VM};

/// A task spawned by `gather`: a parked frame stack plus its result slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Task {
    /// The task's frames, when it is not the one running.
    pub frames: Vec<Frame>,
    /// The gather future this task reports to.
    pub gather: HeapId,
    /// The task's slot in the gather's result list.
    pub index: usize,
}

/// Scheduler state: parked tasks, the ready queue, and the running task.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct Scheduler {
    /// Parked gathered tasks by id (ready or blocked on a nested gather).
    tasks: AHashMap<u32, Task>,
    /// Frame stacks of contexts blocked awaiting a gather, by task id.
    /// The main task parks here too (under id 0, with no `Task` entry).
    blocked: AHashMap<u32, Vec<Frame>>,
    /// Tasks ready to run, in round-robin order.
    ready: VecDeque<TaskId>,
    /// The task whose frames are currently loaded in the VM.
    current: TaskId,
    /// Next task id; 0 is the main task.
    next_task_id: u32,
}

impl Scheduler {
    /// Creates a scheduler with only the main task.
    pub fn new() -> Self {
        Self {
            next_task_id: 1,
            ..Self::default()
        }
    }

    /// Whether the main task is the one running.
    pub fn on_main_task(&self) -> bool {
        self.current.is_main()
    }

    fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }
}

impl<T: ResourceTracker> VM<T> {
    /// Executes the `Await` instruction on a popped awaitable.
    pub(super) fn execute_await(&mut self, awaitable: Value, program: &Program) -> RunResult<StepFlow> {
        let Value::Ref(id) = &awaitable else {
            return Err(self.not_awaitable(&awaitable, program));
        };
        match self.heap.get(*id) {
            HeapData::Coroutine(_) => {
                self.await_coroutine(*id)?;
                Ok(StepFlow::Continue)
            }
            HeapData::Gather(_) => self.await_gather(*id, program),
            _ => Err(self.not_awaitable(&awaitable, program)),
        }
    }

    /// `await coro`: pushes the coroutine's frame onto the current stack.
    ///
    /// The coroutine runs within the awaiting task; suspensions inside it
    /// propagate transparently.
    fn await_coroutine(&mut self, coroutine_id: HeapId) -> RunResult<()> {
        if self.sync_floor > 0 {
            return Err(ExcType::runtime_error("await not allowed in this context"));
        }
        self.heap
            .tracker()
            .check_frame_depth(self.frames.len() + 1)?;
        let HeapData::Coroutine(coroutine) = self.heap.get_mut(coroutine_id) else {
            return Err(RunError::internal("await_coroutine on non-coroutine"));
        };
        if coroutine.state != CoroutineState::New {
            return Err(ExcType::runtime_error("cannot reuse already awaited coroutine"));
        }
        coroutine.state = CoroutineState::Running;
        let func_id = coroutine.func_id;
        let locals = std::mem::take(&mut coroutine.locals);
        self.frames.push(Frame::coroutine(func_id, locals, coroutine_id));
        Ok(())
    }

    /// `await gather_future`: spawns one task per constituent coroutine and
    /// blocks the current context until all of them complete.
    fn await_gather(&mut self, gather_id: HeapId, program: &Program) -> RunResult<StepFlow> {
        if self.sync_floor > 0 {
            return Err(ExcType::runtime_error("await not allowed in this context"));
        }
        let HeapData::Gather(gather) = self.heap.get_mut(gather_id) else {
            return Err(RunError::internal("await_gather on non-gather"));
        };
        if gather.awaited {
            return Err(ExcType::runtime_error("cannot reuse already awaited gather"));
        }
        gather.awaited = true;
        let items = gather.items.clone();

        // Spawn in argument order; validation happens here, per item. A
        // failing item must unwind the tasks already spawned for this gather
        // or they would leak into the ready queue.
        let mut spawned: Vec<TaskId> = Vec::new();
        let spawn_error = 'spawn: {
            for (index, item) in items.iter().enumerate() {
                let coroutine_id = match item {
                    Value::Ref(id) if matches!(self.heap.get(*id), HeapData::Coroutine(_)) => *id,
                    other => break 'spawn Some(self.not_awaitable(other, program)),
                };
                let HeapData::Coroutine(coroutine) = self.heap.get_mut(coroutine_id) else {
                    unreachable!("checked above");
                };
                match coroutine.state {
                    CoroutineState::New => {
                        coroutine.state = CoroutineState::Running;
                        let func_id = coroutine.func_id;
                        let locals = std::mem::take(&mut coroutine.locals);
                        let task_id = self.scheduler.allocate_task_id();
                        self.scheduler.tasks.insert(
                            task_id.raw(),
                            Task {
                                frames: vec![Frame::coroutine(func_id, locals, coroutine_id)],
                                gather: gather_id,
                                index,
                            },
                        );
                        self.scheduler.ready.push_back(task_id);
                        spawned.push(task_id);
                    }
                    CoroutineState::Completed => {
                        // Already-completed coroutines contribute their value
                        // directly, no scheduling step.
                        let Some(result) = coroutine.result.clone() else {
                            break 'spawn Some(ExcType::runtime_error("cannot reuse already awaited coroutine"));
                        };
                        let HeapData::Gather(gather) = self.heap.get_mut(gather_id) else {
                            unreachable!("checked above");
                        };
                        gather.results[index] = Some(result);
                        gather.remaining -= 1;
                    }
                    CoroutineState::Running => {
                        break 'spawn Some(ExcType::runtime_error("cannot reuse already awaited coroutine"));
                    }
                }
            }
            None
        };
        if let Some(error) = spawn_error {
            for task_id in spawned {
                self.scheduler.tasks.remove(&task_id.raw());
                self.scheduler.ready.retain(|ready| *ready != task_id);
            }
            return Err(error);
        }

        let current = self.scheduler.current;
        let HeapData::Gather(gather) = self.heap.get_mut(gather_id) else {
            unreachable!("checked above");
        };
        gather.waiter = Some(current);

        if gather.remaining == 0 {
            // Nothing to wait for (empty gather or all pre-completed).
            let results: Vec<Value> = gather
                .results
                .iter()
                .map(|slot| slot.clone().expect("remaining == 0"))
                .collect();
            let list = self.heap.allocate_value(HeapData::List(results))?;
            self.push(list);
            return Ok(StepFlow::Continue);
        }

        // Park the current context and run the first spawned task.
        let frames = std::mem::take(&mut self.frames);
        self.scheduler.blocked.insert(current.raw(), frames);
        self.load_next_ready_task()?;
        Ok(StepFlow::Continue)
    }

    /// A gathered task returned; deliver its result and pick what runs next.
    pub(super) fn finish_task(&mut self, value: Value) -> RunResult<StepFlow> {
        let current = self.scheduler.current;
        let task = self
            .scheduler
            .tasks
            .remove(&current.raw())
            .ok_or_else(|| RunError::internal("finished task is not registered"))?;

        let HeapData::Gather(gather) = self.heap.get_mut(task.gather) else {
            return Err(RunError::internal("task gather is not a gather"));
        };
        gather.results[task.index] = Some(value);
        gather.remaining -= 1;

        if gather.remaining == 0 {
            let waiter = gather.waiter.ok_or_else(|| RunError::internal("gather has no waiter"))?;
            let results: Vec<Value> = gather
                .results
                .iter()
                .map(|slot| slot.clone().expect("remaining == 0"))
                .collect();
            let list = self.heap.allocate_value(HeapData::List(results))?;
            self.wake_context(waiter)?;
            self.push(list);
            return Ok(StepFlow::Continue);
        }

        self.load_next_ready_task()?;
        Ok(StepFlow::Continue)
    }

    /// A gathered task raised; drop its siblings and re-route the error to
    /// the gather's awaiter. Returns the error to keep unwinding with.
    pub(super) fn fail_task(&mut self, error: RunError) -> RunResult<RunError> {
        let current = self.scheduler.current;
        let task = self
            .scheduler
            .tasks
            .remove(&current.raw())
            .ok_or_else(|| RunError::internal("failed task is not registered"))?;

        // Drop sibling tasks of the same gather, started or not; their
        // pending state is discarded — including, transitively, tasks of any
        // nested gather a sibling was blocked on.
        let gather_id = task.gather;
        let siblings: Vec<u32> = self
            .scheduler
            .tasks
            .iter()
            .filter(|(_, other)| other.gather == gather_id)
            .map(|(&id, _)| id)
            .collect();
        self.drop_task_tree(siblings);

        let HeapData::Gather(gather) = self.heap.get(gather_id) else {
            return Err(RunError::internal("task gather is not a gather"));
        };
        let waiter = gather.waiter.ok_or_else(|| RunError::internal("gather has no waiter"))?;
        self.wake_context(waiter)?;
        Ok(error)
    }

    /// Removes tasks (and, transitively, tasks of nested gathers they were
    /// awaiting) from every scheduler structure.
    fn drop_task_tree(&mut self, roots: Vec<u32>) {
        let mut pending = roots;
        while let Some(dead) = pending.pop() {
            self.scheduler.tasks.remove(&dead);
            self.scheduler.ready.retain(|ready| ready.raw() != dead);
            self.scheduler.blocked.remove(&dead);
            let children: Vec<u32> = self
                .scheduler
                .tasks
                .iter()
                .filter(|(_, child)| match self.heap.get(child.gather) {
                    HeapData::Gather(gather) => gather.waiter == Some(TaskId::new(dead)),
                    _ => false,
                })
                .map(|(&id, _)| id)
                .collect();
            pending.extend(children);
        }
    }

    /// Loads a blocked context's frames back into the VM.
    fn wake_context(&mut self, context: TaskId) -> RunResult<()> {
        let frames = self
            .scheduler
            .blocked
            .remove(&context.raw())
            .ok_or_else(|| RunError::internal("waking a context that is not blocked"))?;
        self.frames = frames;
        self.scheduler.current = context;
        Ok(())
    }

    /// Pops the next ready task and loads its frames.
    fn load_next_ready_task(&mut self) -> RunResult<()> {
        let next = self
            .scheduler
            .ready
            .pop_front()
            .ok_or_else(|| RunError::internal("no ready task to run"))?;
        let task = self
            .scheduler
            .tasks
            .get_mut(&next.raw())
            .ok_or_else(|| RunError::internal("ready task is not registered"))?;
        self.frames = std::mem::take(&mut task.frames);
        self.scheduler.current = next;
        Ok(())
    }

    /// Round-robin rotation after a host call resumed inside a gathered task.
    ///
    /// The resumed task keeps its just-pushed result on its stack, goes to
    /// the back of the ready queue, and the next ready task runs.
    pub(super) fn rotate_after_resume(&mut self) {
        if self.scheduler.on_main_task() || self.scheduler.ready.is_empty() {
            return;
        }
        let current = self.scheduler.current;
        let frames = std::mem::take(&mut self.frames);
        if let Some(task) = self.scheduler.tasks.get_mut(&current.raw()) {
            task.frames = frames;
            self.scheduler.ready.push_back(current);
            self.load_next_ready_task().expect("ready queue checked non-empty");
        } else {
            // Not a gathered task after all; restore and continue.
            self.frames = frames;
        }
    }

    /// Marks a coroutine completed with its return value.
    pub(super) fn mark_coroutine_complete(&mut self, coroutine_id: HeapId, value: Value) {
        if let HeapData::Coroutine(coroutine) = self.heap.get_mut(coroutine_id) {
            coroutine.state = CoroutineState::Completed;
            coroutine.result = Some(value);
        }
    }

    /// Marks a coroutine completed after its frame unwound with an error.
    pub(super) fn mark_coroutine_failed(&mut self, coroutine_id: HeapId) {
        if let HeapData::Coroutine(coroutine) = self.heap.get_mut(coroutine_id) {
            coroutine.state = CoroutineState::Completed;
            coroutine.result = None;
        }
    }

    /// The canonical gather/await type error.
    fn not_awaitable(&self, _value: &Value, _program: &Program) -> RunError {
        ExcType::type_error("An asyncio.Future, a coroutine or an awaitable is required")
    }
}
