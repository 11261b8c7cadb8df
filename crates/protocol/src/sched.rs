// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Cooperative round-robin scheduler for the two ends of a session.
//!
//! A task is a state machine whose current state is its saved continuation.
//! `Task::resume` runs the task from one yield point to the next, so a context
//! switch is nothing more than picking the next slot of the arena. There is
//! no preemption: a task that never yields starves the other one.

use crate::{RecoveryError, RecoveryResult};

pub const MAX_TASKS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPoll {
    /// Reached a yield point; resume later.
    Yield,
    /// Finished; never resumed again.
    Exit,
}

pub trait Task<R: ?Sized> {
    fn name(&self) -> &'static str;
    fn resume(&mut self, regs: &mut R) -> RecoveryResult<TaskPoll>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Exited,
}

pub struct TaskContext<'a, R: ?Sized> {
    pub id: TaskId,
    pub state: TaskState,
    pub resumes: u64,
    task: &'a mut dyn Task<R>,
}

/// Fixed arena of task contexts indexed by [`TaskId`].
pub struct Scheduler<'a, R: ?Sized> {
    contexts: [Option<TaskContext<'a, R>>; MAX_TASKS],
    spawned: usize,
    current: Option<usize>,
    switches: u64,
}

impl<'a, R: ?Sized> Default for Scheduler<'a, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, R: ?Sized> Scheduler<'a, R> {
    pub fn new() -> Self {
        Self {
            contexts: std::array::from_fn(|_| None),
            spawned: 0,
            current: None,
            switches: 0,
        }
    }

    pub fn spawn(&mut self, task: &'a mut dyn Task<R>) -> RecoveryResult<TaskId> {
        let Some(slot) = self.contexts.get_mut(self.spawned) else {
            return Err(RecoveryError::SchedulerFull(MAX_TASKS));
        };
        let id = TaskId(self.spawned);
        tracing::debug!("Spawned task {} ({})", id.0, task.name());
        *slot = Some(TaskContext {
            id,
            state: TaskState::Ready,
            resumes: 0,
            task,
        });
        self.spawned += 1;
        Ok(id)
    }

    /// Resumes the next ready task once. Returns `None` when every task has exited.
    pub fn step(&mut self, regs: &mut R) -> RecoveryResult<Option<TaskId>> {
        let Some(idx) = self.next_ready() else {
            return Ok(None);
        };
        if self.current.is_some_and(|cur| cur != idx) {
            self.switches += 1;
        }
        self.current = Some(idx);

        let Some(ctx) = self.contexts[idx].as_mut() else {
            return Ok(None);
        };
        ctx.resumes += 1;
        match ctx.task.resume(regs) {
            Ok(TaskPoll::Yield) => {}
            Ok(TaskPoll::Exit) => {
                ctx.state = TaskState::Exited;
                tracing::debug!(
                    "Task {} ({}) exited after {} resumes",
                    ctx.id.0,
                    ctx.task.name(),
                    ctx.resumes
                );
            }
            Err(e) => {
                ctx.state = TaskState::Exited;
                tracing::error!("Task {} ({}) failed: {}", ctx.id.0, ctx.task.name(), e);
                return Err(e);
            }
        }
        Ok(Some(ctx.id))
    }

    /// Runs until every task has exited, or until one of them fails.
    pub fn run(&mut self, regs: &mut R) -> RecoveryResult<()> {
        while self.step(regs)?.is_some() {}
        Ok(())
    }

    pub fn resumes(&self, id: TaskId) -> u64 {
        self.context(id).map_or(0, |ctx| ctx.resumes)
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.context(id).map(|ctx| ctx.state)
    }

    /// Number of times control passed from one task to a different one.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    fn context(&self, id: TaskId) -> Option<&TaskContext<'a, R>> {
        self.contexts.get(id.0).and_then(Option::as_ref)
    }

    fn next_ready(&self) -> Option<usize> {
        let n = self.spawned;
        if n == 0 {
            return None;
        }
        let after = self.current.unwrap_or(n - 1);
        (1..=n).map(|k| (after + k) % n).find(|&i| {
            self.contexts[i]
                .as_ref()
                .is_some_and(|ctx| ctx.state == TaskState::Ready)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Counter<'t> {
        label: usize,
        remaining: u32,
        trace: &'t RefCell<Vec<usize>>,
    }

    impl Task<()> for Counter<'_> {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn resume(&mut self, _regs: &mut ()) -> RecoveryResult<TaskPoll> {
            self.trace.borrow_mut().push(self.label);
            if self.remaining == 0 {
                return Ok(TaskPoll::Exit);
            }
            self.remaining -= 1;
            Ok(TaskPoll::Yield)
        }
    }

    #[test]
    fn test_round_robin_alternates() {
        let trace = RefCell::new(Vec::new());
        let mut a = Counter { label: 0, remaining: 3, trace: &trace };
        let mut b = Counter { label: 1, remaining: 3, trace: &trace };

        let mut sched: Scheduler<'_, ()> = Scheduler::new();
        sched.spawn(&mut a).unwrap();
        sched.spawn(&mut b).unwrap();
        sched.run(&mut ()).unwrap();

        assert_eq!(*trace.borrow(), vec![0, 1, 0, 1, 0, 1, 0, 1]);
        assert_eq!(sched.switches(), 7);
    }

    #[test]
    fn test_fair_share_after_n_yields() {
        let trace = RefCell::new(Vec::new());
        let mut a = Counter { label: 0, remaining: u32::MAX, trace: &trace };
        let mut b = Counter { label: 1, remaining: u32::MAX, trace: &trace };

        let mut sched: Scheduler<'_, ()> = Scheduler::new();
        let ida = sched.spawn(&mut a).unwrap();
        let idb = sched.spawn(&mut b).unwrap();

        for n in 1..=101u64 {
            sched.step(&mut ()).unwrap();
            let (ra, rb) = (sched.resumes(ida), sched.resumes(idb));
            assert_eq!(ra + rb, n);
            assert!(ra == n.div_ceil(2) || ra == n / 2);
            assert!(ra.abs_diff(rb) <= 1);
        }
    }

    #[test]
    fn test_single_task_yield_is_noop() {
        let trace = RefCell::new(Vec::new());
        let mut a = Counter { label: 7, remaining: 4, trace: &trace };

        let mut sched: Scheduler<'_, ()> = Scheduler::new();
        let id = sched.spawn(&mut a).unwrap();
        sched.run(&mut ()).unwrap();

        assert_eq!(trace.borrow().len(), 5);
        assert_eq!(sched.switches(), 0);
        assert_eq!(sched.state(id), Some(TaskState::Exited));
    }

    #[test]
    fn test_survivor_runs_alone_after_exit() {
        let trace = RefCell::new(Vec::new());
        let mut short = Counter { label: 0, remaining: 1, trace: &trace };
        let mut long = Counter { label: 1, remaining: 4, trace: &trace };

        let mut sched: Scheduler<'_, ()> = Scheduler::new();
        sched.spawn(&mut short).unwrap();
        sched.spawn(&mut long).unwrap();
        sched.run(&mut ()).unwrap();

        assert_eq!(*trace.borrow(), vec![0, 1, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_third_task_rejected() {
        let trace = RefCell::new(Vec::new());
        let mut a = Counter { label: 0, remaining: 0, trace: &trace };
        let mut b = Counter { label: 1, remaining: 0, trace: &trace };
        let mut c = Counter { label: 2, remaining: 0, trace: &trace };

        let mut sched: Scheduler<'_, ()> = Scheduler::new();
        sched.spawn(&mut a).unwrap();
        sched.spawn(&mut b).unwrap();
        let err = sched.spawn(&mut c).unwrap_err();
        assert!(matches!(err, RecoveryError::SchedulerFull(2)));
    }

    #[test]
    fn test_failure_aborts_run() {
        struct Faulty;
        impl Task<()> for Faulty {
            fn name(&self) -> &'static str {
                "faulty"
            }
            fn resume(&mut self, _regs: &mut ()) -> RecoveryResult<TaskPoll> {
                Err(RecoveryError::EmptyImage)
            }
        }

        let trace = RefCell::new(Vec::new());
        let mut a = Counter { label: 0, remaining: 10, trace: &trace };
        let mut f = Faulty;

        let mut sched: Scheduler<'_, ()> = Scheduler::new();
        sched.spawn(&mut a).unwrap();
        sched.spawn(&mut f).unwrap();
        assert!(sched.run(&mut ()).is_err());
        assert_eq!(*trace.borrow(), vec![0]);
    }

    #[test]
    fn test_arena_slots_by_task_id() {
        let trace = RefCell::new(Vec::new());
        let mut a = Counter { label: 0, remaining: 0, trace: &trace };

        let mut sched: Scheduler<'_, ()> = Scheduler::new();
        assert_eq!(sched.step(&mut ()).unwrap(), None);

        let id = sched.spawn(&mut a).unwrap();
        assert_eq!(id, TaskId(0));
        assert_eq!(sched.state(TaskId(1)), None);
        assert_eq!(sched.state(TaskId(MAX_TASKS)), None);
        assert_eq!(sched.resumes(TaskId(1)), 0);

        sched.run(&mut ()).unwrap();
        assert_eq!(sched.state(id), Some(TaskState::Exited));
    }
}
