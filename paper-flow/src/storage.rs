use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::{
    error::{AnalysisError, Result},
    task::{AnalysisReport, AnalysisTask, TaskFailure, TaskId, TaskState, TaskView},
};

/// Process-wide store of analysis tasks. Nothing is persisted.
///
/// Each record is mutated under its own entry lock and its state is replaced
/// as a whole, so readers see either the previous or the next state.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<DashMap<TaskId, AnalysisTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and insert a pending task for it.
    pub fn create(&self) -> TaskId {
        loop {
            let id = TaskId::new();
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.tasks.entry(id) {
                slot.insert(AnalysisTask::pending(id));
                return id;
            }
        }
    }

    pub fn get(&self, id: &TaskId) -> Result<AnalysisTask> {
        self.tasks
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AnalysisError::TaskNotFound(id.to_string()))
    }

    pub fn view(&self, id: &TaskId) -> Result<TaskView> {
        self.tasks
            .get(id)
            .map(|entry| entry.view())
            .ok_or_else(|| AnalysisError::TaskNotFound(id.to_string()))
    }

    /// Pending → Processing. Returns false if the task was not pending.
    pub fn mark_processing(&self, id: &TaskId) -> bool {
        self.transition(id, |state| match state {
            TaskState::Pending => Some(TaskState::Processing),
            _ => None,
        })
    }

    /// Record the terminal outcome. Only the first call for a task has any effect.
    pub fn finish(
        &self,
        id: &TaskId,
        outcome: std::result::Result<AnalysisReport, AnalysisError>,
    ) -> bool {
        let next = match outcome {
            Ok(report) => TaskState::Completed(Arc::new(report)),
            Err(error) => TaskState::Failed(TaskFailure::from(&error)),
        };

        self.transition(id, |state| match state {
            TaskState::Pending | TaskState::Processing => Some(next),
            _ => None,
        })
    }

    fn transition<F>(&self, id: &TaskId, step: F) -> bool
    where
        F: FnOnce(&TaskState) -> Option<TaskState>,
    {
        let Some(mut entry) = self.tasks.get_mut(id) else {
            warn!("Transition requested for unknown task {}", id);
            return false;
        };
        let next = step(&entry.state);
        match next {
            Some(next) => {
                entry.set_state(next);
                true
            }
            None => {
                warn!(
                    "Ignoring transition for task {} in state {:?}",
                    id,
                    entry.status()
                );
                false
            }
        }
    }

    /// Drop tasks that finished at least `retention` ago. Returns how many were removed.
    pub fn purge_finished(&self, retention: Duration) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| {
            !task
                .since_finished()
                .is_some_and(|finished_for| finished_for >= retention)
        });
        before.saturating_sub(self.tasks.len())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
