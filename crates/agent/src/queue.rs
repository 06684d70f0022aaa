//! Priority-ordered FIFO task queue (spec §4.5 "Task queue", law L5).

use folio_store::{new_id, Task, TaskStatus};

/// Pending and completed tasks for one agent.
///
/// Pending tasks are kept sorted by priority descending; within equal
/// priority, insertion order is preserved (a stable sort on every `add`).
#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: Vec<Task>,
    completed: Vec<Task>,
}

impl TaskQueue {
    /// Builds an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from a persisted snapshot.
    #[must_use]
    pub fn from_parts(pending: Vec<Task>, completed: Vec<Task>) -> Self {
        Self { pending, completed }
    }

    /// Inserts a new pending task, returning its id.
    pub fn add(&mut self, data: serde_json::Value, priority: f64) -> String {
        let task = Task {
            id: new_id(),
            data,
            priority,
            created_at: chrono::Utc::now(),
            status: TaskStatus::Pending,
            result: None,
        };
        let id = task.id.clone();
        self.pending.push(task);
        self.pending
            .sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal));
        id
    }

    /// Pops the highest-priority pending task, if any.
    pub fn pop_next(&mut self) -> Option<Task> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    /// Records a task's terminal status and result, moving it to `completed`.
    pub fn complete(&mut self, mut task: Task, status: TaskStatus, result: Option<serde_json::Value>) {
        task.status = status;
        task.result = result;
        self.completed.push(task);
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Borrow of pending tasks, highest priority first.
    #[must_use]
    pub fn pending(&self) -> &[Task] {
        &self.pending
    }

    /// Borrow of completed tasks.
    #[must_use]
    pub fn completed(&self) -> &[Task] {
        &self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_matches_law_l5() {
        let mut queue = TaskQueue::new();
        queue.add(serde_json::json!({"n": 1}), 0.2);
        queue.add(serde_json::json!({"n": 2}), 0.9);
        queue.add(serde_json::json!({"n": 3}), 0.5);

        let first = queue.pop_next().unwrap();
        let second = queue.pop_next().unwrap();
        let third = queue.pop_next().unwrap();
        assert_eq!(first.priority, 0.9);
        assert_eq!(second.priority, 0.5);
        assert_eq!(third.priority, 0.2);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut queue = TaskQueue::new();
        let first_id = queue.add(serde_json::json!({"n": 1}), 0.5);
        let second_id = queue.add(serde_json::json!({"n": 2}), 0.5);
        assert_eq!(queue.pop_next().unwrap().id, first_id);
        assert_eq!(queue.pop_next().unwrap().id, second_id);
    }
}
