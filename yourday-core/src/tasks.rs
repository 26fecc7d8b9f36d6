//! Task source types consumed by point evaluation.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Subtask {
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            completed_at: None,
        }
    }

    #[must_use]
    pub fn completed(title: &str, at: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            completed_at: Some(at),
        }
    }
}

/// A user task with an optional completion time and ordered subtasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl Task {
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            completed_at: None,
            subtasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    #[must_use]
    pub fn with_subtask(mut self, subtask: Subtask) -> Self {
        self.subtasks.push(subtask);
        self
    }

    #[must_use]
    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }
}
