// src/task/declaration.rs

//! Static metadata attached to a task implementation.

use std::cmp::Ordering;
use std::fmt;

/// Ordering key of a stage.
///
/// Explicit stages sort ascending; every task without a stage lands in the
/// single `Trailing` stage, which sorts after all explicit ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKey {
    Explicit(i32),
    Trailing,
}

impl From<Option<i32>> for StageKey {
    fn from(stage: Option<i32>) -> Self {
        match stage {
            Some(n) => StageKey::Explicit(n),
            None => StageKey::Trailing,
        }
    }
}

impl Ord for StageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (StageKey::Explicit(a), StageKey::Explicit(b)) => a.cmp(b),
            (StageKey::Explicit(_), StageKey::Trailing) => Ordering::Less,
            (StageKey::Trailing, StageKey::Explicit(_)) => Ordering::Greater,
            (StageKey::Trailing, StageKey::Trailing) => Ordering::Equal,
        }
    }
}

impl PartialOrd for StageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKey::Explicit(n) => write!(f, "{n}"),
            StageKey::Trailing => f.write_str("trailing"),
        }
    }
}

/// Declaration of one task inside a job.
///
/// ```
/// use jobkit::task::TaskDeclaration;
///
/// let decl = TaskDeclaration::new("load")
///     .stage(2)
///     .concurrent(true)
///     .critical(true)
///     .depends_on("extract");
/// assert_eq!(decl.dependencies(), ["extract".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDeclaration {
    id: String,
    stage: Option<i32>,
    concurrent: bool,
    critical: bool,
    depends_on: Vec<String>,
}

impl TaskDeclaration {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stage: None,
            concurrent: false,
            critical: false,
            depends_on: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: i32) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if !self.depends_on.contains(&task_id) {
            self.depends_on.push(task_id);
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage_number(&self) -> Option<i32> {
        self.stage
    }

    pub fn stage_key(&self) -> StageKey {
        StageKey::from(self.stage)
    }

    pub fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_stage_sorts_last() {
        let mut keys = vec![
            StageKey::Trailing,
            StageKey::Explicit(3),
            StageKey::Explicit(-1),
            StageKey::Explicit(i32::MAX),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                StageKey::Explicit(-1),
                StageKey::Explicit(3),
                StageKey::Explicit(i32::MAX),
                StageKey::Trailing,
            ]
        );
    }

    #[test]
    fn duplicate_dependencies_are_collapsed() {
        let decl = TaskDeclaration::new("b").depends_on("a").depends_on("a");
        assert_eq!(decl.dependencies().len(), 1);
        assert_eq!(decl.stage_key(), StageKey::Trailing);
    }
}
