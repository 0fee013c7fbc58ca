// src/dag/stages.rs

//! Grouping of tasks into ordered stages.

use std::collections::BTreeMap;

use crate::task::{StageKey, TaskDeclaration};

/// How a stage is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    /// One task after the other; each task sees its predecessors' results.
    Sequential,
    /// All tasks at once from the same snapshot of prior results.
    Concurrent,
}

/// One group of tasks sharing a stage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub key: StageKey,
    /// Indices into the declaration list, in declaration order.
    pub members: Vec<usize>,
    pub mode: StageMode,
}

impl Stage {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Stages in ascending key order.
///
/// A stage runs concurrently only when it has more than one task and every
/// task in it is concurrency-eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    pub fn from_declarations<'a, I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = &'a TaskDeclaration>,
    {
        let mut groups: BTreeMap<StageKey, Vec<(usize, bool)>> = BTreeMap::new();

        for (index, decl) in declarations.into_iter().enumerate() {
            groups
                .entry(decl.stage_key())
                .or_default()
                .push((index, decl.is_concurrent()));
        }

        let stages = groups
            .into_iter()
            .map(|(key, entries)| {
                let concurrent = entries.len() > 1 && entries.iter().all(|(_, c)| *c);
                Stage {
                    key,
                    members: entries.into_iter().map(|(i, _)| i).collect(),
                    mode: if concurrent {
                        StageMode::Concurrent
                    } else {
                        StageMode::Sequential
                    },
                }
            })
            .collect();

        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage key and position within the stage for a declaration index.
    pub fn locate(&self, index: usize) -> Option<(&Stage, usize)> {
        self.stages.iter().find_map(|stage| {
            stage
                .members
                .iter()
                .position(|m| *m == index)
                .map(|pos| (stage, pos))
        })
    }
}
