// src/dag/graph.rs

//! Validated task set of a job plus static dependency analysis.

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::dag::stages::{StageMode, StagePlan};
use crate::errors::{JobkitError, Result};
use crate::task::{TaskDeclaration, TaskHandler, TaskInvoker};

/// Why a declared dependency can never be satisfied when the job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsatisfiableReason {
    /// The dependency belongs to a later stage.
    LaterStage,
    /// Both tasks share a concurrent stage and never see each other.
    SameConcurrentStage,
    /// Same sequential stage, but the dependency is declared after the task.
    LaterInStage,
}

impl fmt::Display for UnsatisfiableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnsatisfiableReason::LaterStage => "dependency runs in a later stage",
            UnsatisfiableReason::SameConcurrentStage => "dependency runs concurrently in the same stage",
            UnsatisfiableReason::LaterInStage => "dependency runs later in the same stage",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsatisfiableDependency {
    pub task: String,
    pub dependency: String,
    pub reason: UnsatisfiableReason,
}

/// Result of analysing the declared dependencies of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyAnalysis {
    topological_order: Vec<String>,
    unsatisfiable: Vec<UnsatisfiableDependency>,
}

impl DependencyAnalysis {
    /// Validate `declarations` and compute the analysis.
    ///
    /// Fails on empty task sets, empty or duplicate ids, unknown or
    /// self-referencing dependencies, and dependency cycles.
    pub fn analyze(declarations: &[&TaskDeclaration]) -> Result<Self> {
        if declarations.is_empty() {
            return Err(JobkitError::ConfigError(
                "a job must declare at least one task".to_string(),
            ));
        }

        let mut index_of: HashMap<&str, usize> = HashMap::new();
        for (index, decl) in declarations.iter().enumerate() {
            if decl.id().trim().is_empty() {
                return Err(JobkitError::ConfigError(format!(
                    "task #{index} has an empty id"
                )));
            }
            if index_of.insert(decl.id(), index).is_some() {
                return Err(JobkitError::ConfigError(format!(
                    "task id '{}' is declared more than once",
                    decl.id()
                )));
            }
        }

        for decl in declarations {
            for dep in decl.dependencies() {
                if dep == decl.id() {
                    return Err(JobkitError::ConfigError(format!(
                        "task '{}' cannot depend on itself",
                        decl.id()
                    )));
                }
                if !index_of.contains_key(dep.as_str()) {
                    return Err(JobkitError::ConfigError(format!(
                        "task '{}' has unknown dependency '{}'",
                        decl.id(),
                        dep
                    )));
                }
            }
        }

        // Edge direction: dependency -> dependent.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for decl in declarations {
            graph.add_node(decl.id());
        }
        for decl in declarations {
            for dep in decl.dependencies() {
                graph.add_edge(dep.as_str(), decl.id(), ());
            }
        }

        let topological_order = match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(str::to_string).collect(),
            Err(cycle) => {
                return Err(JobkitError::DependencyCycle(format!(
                    "cycle detected in task dependencies involving task '{}'",
                    cycle.node_id()
                )));
            }
        };

        let plan = StagePlan::from_declarations(declarations.iter().copied());
        let mut unsatisfiable = Vec::new();

        for (index, decl) in declarations.iter().enumerate() {
            let Some((stage, position)) = plan.locate(index) else {
                continue;
            };
            for dep in decl.dependencies() {
                let dep_index = index_of[dep.as_str()];
                let Some((dep_stage, dep_position)) = plan.locate(dep_index) else {
                    continue;
                };

                let reason = if dep_stage.key > stage.key {
                    Some(UnsatisfiableReason::LaterStage)
                } else if dep_stage.key < stage.key {
                    None
                } else if stage.mode == StageMode::Concurrent {
                    Some(UnsatisfiableReason::SameConcurrentStage)
                } else if dep_position > position {
                    Some(UnsatisfiableReason::LaterInStage)
                } else {
                    None
                };

                if let Some(reason) = reason {
                    warn!(
                        task = %decl.id(),
                        dependency = %dep,
                        %reason,
                        "declared dependency can never be satisfied"
                    );
                    unsatisfiable.push(UnsatisfiableDependency {
                        task: decl.id().to_string(),
                        dependency: dep.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(Self {
            topological_order,
            unsatisfiable,
        })
    }

    /// Task ids ordered so every task follows its dependencies.
    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    pub fn unsatisfiable(&self) -> &[UnsatisfiableDependency] {
        &self.unsatisfiable
    }
}

/// Validated set of tasks making up one job.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<TaskInvoker>,
    analysis: DependencyAnalysis,
}

impl TaskGraph {
    pub fn builder() -> TaskGraphBuilder {
        TaskGraphBuilder::default()
    }

    /// Validate `tasks` into a graph.
    pub fn new(tasks: Vec<TaskInvoker>) -> Result<Self> {
        let declarations: Vec<&TaskDeclaration> = tasks.iter().map(|t| t.declaration()).collect();
        let analysis = DependencyAnalysis::analyze(&declarations)?;
        debug!(
            tasks = tasks.len(),
            order = ?analysis.topological_order(),
            "task graph validated"
        );
        Ok(Self { tasks, analysis })
    }

    pub fn tasks(&self) -> &[TaskInvoker] {
        &self.tasks
    }

    pub fn analysis(&self) -> &DependencyAnalysis {
        &self.analysis
    }

    pub fn plan(&self) -> StagePlan {
        StagePlan::from_declarations(self.tasks.iter().map(|t| t.declaration()))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Declarative registration of a job's tasks.
///
/// Declarations and bodies may be registered together with [`task`](Self::task)
/// or separately with [`declare`](Self::declare) + [`bind`](Self::bind); a
/// declaration left without a body fails [`build`](Self::build).
#[derive(Debug, Default)]
pub struct TaskGraphBuilder {
    entries: Vec<(TaskDeclaration, Option<TaskHandler>)>,
    unbound_handlers: Vec<String>,
}

impl TaskGraphBuilder {
    pub fn task(mut self, declaration: TaskDeclaration, handler: TaskHandler) -> Self {
        self.entries.push((declaration, Some(handler)));
        self
    }

    pub fn declare(mut self, declaration: TaskDeclaration) -> Self {
        self.entries.push((declaration, None));
        self
    }

    /// Attach a body to an earlier [`declare`](Self::declare)d task.
    pub fn bind(mut self, task_id: &str, handler: TaskHandler) -> Self {
        match self.entries.iter_mut().find(|(d, _)| d.id() == task_id) {
            Some((_, slot)) => *slot = Some(handler),
            None => self.unbound_handlers.push(task_id.to_string()),
        }
        self
    }

    pub fn build(self) -> Result<TaskGraph> {
        if let Some(id) = self.unbound_handlers.first() {
            return Err(JobkitError::ConfigError(format!(
                "handler bound to undeclared task '{id}'"
            )));
        }

        let mut tasks = Vec::with_capacity(self.entries.len());
        for (declaration, handler) in self.entries {
            let Some(handler) = handler else {
                return Err(JobkitError::ConfigError(format!(
                    "task '{}' is declared without a handler",
                    declaration.id()
                )));
            };
            tasks.push(TaskInvoker::new(declaration, handler));
        }

        TaskGraph::new(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TaskHandler {
        TaskHandler::no_args(|| async { Ok(()) })
    }

    #[test]
    fn empty_job_is_a_configuration_error() {
        match TaskGraph::builder().build() {
            Err(JobkitError::ConfigError(msg)) => assert!(msg.contains("at least one task")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn cycles_are_rejected() {
        let result = TaskGraph::builder()
            .task(TaskDeclaration::new("a").depends_on("b"), noop())
            .task(TaskDeclaration::new("b").depends_on("a"), noop())
            .build();
        match result {
            Err(JobkitError::DependencyCycle(msg)) => {
                assert!(msg.contains("'a'") || msg.contains("'b'"));
            }
            other => panic!("expected DependencyCycle, got {other:?}"),
        }
    }

    #[test]
    fn unknown_and_duplicate_ids_are_rejected() {
        let unknown = TaskGraph::builder()
            .task(TaskDeclaration::new("a").depends_on("ghost"), noop())
            .build();
        assert!(matches!(unknown, Err(JobkitError::ConfigError(m)) if m.contains("ghost")));

        let duplicate = TaskGraph::builder()
            .task(TaskDeclaration::new("a"), noop())
            .task(TaskDeclaration::new("a"), noop())
            .build();
        assert!(matches!(duplicate, Err(JobkitError::ConfigError(m)) if m.contains("more than once")));
    }

    #[test]
    fn declarations_without_handlers_are_rejected() {
        let result = TaskGraph::builder()
            .declare(TaskDeclaration::new("a"))
            .declare(TaskDeclaration::new("b"))
            .bind("a", noop())
            .build();
        assert!(matches!(result, Err(JobkitError::ConfigError(m)) if m.contains("'b'")));

        let stray = TaskGraph::builder()
            .task(TaskDeclaration::new("a"), noop())
            .bind("zzz", noop())
            .build();
        assert!(matches!(stray, Err(JobkitError::ConfigError(m)) if m.contains("zzz")));
    }

    #[test]
    fn analysis_flags_dependencies_that_cannot_run_first() {
        let graph = TaskGraph::builder()
            .task(TaskDeclaration::new("early").stage(1).depends_on("late"), noop())
            .task(TaskDeclaration::new("late").stage(2), noop())
            .task(TaskDeclaration::new("c1").stage(3).concurrent(true), noop())
            .task(TaskDeclaration::new("c2").stage(3).concurrent(true).depends_on("c1"), noop())
            .task(TaskDeclaration::new("s1").stage(4).depends_on("s2"), noop())
            .task(TaskDeclaration::new("s2").stage(4), noop())
            .task(TaskDeclaration::new("ok").stage(5).depends_on("late"), noop())
            .build()
            .expect("graph is acyclic");

        let reasons: Vec<(&str, UnsatisfiableReason)> = graph
            .analysis()
            .unsatisfiable()
            .iter()
            .map(|u| (u.task.as_str(), u.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("early", UnsatisfiableReason::LaterStage),
                ("c2", UnsatisfiableReason::SameConcurrentStage),
                ("s1", UnsatisfiableReason::LaterInStage),
            ]
        );

        let order = graph.analysis().topological_order();
        let pos = |id: &str| order.iter().position(|t| t == id).unwrap();
        assert!(pos("late") < pos("early"));
        assert!(pos("late") < pos("ok"));
    }
}
