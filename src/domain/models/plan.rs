//! Execution plan domain models.
//!
//! A plan is the planner's output and the scheduler's program: an
//! ordered list of steps, each targeting one agent, with an execution
//! topology. Dependencies always reference earlier steps, so a
//! validated plan is acyclic by construction; the level computation
//! still guards against cycles for defense in depth.

use serde::{Deserialize, Serialize};

use crate::domain::errors::PlanError;

/// How the scheduler traverses the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    /// Steps run in declaration order; each step implicitly depends on
    /// its predecessor.
    Sequential,
    /// All steps launch concurrently; no dependencies allowed.
    Parallel,
    /// Arbitrary DAG; the scheduler computes topological levels.
    Hybrid,
}

impl ExecutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step before validation, as produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDraft {
    pub agent_id: String,
    pub task_text: String,
    pub dependencies: Vec<usize>,
}

impl StepDraft {
    pub fn new(agent_id: impl Into<String>, task_text: impl Into<String>) -> Self {
        Self { agent_id: agent_id.into(), task_text: task_text.into(), dependencies: vec![] }
    }

    pub fn depends_on(mut self, index: usize) -> Self {
        self.dependencies.push(index);
        self
    }
}

/// One planned unit of work targeting one agent. Immutable after
/// planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub index: usize,
    #[serde(rename = "agent")]
    pub agent_id: String,
    #[serde(rename = "task")]
    pub task_text: String,
    pub dependencies: Vec<usize>,
}

/// A validated, acyclic execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<ExecutionStep>,
    #[serde(rename = "executionType")]
    pub execution_type: ExecutionType,
}

impl ExecutionPlan {
    /// Validate and build a plan from drafts.
    ///
    /// Rejects empty plans, self or forward dependencies, and declared
    /// dependencies on parallel plans.
    pub fn new(execution_type: ExecutionType, drafts: Vec<StepDraft>) -> Result<Self, PlanError> {
        if drafts.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut steps = Vec::with_capacity(drafts.len());
        for (index, draft) in drafts.into_iter().enumerate() {
            let mut dependencies = draft.dependencies;
            dependencies.sort_unstable();
            dependencies.dedup();

            if let Some(&dep) = dependencies.iter().find(|&&dep| dep >= index) {
                return Err(PlanError::ForwardDependency { step: index, dependency: dep });
            }
            if execution_type == ExecutionType::Parallel && !dependencies.is_empty() {
                return Err(PlanError::Malformed(
                    "parallel steps must not declare dependencies".into(),
                ));
            }

            steps.push(ExecutionStep {
                index,
                agent_id: draft.agent_id,
                task_text: draft.task_text,
                dependencies,
            });
        }

        Ok(Self { steps, execution_type })
    }

    /// A single-step sequential plan, the fallback planner's shape.
    pub fn single_step(agent_id: impl Into<String>, task_text: impl Into<String>) -> Self {
        Self {
            steps: vec![ExecutionStep {
                index: 0,
                agent_id: agent_id.into(),
                task_text: task_text.into(),
                dependencies: vec![],
            }],
            execution_type: ExecutionType::Sequential,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Dependencies that gate this step's launch.
    ///
    /// Sequential plans chain implicitly even when `dependencies` is
    /// empty; parallel plans gate on nothing.
    pub fn blocking_dependencies(&self, index: usize) -> Vec<usize> {
        match self.execution_type {
            ExecutionType::Sequential => {
                if index == 0 {
                    vec![]
                } else {
                    vec![index - 1]
                }
            }
            ExecutionType::Parallel => vec![],
            ExecutionType::Hybrid => self.steps[index].dependencies.clone(),
        }
    }

    /// Steps whose successful output is threaded into this step's
    /// prompt. Single-step plans get no augmentation regardless of
    /// execution type.
    pub fn context_sources(&self, index: usize) -> Vec<usize> {
        if self.steps.len() <= 1 {
            return vec![];
        }
        match self.execution_type {
            ExecutionType::Sequential => (0..index).collect(),
            ExecutionType::Parallel => vec![],
            ExecutionType::Hybrid => self.steps[index].dependencies.clone(),
        }
    }

    /// Topological levels: level 0 has no dependencies, level k is
    /// `max(dependency levels) + 1`. Within a level steps may run
    /// concurrently; between levels the scheduler barriers.
    pub fn execution_levels(&self) -> Result<Vec<Vec<usize>>, PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }

        match self.execution_type {
            ExecutionType::Sequential => Ok((0..self.steps.len()).map(|i| vec![i]).collect()),
            ExecutionType::Parallel => Ok(vec![(0..self.steps.len()).collect()]),
            ExecutionType::Hybrid => self.hybrid_levels(),
        }
    }

    fn hybrid_levels(&self) -> Result<Vec<Vec<usize>>, PlanError> {
        let n = self.steps.len();
        let mut level_of = vec![usize::MAX; n];
        let mut levels: Vec<Vec<usize>> = Vec::new();
        let mut placed = 0usize;

        while placed < n {
            let mut level = Vec::new();
            for step in &self.steps {
                if level_of[step.index] != usize::MAX {
                    continue;
                }
                let ready = step
                    .dependencies
                    .iter()
                    .all(|&dep| level_of[dep] != usize::MAX && level_of[dep] < levels.len());
                if ready {
                    level.push(step.index);
                }
            }
            if level.is_empty() {
                return Err(PlanError::CycleDetected);
            }
            for &index in &level {
                level_of[index] = levels.len();
            }
            placed += level.len();
            levels.push(level);
        }

        Ok(levels)
    }
}
