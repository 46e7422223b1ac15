//! Run-wide safety caps for the evaluator.
//!
//! Pathological grammars can drive the recursive evaluator into exponential
//! node counts or unbounded tree depth.  Both caps default to unbounded;
//! when set they are enforced on every evaluator entry and a breach aborts
//! the parse with a fatal error.  The tracker also keeps the high-water
//! marks reported in the final parse outcome.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-configurable evaluator caps.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ParseLimits {
    pub max_node_hits: Option<u64>,
    pub max_tree_depth: Option<usize>,
}

/// Counters surfaced in the parse outcome.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LimitMetrics {
    pub node_hits: u64,
    pub max_tree_depth: usize,
}

/// Stateful cap tracker used by the evaluator.
#[derive(Debug)]
pub struct LimitTracker {
    limits: ParseLimits,
    tree_depth: usize,
    metrics: LimitMetrics,
}

impl LimitTracker {
    pub fn new(limits: ParseLimits) -> Self {
        Self {
            limits,
            tree_depth: 0,
            metrics: LimitMetrics::default(),
        }
    }

    pub fn metrics(&self) -> LimitMetrics {
        self.metrics
    }

    pub fn tree_depth(&self) -> usize {
        self.tree_depth
    }

    /// Call on every evaluator entry.
    pub fn observe_node(&mut self) -> Result<(), LimitError> {
        self.metrics.node_hits += 1;
        if let Some(limit) = self.limits.max_node_hits {
            if self.metrics.node_hits > limit {
                return Err(LimitError::NodeHitLimit { limit });
            }
        }
        Ok(())
    }

    /// Descend one level of the parse tree.
    pub fn enter_node(&mut self) -> Result<(), LimitError> {
        self.tree_depth += 1;
        if self.tree_depth > self.metrics.max_tree_depth {
            self.metrics.max_tree_depth = self.tree_depth;
        }
        if let Some(limit) = self.limits.max_tree_depth {
            if self.tree_depth > limit {
                return Err(LimitError::TreeDepthLimit { limit });
            }
        }
        Ok(())
    }

    /// Return from one level of the parse tree.
    pub fn leave_node(&mut self) {
        if self.tree_depth > 0 {
            self.tree_depth -= 1;
        }
    }
}

/// Cap breaches raised to the caller as fatal parse errors.
#[derive(Debug, Error)]
pub enum LimitError {
    #[error("node hit limit exceeded (limit {limit})")]
    NodeHitLimit { limit: u64 },
    #[error("parse tree depth limit exceeded (limit {limit})")]
    TreeDepthLimit { limit: usize },
}
