//! Pipeline graph description and validation.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{PipelineError, Result};
use crate::transforms::TransformConfig;

/// A named transform node.
#[derive(Debug, Clone)]
pub struct TransformMeta {
    pub name: String,
    pub config: TransformConfig,
}

impl TransformMeta {
    pub fn new(name: impl Into<String>, config: TransformConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// A data edge between two transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineHop {
    pub from: String,
    pub to: String,
    pub enabled: bool,
}

impl PipelineHop {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            enabled: true,
        }
    }
}

/// Transforms plus the hops wiring them together.
#[derive(Debug, Clone, Default)]
pub struct PipelineMeta {
    pub name: String,
    pub transforms: Vec<TransformMeta>,
    pub hops: Vec<PipelineHop>,
}

impl PipelineMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_transform(&mut self, name: impl Into<String>, config: TransformConfig) -> &mut Self {
        self.transforms.push(TransformMeta::new(name, config));
        self
    }

    pub fn add_hop(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.hops.push(PipelineHop::new(from, to));
        self
    }

    pub fn find_transform(&self, name: &str) -> Option<&TransformMeta> {
        self.transforms.iter().find(|t| t.name == name)
    }

    pub(crate) fn enabled_hops(&self) -> impl Iterator<Item = &PipelineHop> {
        self.hops.iter().filter(|h| h.enabled)
    }

    /// Check names, hop endpoints, duplicate hops, acyclicity and required inputs.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for transform in &self.transforms {
            if transform.name.is_empty() {
                return Err(PipelineError::Configuration(
                    "transform name cannot be empty".into(),
                ));
            }
            if !names.insert(transform.name.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "duplicate transform name: {}",
                    transform.name
                )));
            }
        }

        for hop in &self.hops {
            for end in [&hop.from, &hop.to] {
                if !names.contains(end.as_str()) {
                    return Err(PipelineError::Configuration(format!(
                        "hop {} -> {} references unknown transform '{}'",
                        hop.from, hop.to, end
                    )));
                }
            }
        }

        let mut edges = HashSet::new();
        for hop in self.enabled_hops() {
            if !edges.insert((hop.from.as_str(), hop.to.as_str())) {
                return Err(PipelineError::Configuration(format!(
                    "duplicate hop {} -> {}",
                    hop.from, hop.to
                )));
            }
        }

        self.topological_order()?;

        for transform in &self.transforms {
            if transform.config.requires_input()
                && !self.enabled_hops().any(|h| h.to == transform.name)
            {
                return Err(PipelineError::Configuration(format!(
                    "transform '{}' requires an input but has no incoming hop",
                    transform.name
                )));
            }
        }

        Ok(())
    }

    /// Transform indices ordered so every producer precedes its consumers
    /// (Kahn's algorithm over enabled hops). Fails on cycles.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let index: HashMap<&str, usize> = self
            .transforms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();

        let n = self.transforms.len();
        let mut in_degree = vec![0usize; n];
        let mut adj: Vec<Vec<usize>> = vec![vec![]; n];

        for hop in self.enabled_hops() {
            let (Some(&from), Some(&to)) = (index.get(hop.from.as_str()), index.get(hop.to.as_str()))
            else {
                continue;
            };
            adj[from].push(to);
            in_degree[to] += 1;
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &next in &adj[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != n {
            return Err(PipelineError::Configuration(format!(
                "cycle detected in pipeline '{}'",
                self.name
            )));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::{NormaliserMeta, RowGeneratorMeta};

    fn generator() -> TransformConfig {
        TransformConfig::RowGenerator(RowGeneratorMeta::default())
    }

    #[test]
    fn test_valid_linear_graph() {
        let mut meta = PipelineMeta::new("p");
        meta.add_transform("gen", generator())
            .add_transform("a", TransformConfig::Dummy)
            .add_transform("b", TransformConfig::Dummy)
            .add_hop("a", "b")
            .add_hop("gen", "a");
        meta.validate().unwrap();

        let order: Vec<&str> = meta
            .topological_order()
            .unwrap()
            .into_iter()
            .map(|i| meta.transforms[i].name.as_str())
            .collect();
        assert_eq!(order, vec!["gen", "a", "b"]);
    }

    #[test]
    fn test_duplicate_hop_rejected() {
        let mut meta = PipelineMeta::new("p");
        meta.add_transform("gen", generator())
            .add_transform("count", TransformConfig::Dummy)
            .add_hop("gen", "count")
            .add_hop("gen", "count");
        let err = meta.validate().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("duplicate hop gen -> count"));

        // A disabled copy does not carry rows, so it is not a duplicate.
        meta.hops[1].enabled = false;
        meta.validate().unwrap();
    }

    #[test]
    fn test_duplicate_name() {
        let mut meta = PipelineMeta::new("p");
        meta.add_transform("a", TransformConfig::Dummy)
            .add_transform("a", TransformConfig::Dummy);
        assert!(meta.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_dangling_hop() {
        let mut meta = PipelineMeta::new("p");
        meta.add_transform("a", TransformConfig::Dummy).add_hop("a", "ghost");
        let err = meta.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_cycle_detected() {
        let mut meta = PipelineMeta::new("p");
        meta.add_transform("a", TransformConfig::Dummy)
            .add_transform("b", TransformConfig::Dummy)
            .add_hop("a", "b")
            .add_hop("b", "a");
        let err = meta.validate().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_disabled_hop_breaks_cycle() {
        let mut meta = PipelineMeta::new("p");
        meta.add_transform("a", TransformConfig::Dummy)
            .add_transform("b", TransformConfig::Dummy)
            .add_hop("a", "b")
            .add_hop("b", "a");
        meta.hops[1].enabled = false;
        meta.validate().unwrap();
    }

    #[test]
    fn test_required_input_missing() {
        let mut meta = PipelineMeta::new("p");
        meta.add_transform("norm", TransformConfig::Normaliser(NormaliserMeta::default()));
        let err = meta.validate().unwrap_err();
        assert!(err.to_string().contains("requires an input"));
    }
}
