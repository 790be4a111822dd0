//! Workflow graph: actions, conditional hops and the editing operations
//! that keep the graph's invariants (one start action, unique names).

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use sluice_types::{Registry, TypeError};
use tracing::{debug, warn};

use crate::actions::ActionConfig;
use crate::error::{Result, WorkflowError};

/// A named action node.
#[derive(Debug, Clone)]
pub struct ActionMeta {
    pub name: String,
    pub description: String,
    pub config: ActionConfig,
}

impl ActionMeta {
    pub fn new(name: impl Into<String>, config: ActionConfig) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            config,
        }
    }

    pub fn is_start(&self) -> bool {
        self.config.is_start()
    }

    pub fn is_unconditional(&self) -> bool {
        self.config.is_unconditional()
    }
}

/// A control-flow edge between two actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowHopMeta {
    pub from: String,
    pub to: String,
    pub enabled: bool,
    /// Result the hop follows when it is conditional.
    pub evaluation: bool,
    /// Followed whatever the result.
    pub unconditional: bool,
    /// Marks the failure-handling path; affects branch aggregation only.
    pub error_hop: bool,
}

impl WorkflowHopMeta {
    /// Hop followed on success.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            enabled: true,
            evaluation: true,
            unconditional: false,
            error_hop: false,
        }
    }

    pub fn unconditional(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            unconditional: true,
            ..Self::new(from, to)
        }
    }

    /// Error hop, followed on failure.
    pub fn on_failure(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            evaluation: false,
            error_hop: true,
            ..Self::new(from, to)
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the hop may be followed after an action with this result.
    pub fn is_eligible(&self, result: bool) -> bool {
        self.enabled && (self.unconditional || self.evaluation == result)
    }
}

/// Actions plus the hops wiring them together.
#[derive(Debug, Clone, Default)]
pub struct WorkflowMeta {
    pub name: String,
    pub actions: Vec<ActionMeta>,
    pub hops: Vec<WorkflowHopMeta>,
}

impl WorkflowMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────

    pub fn find_action(&self, name: &str) -> Option<&ActionMeta> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn find_action_mut(&mut self, name: &str) -> Option<&mut ActionMeta> {
        self.actions.iter_mut().find(|a| a.name == name)
    }

    pub fn find_start(&self) -> Option<&ActionMeta> {
        self.actions.iter().find(|a| a.is_start())
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.actions
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| WorkflowError::ActionNotFound(name.to_string()))
    }

    /// `base` if unused, otherwise the first free `base 2`, `base 3`, ...
    pub fn unique_name(&self, base: &str) -> String {
        self.unique_name_excluding(base, None)
    }

    fn unique_name_excluding(&self, base: &str, skip: Option<usize>) -> String {
        let taken = |candidate: &str| {
            self.actions
                .iter()
                .enumerate()
                .any(|(i, a)| Some(i) != skip && a.name == candidate)
        };
        if !taken(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{} {}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn check_start(&self, action: &ActionMeta) -> Result<()> {
        if action.is_start()
            && let Some(start) = self.find_start()
        {
            return Err(WorkflowError::DuplicateStart(start.name.clone()));
        }
        Ok(())
    }

    /// Add an action, suffixing its name on collision. Returns the stored
    /// name. A second start action is rejected and the graph is unchanged.
    pub fn add_action(&mut self, mut action: ActionMeta) -> Result<String> {
        if action.name.is_empty() {
            return Err(WorkflowError::Configuration(
                "action name cannot be empty".into(),
            ));
        }
        self.check_start(&action)?;

        let name = self.unique_name(&action.name);
        if name != action.name {
            debug!(workflow = %self.name, requested = %action.name, stored = %name, "action renamed on collision");
        }
        action.name = name.clone();
        self.actions.push(action);
        Ok(name)
    }

    /// Create an action from a registered plugin, named after the plugin.
    pub fn new_action(&mut self, registry: &Registry<ActionConfig>, plugin_id: &str) -> Result<String> {
        let descriptor = registry
            .descriptor(plugin_id)
            .ok_or_else(|| TypeError::PluginNotFound(plugin_id.to_string()))?;
        let config = registry.create(plugin_id)?;
        self.add_action(ActionMeta::new(descriptor.name, config))
    }

    /// Rename an action (suffixing on collision) and re-point its hops.
    pub fn rename_action(&mut self, name: &str, new_name: &str) -> Result<String> {
        let index = self.position(name)?;
        if new_name.is_empty() {
            return Err(WorkflowError::Configuration(
                "action name cannot be empty".into(),
            ));
        }
        let stored = self.unique_name_excluding(new_name, Some(index));
        self.actions[index].name = stored.clone();
        for hop in &mut self.hops {
            if hop.from == name {
                hop.from = stored.clone();
            }
            if hop.to == name {
                hop.to = stored.clone();
            }
        }
        Ok(stored)
    }

    /// Remove an action together with every hop touching it.
    pub fn remove_action(&mut self, name: &str) -> Result<ActionMeta> {
        let index = self.position(name)?;
        self.hops.retain(|h| h.from != name && h.to != name);
        Ok(self.actions.remove(index))
    }

    /// Copy an action under a fresh name. The start action cannot be copied.
    pub fn duplicate_action(&mut self, name: &str) -> Result<String> {
        let index = self.position(name)?;
        let copy = self.actions[index].clone();
        self.add_action(copy)
    }

    /// Put `action` in the middle of the hop `from -> to`.
    ///
    /// The hop into the new action keeps the original flags. The hop out of
    /// it keeps `enabled` and is unconditional when the action is, or when
    /// the original hop was.
    pub fn insert_action(&mut self, from: &str, to: &str, action: ActionMeta) -> Result<String> {
        let hop_index = self.hop_position(from, to)?;
        if action.is_start() {
            return Err(WorkflowError::Configuration(
                "a start action cannot be inserted into a hop".into(),
            ));
        }

        let unconditional = action.is_unconditional() || self.hops[hop_index].unconditional;
        let enabled = self.hops[hop_index].enabled;
        let name = self.add_action(action)?;

        self.hops[hop_index].to = name.clone();
        self.hops.push(WorkflowHopMeta {
            from: name.clone(),
            to: to.to_string(),
            enabled,
            evaluation: true,
            unconditional,
            error_hop: false,
        });
        Ok(name)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Hops
    // ─────────────────────────────────────────────────────────────────────

    fn hop_position(&self, from: &str, to: &str) -> Result<usize> {
        self.hops
            .iter()
            .position(|h| h.from == from && h.to == to)
            .ok_or_else(|| WorkflowError::HopNotFound {
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    pub fn find_hop(&self, from: &str, to: &str) -> Option<&WorkflowHopMeta> {
        self.hops.iter().find(|h| h.from == from && h.to == to)
    }

    pub fn find_hop_mut(&mut self, from: &str, to: &str) -> Option<&mut WorkflowHopMeta> {
        self.hops.iter_mut().find(|h| h.from == from && h.to == to)
    }

    /// Add a hop between two existing actions.
    pub fn add_hop(&mut self, hop: WorkflowHopMeta) -> Result<()> {
        for end in [&hop.from, &hop.to] {
            if self.find_action(end).is_none() {
                return Err(WorkflowError::ActionNotFound(end.clone()));
            }
        }
        if hop.from == hop.to {
            return Err(WorkflowError::Configuration(format!(
                "hop cannot loop on action '{}'",
                hop.from
            )));
        }
        if self.find_hop(&hop.from, &hop.to).is_some() {
            return Err(WorkflowError::Configuration(format!(
                "hop {} -> {} already exists",
                hop.from, hop.to
            )));
        }
        self.hops.push(hop);
        Ok(())
    }

    pub fn remove_hop(&mut self, from: &str, to: &str) -> Result<WorkflowHopMeta> {
        let index = self.hop_position(from, to)?;
        Ok(self.hops.remove(index))
    }

    /// All hops leaving `name`, enabled or not, in insertion order.
    pub fn outgoing_hops<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a WorkflowHopMeta> {
        self.hops.iter().filter(move |h| h.from == name)
    }

    pub fn incoming_hops<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a WorkflowHopMeta> {
        self.hops.iter().filter(move |h| h.to == name)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────

    /// Check for exactly one start action, unique names, hop endpoints and
    /// cycles over enabled hops.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for action in &self.actions {
            if action.name.is_empty() {
                return Err(WorkflowError::Configuration(
                    "action name cannot be empty".into(),
                ));
            }
            if !names.insert(action.name.as_str()) {
                return Err(WorkflowError::Configuration(format!(
                    "duplicate action name: {}",
                    action.name
                )));
            }
        }

        let mut starts = self.actions.iter().filter(|a| a.is_start());
        match (starts.next(), starts.next()) {
            (None, _) => {
                return Err(WorkflowError::Configuration(format!(
                    "workflow '{}' has no start action",
                    self.name
                )));
            }
            (Some(first), Some(_)) => {
                return Err(WorkflowError::DuplicateStart(first.name.clone()));
            }
            (Some(_), None) => {}
        }

        for hop in &self.hops {
            for end in [&hop.from, &hop.to] {
                if !names.contains(end.as_str()) {
                    return Err(WorkflowError::Configuration(format!(
                        "hop {} -> {} references unknown action '{}'",
                        hop.from, hop.to, end
                    )));
                }
            }
        }

        for action in &self.actions {
            let unconditional = self
                .outgoing_hops(&action.name)
                .filter(|h| h.enabled && h.unconditional && !h.error_hop)
                .count();
            if unconditional > 1 {
                warn!(
                    workflow = %self.name,
                    action = %action.name,
                    hops = unconditional,
                    "more than one unconditional hop leaves this action"
                );
            }
        }

        self.detect_cycles()
    }

    /// Kahn's algorithm over enabled hops.
    fn detect_cycles(&self) -> Result<()> {
        let mut in_degree: HashMap<&str, usize> =
            self.actions.iter().map(|a| (a.name.as_str(), 0)).collect();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

        for hop in self.hops.iter().filter(|h| h.enabled) {
            adjacency
                .entry(hop.from.as_str())
                .or_default()
                .push(hop.to.as_str());
            if let Some(degree) = in_degree.get_mut(hop.to.as_str()) {
                *degree += 1;
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&name, _)| name)
            .collect();
        let mut visited = 0;

        while let Some(node) = queue.pop_front() {
            visited += 1;
            if let Some(next) = adjacency.get(node) {
                for &to in next {
                    if let Some(degree) = in_degree.get_mut(to) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(to);
                        }
                    }
                }
            }
        }

        if visited != self.actions.len() {
            return Err(WorkflowError::Configuration(format!(
                "cycle detected in workflow '{}'",
                self.name
            )));
        }
        Ok(())
    }
}
