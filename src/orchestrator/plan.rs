// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The onboarding workflow as an explicit dependency graph.

use super::phase;
use crate::constants::DEFAULT_NODE_CONFIGURATION;
use crate::control_plane::RegisterClusterRequest;
use crate::types::{Component, OnboardingRequest, StepId};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Everything the workflow can do. Payloads are fixed when the plan is built;
/// values produced by earlier steps are read from the executor outputs.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    RegisterCluster(RegisterClusterRequest),
    LookupDelegate,
    ProvisionIdentity,
    ProvisionNetwork,
    ReconcileAuth,
    ElevateCluster { delete_nodes_on_disconnect: bool },
    /// Security groups supplied by the user, attached next to the created one
    UpdateClusterNetwork { security_groups: Vec<String> },
    CreateNodeConfiguration { name: String },
    SetDefaultNodeConfiguration,
    Install(Component),
}

impl Operation {
    pub fn step_id(&self) -> StepId {
        match self {
            Operation::RegisterCluster(_) => StepId::RegisterCluster,
            Operation::LookupDelegate => StepId::LookupDelegate,
            Operation::ProvisionIdentity => StepId::ProvisionIdentity,
            Operation::ProvisionNetwork => StepId::ProvisionNetwork,
            Operation::ReconcileAuth => StepId::ReconcileAuth,
            Operation::ElevateCluster { .. } => StepId::ElevateCluster,
            Operation::UpdateClusterNetwork { .. } => StepId::UpdateClusterNetwork,
            Operation::CreateNodeConfiguration { .. } => StepId::CreateNodeConfiguration,
            Operation::SetDefaultNodeConfiguration => StepId::SetDefaultNodeConfiguration,
            Operation::Install(component) => StepId::Install(*component),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub operation: Operation,
    pub depends_on: Vec<StepId>,
}

impl Task {
    pub fn new(operation: Operation, depends_on: impl IntoIterator<Item = StepId>) -> Self {
        Self {
            operation,
            depends_on: depends_on.into_iter().collect(),
        }
    }

    pub fn id(&self) -> StepId {
        self.operation.step_id()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("step {0} appears more than once")]
    DuplicateStep(StepId),

    #[error("step {step} depends on {dependency}, which is not part of the plan")]
    UnknownDependency { step: StepId, dependency: StepId },

    #[error("dependency cycle between steps {}", format_steps(.0))]
    Cycle(Vec<StepId>),
}

fn format_steps(steps: &[StepId]) -> String {
    steps
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A validated, acyclic set of tasks
#[derive(Clone, Debug)]
pub struct Plan {
    tasks: Vec<Task>,
    order: Vec<StepId>,
}

impl Plan {
    pub fn new(tasks: Vec<Task>) -> Result<Self, PlanError> {
        let mut ids = HashSet::new();
        for task in &tasks {
            if !ids.insert(task.id()) {
                return Err(PlanError::DuplicateStep(task.id()));
            }
        }
        for task in &tasks {
            if let Some(dependency) = task.depends_on.iter().find(|d| !ids.contains(d)) {
                return Err(PlanError::UnknownDependency {
                    step: task.id(),
                    dependency: *dependency,
                });
            }
        }

        let order = topological_order(&tasks)?;
        Ok(Self { tasks, order })
    }

    /// Plan for one onboarding request. Observe-only requests get registration
    /// and the monitoring agent; full management adds provisioning, elevation
    /// and the managed components.
    pub fn for_request(request: &OnboardingRequest) -> Result<Self, PlanError> {
        use StepId::*;

        let mut tasks = vec![
            Task::new(
                Operation::RegisterCluster(phase::registration_request(request)),
                [],
            ),
            Task::new(Operation::Install(Component::Agent), [RegisterCluster]),
        ];

        if !request.full_management {
            return Self::new(tasks);
        }

        if request.is_eks() {
            tasks.push(Task::new(Operation::LookupDelegate, [RegisterCluster]));
            tasks.push(Task::new(
                Operation::ProvisionIdentity,
                [RegisterCluster, LookupDelegate],
            ));
        } else {
            tasks.push(Task::new(Operation::ProvisionIdentity, [RegisterCluster]));
        }

        tasks.extend([
            Task::new(Operation::ProvisionNetwork, [RegisterCluster]),
            Task::new(Operation::ReconcileAuth, [RegisterCluster, ProvisionIdentity]),
            Task::new(
                Operation::ElevateCluster {
                    delete_nodes_on_disconnect: request.delete_nodes_on_disconnect,
                },
                [RegisterCluster, ProvisionIdentity, ProvisionNetwork],
            ),
        ]);

        if request.is_eks() {
            tasks.push(Task::new(
                Operation::UpdateClusterNetwork {
                    security_groups: request.network.security_groups.clone(),
                },
                [ElevateCluster, ProvisionIdentity, ProvisionNetwork],
            ));
        }

        tasks.extend([
            Task::new(
                Operation::CreateNodeConfiguration {
                    name: DEFAULT_NODE_CONFIGURATION.to_string(),
                },
                [ElevateCluster, ProvisionIdentity, ProvisionNetwork],
            ),
            Task::new(
                Operation::SetDefaultNodeConfiguration,
                [CreateNodeConfiguration],
            ),
        ]);

        let components = Component::MANAGED
            .into_iter()
            .chain(Component::optional(&request.components));
        for component in components {
            tasks.push(Task::new(Operation::Install(component), [ElevateCluster]));
        }

        Self::new(tasks)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, step: StepId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id() == step)
    }

    pub fn contains(&self, step: StepId) -> bool {
        self.get(step).is_some()
    }

    /// Steps in an order where every step follows all of its dependencies
    pub fn order(&self) -> &[StepId] {
        &self.order
    }

    /// Steps that directly or transitively depend on `step`
    pub fn dependents(&self, step: StepId) -> BTreeSet<StepId> {
        let mut found = BTreeSet::new();
        let mut frontier = vec![step];
        while let Some(current) = frontier.pop() {
            for task in &self.tasks {
                if task.depends_on.contains(&current) && found.insert(task.id()) {
                    frontier.push(task.id());
                }
            }
        }
        found
    }
}

/// Kahn's algorithm; ties are broken by step id so the order is stable
fn topological_order(tasks: &[Task]) -> Result<Vec<StepId>, PlanError> {
    let mut in_degree: BTreeMap<StepId, usize> = BTreeMap::new();
    let mut reverse_edges: BTreeMap<StepId, Vec<StepId>> = BTreeMap::new();

    for task in tasks {
        in_degree.insert(task.id(), task.depends_on.len());
        for dependency in &task.depends_on {
            reverse_edges.entry(*dependency).or_default().push(task.id());
        }
    }

    let mut ready: BTreeSet<StepId> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order = Vec::with_capacity(tasks.len());

    while let Some(step) = ready.pop_first() {
        order.push(step);
        for dependent in reverse_edges.get(&step).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != tasks.len() {
        let in_cycle = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id)
            .collect();
        return Err(PlanError::Cycle(in_cycle));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::Secret;
    use crate::types::{CloudLocation, ComponentToggles, NetworkScope};
    use std::collections::BTreeMap;

    fn make_request(cloud: CloudLocation, full_management: bool) -> OnboardingRequest {
        OnboardingRequest {
            cluster_name: "demo".to_string(),
            cloud,
            api_url: "https://api.cast.ai".to_string(),
            api_token: Secret::new("token".to_string()),
            full_management,
            network: NetworkScope {
                subnets: vec!["subnet-a".to_string()],
                security_groups: vec!["sg-user".to_string()],
                network_tags: vec!["castai".to_string()],
            },
            delete_nodes_on_disconnect: true,
            components: ComponentToggles::default(),
            tags: BTreeMap::new(),
        }
    }

    fn eks() -> CloudLocation {
        CloudLocation::Eks {
            account_id: "111122223333".to_string(),
            region: "eu-west-1".to_string(),
            vpc_id: None,
        }
    }

    fn gke() -> CloudLocation {
        CloudLocation::Gke {
            project_id: "p".to_string(),
            location: "us-central1".to_string(),
        }
    }

    fn position(plan: &Plan, step: StepId) -> usize {
        plan.order().iter().position(|s| *s == step).unwrap()
    }

    #[test]
    fn test_observe_only_plan_registers_and_installs_agent() {
        let plan = Plan::for_request(&make_request(eks(), false)).unwrap();

        assert_eq!(
            plan.order(),
            &[StepId::RegisterCluster, StepId::Install(Component::Agent)]
        );
        assert!(!plan.contains(StepId::ProvisionIdentity));
        assert!(!plan.contains(StepId::ElevateCluster));
    }

    #[test]
    fn test_full_eks_plan_orders_phases() {
        let plan = Plan::for_request(&make_request(eks(), true)).unwrap();

        assert!(position(&plan, StepId::RegisterCluster) < position(&plan, StepId::LookupDelegate));
        assert!(position(&plan, StepId::LookupDelegate) < position(&plan, StepId::ProvisionIdentity));
        assert!(position(&plan, StepId::ProvisionIdentity) < position(&plan, StepId::ElevateCluster));
        assert!(position(&plan, StepId::ProvisionNetwork) < position(&plan, StepId::ElevateCluster));
        assert!(
            position(&plan, StepId::ElevateCluster)
                < position(&plan, StepId::Install(Component::ClusterController))
        );
        assert!(
            position(&plan, StepId::CreateNodeConfiguration)
                < position(&plan, StepId::SetDefaultNodeConfiguration)
        );
        assert_eq!(
            plan.get(StepId::UpdateClusterNetwork).unwrap().operation,
            Operation::UpdateClusterNetwork {
                security_groups: vec!["sg-user".to_string()]
            }
        );
        assert_eq!(
            plan.get(StepId::ElevateCluster).unwrap().operation,
            Operation::ElevateCluster {
                delete_nodes_on_disconnect: true
            }
        );
    }

    #[test]
    fn test_full_gke_plan_has_no_delegate_or_network_update() {
        let plan = Plan::for_request(&make_request(gke(), true)).unwrap();

        assert!(!plan.contains(StepId::LookupDelegate));
        assert!(!plan.contains(StepId::UpdateClusterNetwork));
        assert_eq!(
            plan.get(StepId::ProvisionIdentity).unwrap().depends_on,
            vec![StepId::RegisterCluster]
        );
    }

    #[test]
    fn test_optional_components_follow_toggles() {
        let mut request = make_request(eks(), true);
        request.components.egressd = true;

        let plan = Plan::for_request(&request).unwrap();

        assert!(plan.contains(StepId::Install(Component::Egressd)));
        assert!(!plan.contains(StepId::Install(Component::WorkloadAutoscaler)));
        let installs = plan
            .tasks()
            .iter()
            .filter(|t| matches!(t.operation, Operation::Install(_)))
            .count();
        assert_eq!(installs, 6);
    }

    #[test]
    fn test_dependents_are_transitive() {
        let plan = Plan::for_request(&make_request(eks(), true)).unwrap();

        let blocked = plan.dependents(StepId::ProvisionIdentity);

        assert!(blocked.contains(&StepId::ReconcileAuth));
        assert!(blocked.contains(&StepId::ElevateCluster));
        assert!(blocked.contains(&StepId::SetDefaultNodeConfiguration));
        assert!(blocked.contains(&StepId::Install(Component::Evictor)));
        assert!(!blocked.contains(&StepId::ProvisionNetwork));
        assert!(!blocked.contains(&StepId::Install(Component::Agent)));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = Plan::new(vec![
            Task::new(Operation::ProvisionIdentity, [StepId::ProvisionNetwork]),
            Task::new(Operation::ProvisionNetwork, [StepId::ProvisionIdentity]),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            PlanError::Cycle(vec![StepId::ProvisionIdentity, StepId::ProvisionNetwork])
        );
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let err = Plan::new(vec![Task::new(
            Operation::ReconcileAuth,
            [StepId::ProvisionIdentity],
        )])
        .unwrap_err();

        assert_eq!(
            err,
            PlanError::UnknownDependency {
                step: StepId::ReconcileAuth,
                dependency: StepId::ProvisionIdentity
            }
        );
    }

    #[test]
    fn test_duplicate_step_is_rejected() {
        let err = Plan::new(vec![
            Task::new(Operation::LookupDelegate, []),
            Task::new(Operation::LookupDelegate, []),
        ])
        .unwrap_err();

        assert_eq!(err, PlanError::DuplicateStep(StepId::LookupDelegate));
    }
}
