// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Runs a [`Plan`] concurrently.
//!
//! A task starts once all of its dependencies completed. Every ready task runs
//! at the same time; when one fails, everything that transitively depends on
//! it is skipped while independent branches carry on.

use super::plan::{Operation, Plan};
use crate::error::{OnboardError, Result};
use crate::types::{
    AuthReconciliation, CloudIdentity, ComponentInstallation, InstallStatus, RegistrationRecord,
    StepId,
};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use tracing::{debug, info, warn};

/// What a finished step hands to the steps after it
#[derive(Debug, Clone)]
pub enum StepOutput {
    Registered(RegistrationRecord),
    Delegate(String),
    Identity(CloudIdentity),
    SecurityScope(String),
    Auth(Option<AuthReconciliation>),
    /// Id of the cluster the control plane elevated
    Elevated(String),
    NetworkUpdated,
    NodeConfiguration(String),
    DefaultConfiguration(String),
    Installed(ComponentInstallation),
}

/// Values produced so far. Each task receives a snapshot taken when it starts.
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    pub registration: Option<RegistrationRecord>,
    pub delegate: Option<String>,
    pub identity: Option<CloudIdentity>,
    pub security_scope_id: Option<String>,
    pub auth: Option<AuthReconciliation>,
    pub node_configuration_id: Option<String>,
    pub default_configuration_id: Option<String>,
    pub installations: Vec<ComponentInstallation>,
}

impl Outputs {
    /// Record a step's output. Fails when the output contradicts the state,
    /// e.g. an elevation for another cluster or a component that did not install.
    fn apply(&mut self, step: StepId, output: StepOutput) -> Result<()> {
        match output {
            StepOutput::Registered(record) => self.registration = Some(record),
            StepOutput::Delegate(arn) => self.delegate = Some(arn),
            StepOutput::Identity(identity) => self.identity = Some(identity),
            StepOutput::SecurityScope(id) => self.security_scope_id = Some(id),
            StepOutput::Auth(auth) => self.auth = auth,
            StepOutput::Elevated(cluster_id) => {
                let record = self.registration.as_mut().ok_or_else(|| {
                    OnboardError::registration(step, &cluster_id, "cluster was never registered")
                })?;
                record
                    .elevate(&cluster_id)
                    .map_err(|e| OnboardError::registration(step, &cluster_id, e))?;
            }
            StepOutput::NetworkUpdated => {}
            StepOutput::NodeConfiguration(id) => self.node_configuration_id = Some(id),
            StepOutput::DefaultConfiguration(id) => self.default_configuration_id = Some(id),
            StepOutput::Installed(installation) => {
                let failure = match &installation.status {
                    InstallStatus::Installed => None,
                    InstallStatus::Failed { message } => Some(message.clone()),
                    InstallStatus::TimedOut { after_secs } => {
                        Some(format!("not ready after {}s", after_secs))
                    }
                };
                let release = installation.release.clone();
                self.installations.push(installation);
                if let Some(message) = failure {
                    return Err(OnboardError::installation(step, release, message));
                }
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StepStatus {
    Completed,
    Failed { error: String },
    /// Not started because a dependency did not complete
    Skipped { dependency: StepId },
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: StepId,
    #[serde(flatten)]
    pub status: StepStatus,
}

/// Result of running a whole plan
#[derive(Debug, Default)]
pub struct Execution {
    pub outputs: Outputs,
    /// One entry per task, in plan order
    pub steps: Vec<StepReport>,
    /// Failures in the order they happened, dependency skips included
    pub failures: Vec<OnboardError>,
}

impl Execution {
    pub fn status(&self, step: StepId) -> Option<&StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.status)
    }
}

/// Run every task of `plan` through `run`, respecting dependencies.
///
/// `run` receives the operation and a snapshot of the outputs of all steps
/// finished so far, and resolves to the step's output or its failure.
pub async fn execute<F, Fut>(plan: &Plan, run: F) -> Execution
where
    F: Fn(Operation, Outputs) -> Fut,
    Fut: Future<Output = (StepId, Result<StepOutput>)>,
{
    let mut outputs = Outputs::default();
    let mut statuses: BTreeMap<StepId, StepStatus> = BTreeMap::new();
    let mut failures = Vec::new();
    let mut pending: BTreeSet<StepId> = plan.order().iter().copied().collect();
    let mut completed: BTreeSet<StepId> = BTreeSet::new();
    let mut running = FuturesUnordered::new();

    loop {
        let ready: Vec<StepId> = plan
            .order()
            .iter()
            .copied()
            .filter(|step| pending.contains(step))
            .filter(|step| {
                plan.get(*step)
                    .map(|t| t.depends_on.iter().all(|d| completed.contains(d)))
                    .unwrap_or(false)
            })
            .collect();

        for step in ready {
            pending.remove(&step);
            if let Some(task) = plan.get(step) {
                debug!(step = %step, "Starting step");
                running.push(run(task.operation.clone(), outputs.clone()));
            }
        }

        let Some((step, result)) = running.next().await else {
            break;
        };

        match result.and_then(|output| outputs.apply(step, output)) {
            Ok(()) => {
                info!(step = %step, "Step completed");
                completed.insert(step);
                statuses.insert(step, StepStatus::Completed);
            }
            Err(e) => {
                warn!(step = %step, error = %e, "Step failed");
                statuses.insert(
                    step,
                    StepStatus::Failed {
                        error: e.to_string(),
                    },
                );
                failures.push(e);
                skip_dependents(plan, step, &mut pending, &mut statuses, &mut failures);
            }
        }
    }

    // unreachable for a validated plan, kept so every task gets a status
    for step in pending {
        statuses.entry(step).or_insert(StepStatus::Skipped { dependency: step });
    }

    let steps = plan
        .order()
        .iter()
        .filter_map(|step| {
            statuses.remove(step).map(|status| StepReport {
                step: *step,
                status,
            })
        })
        .collect();

    Execution {
        outputs,
        steps,
        failures,
    }
}

fn skip_dependents(
    plan: &Plan,
    failed: StepId,
    pending: &mut BTreeSet<StepId>,
    statuses: &mut BTreeMap<StepId, StepStatus>,
    failures: &mut Vec<OnboardError>,
) {
    for step in plan.dependents(failed) {
        if pending.remove(&step) {
            warn!(step = %step, dependency = %failed, "Skipping step");
            statuses.insert(step, StepStatus::Skipped { dependency: failed });
            failures.push(OnboardError::DependencyFailed {
                step: step.to_string(),
                dependency: failed.to_string(),
            });
        }
    }
}
