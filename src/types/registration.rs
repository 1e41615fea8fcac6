// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::secret::Secret;
use serde::Serialize;
use std::fmt;

/// Registration phase of the cluster inside the control plane
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Requested,
    Registered,
    Managed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Requested => f.write_str("requested"),
            Phase::Registered => f.write_str("registered"),
            Phase::Managed => f.write_str("managed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("elevation references cluster {actual}, registered cluster is {expected}")]
    ClusterMismatch { expected: String, actual: String },
}

/// The cluster as known to the control plane after phase-1
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    pub cluster_id: String,
    /// One-time token the monitoring agent uses to authenticate
    pub bootstrap_token: Secret<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_id: Option<String>,
    phase: Phase,
}

impl RegistrationRecord {
    pub fn registered(
        cluster_id: impl Into<String>,
        bootstrap_token: Secret<String>,
        credentials_id: Option<String>,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            bootstrap_token,
            credentials_id,
            phase: Phase::Registered,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `Managed`. Only valid from `Registered` and for the same cluster id.
    pub fn elevate(&mut self, cluster_id: &str) -> Result<(), PhaseError> {
        if cluster_id != self.cluster_id {
            return Err(PhaseError::ClusterMismatch {
                expected: self.cluster_id.clone(),
                actual: cluster_id.to_string(),
            });
        }
        match self.phase {
            Phase::Registered => {
                self.phase = Phase::Managed;
                Ok(())
            }
            // re-running elevation against an already managed cluster is a no-op
            Phase::Managed => Ok(()),
            Phase::Requested => Err(PhaseError::InvalidTransition {
                from: self.phase,
                to: Phase::Managed,
            }),
        }
    }
}
