// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pre-flight checks run before any side effect.

use crate::error::{OnboardError, Result};
use crate::types::{CloudLocation, OnboardingRequest};
use url::Url;

/// Reject requests whose mode or fields make the workflow impossible.
///
/// Full management needs a node placement scope: subnets plus security groups on
/// EKS, subnets plus network tags on GKE. Observe-only requests may carry
/// network fields; they are ignored.
pub fn validate(request: &OnboardingRequest) -> Result<()> {
    if request.cluster_name.trim().is_empty() {
        return Err(invalid("clusterName must not be empty"));
    }
    if request.api_token.is_empty() {
        return Err(invalid("apiToken must not be empty"));
    }
    validate_api_url(&request.api_url)?;
    validate_location(&request.cloud)?;

    if !request.full_management {
        return Ok(());
    }

    if request.network.subnets.is_empty() {
        return Err(invalid("network.subnets is required for full management"));
    }
    match request.cloud {
        CloudLocation::Eks { .. } if request.network.security_groups.is_empty() => Err(invalid(
            "network.securityGroups is required for full management on EKS",
        )),
        CloudLocation::Gke { .. } if request.network.network_tags.is_empty() => Err(invalid(
            "network.networkTags is required for full management on GKE",
        )),
        _ => Ok(()),
    }
}

fn validate_api_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw).map_err(|e| invalid(format!("apiUrl '{}' is invalid: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(()),
        _ => Err(invalid(format!("apiUrl '{}' must be an http(s) URL", raw))),
    }
}

fn validate_location(cloud: &CloudLocation) -> Result<()> {
    match cloud {
        CloudLocation::Eks {
            account_id, region, ..
        } => {
            if account_id.trim().is_empty() {
                return Err(invalid("cloud.accountId must not be empty"));
            }
            if region.trim().is_empty() {
                return Err(invalid("cloud.region must not be empty"));
            }
        }
        CloudLocation::Gke {
            project_id,
            location,
        } => {
            if project_id.trim().is_empty() {
                return Err(invalid("cloud.projectId must not be empty"));
            }
            if location.trim().is_empty() {
                return Err(invalid("cloud.location must not be empty"));
            }
        }
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> OnboardError {
    OnboardError::InvalidConfiguration(message.into())
}
