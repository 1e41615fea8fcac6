// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cloud-side provisioning: the control-plane identity and the node security scope.

pub mod identity;
pub mod network;

pub use identity::IdentityProvisioner;
pub use network::NetworkSecurityProvisioner;

use crate::constants::{tags, OPERATOR_NAME};
use crate::error::{ApiError, ApiResult, OnboardError, Result};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::types::StepId;
use std::collections::BTreeMap;
use std::future::Future;

/// Run one cloud call with backoff and attribute a final failure to `step` and `target`
async fn cloud_call<T, F, Fut>(
    retry: &RetryConfig,
    step: StepId,
    target: &str,
    operation: &str,
    call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    retry_with_backoff(retry, operation, ApiError::is_retryable, call)
        .await
        .map_err(|e| OnboardError::provisioning(step, target, e))
}

/// Tags carried by every resource created for a cluster
fn ownership_tags(cluster_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (tags::CLUSTER_ID.to_string(), cluster_id.to_string()),
        (tags::MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
    ])
}
