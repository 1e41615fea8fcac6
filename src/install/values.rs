// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Chart values for each component. The keys are fixed by the charts.

use crate::secret::Secret;
use crate::types::Component;
use serde_json::{json, Value};

/// Everything a component's values may refer to
pub struct ValuesContext<'a> {
    pub provider: &'a str,
    pub api_url: &'a str,
    pub api_token: &'a Secret<String>,
    pub cluster_id: &'a str,
    /// Token issued at registration; the monitoring agent authenticates with it
    pub bootstrap_token: &'a Secret<String>,
}

pub fn values_for(component: Component, ctx: &ValuesContext<'_>) -> Value {
    match component {
        Component::Agent => json!({
            "provider": ctx.provider,
            // the release itself creates the namespace
            "createNamespace": false,
            "apiURL": ctx.api_url,
            "apiKey": ctx.bootstrap_token.expose(),
        }),
        Component::ClusterController => json!({
            "castai": {
                "clusterID": ctx.cluster_id,
                "apiURL": ctx.api_url,
                "apiKey": ctx.api_token.expose(),
            },
        }),
        Component::SpotHandler => json!({
            "castai": {
                "clusterID": ctx.cluster_id,
                "provider": ctx.provider,
            },
        }),
        Component::Evictor => json!({
            "replicaCount": 0,
        }),
        Component::PodPinner => json!({
            "castai": {
                "apiKey": ctx.api_token.expose(),
                "clusterID": ctx.cluster_id,
            },
            "replicaCount": 0,
        }),
        Component::WorkloadAutoscaler | Component::Egressd | Component::SecurityAgent => json!({
            "castai": {
                "apiKey": ctx.api_token.expose(),
                "apiURL": ctx.api_url,
                "clusterID": ctx.cluster_id,
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_context<R>(f: impl FnOnce(&ValuesContext<'_>) -> R) -> R {
        let api_token = Secret::new("api-token".to_string());
        let bootstrap_token = Secret::new("bootstrap".to_string());
        let ctx = ValuesContext {
            provider: "eks",
            api_url: "https://api.cast.ai",
            api_token: &api_token,
            cluster_id: "c-123",
            bootstrap_token: &bootstrap_token,
        };
        f(&ctx)
    }

    #[test]
    fn test_agent_uses_bootstrap_token() {
        let values = with_context(|ctx| values_for(Component::Agent, ctx));

        assert_eq!(
            values,
            json!({
                "provider": "eks",
                "createNamespace": false,
                "apiURL": "https://api.cast.ai",
                "apiKey": "bootstrap",
            })
        );
    }

    #[test]
    fn test_controller_uses_api_token() {
        let values = with_context(|ctx| values_for(Component::ClusterController, ctx));
        assert_eq!(values["castai"]["apiKey"], "api-token");
        assert_eq!(values["castai"]["clusterID"], "c-123");
    }

    #[test]
    fn test_evictor_and_pod_pinner_start_scaled_down() {
        with_context(|ctx| {
            assert_eq!(values_for(Component::Evictor, ctx)["replicaCount"], 0);
            assert_eq!(values_for(Component::PodPinner, ctx)["replicaCount"], 0);
        });
    }

    #[test]
    fn test_spot_handler_carries_no_credentials() {
        let values = with_context(|ctx| values_for(Component::SpotHandler, ctx));
        assert_eq!(
            values,
            json!({"castai": {"clusterID": "c-123", "provider": "eks"}})
        );
    }
}
