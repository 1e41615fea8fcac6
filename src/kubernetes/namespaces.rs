// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities

use crate::error::ApiResult;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client,
};
use tracing::{debug, info, instrument};

/// Ensure a namespace exists in the cluster, create if it doesn't
#[instrument(skip(client))]
pub async fn ensure_namespace_exists(client: &Client, namespace: &str) -> ApiResult<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    if namespaces.get_opt(namespace).await?.is_some() {
        debug!("Namespace {} already exists", namespace);
        return Ok(());
    }

    info!("Creating namespace {}", namespace);
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            info!("Namespace {} created successfully", namespace);
            Ok(())
        }
        // created concurrently by someone else
        Err(kube::Error::Api(err)) if err.code == 409 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{namespace_json, MockService};

    #[tokio::test]
    async fn test_existing_namespace_is_left_alone() {
        let mock = MockService::new().on_get(
            "/api/v1/namespaces/castai-agent",
            200,
            &namespace_json("castai-agent"),
        );
        let client = mock.clone().into_client();

        ensure_namespace_exists(&client, "castai-agent").await.unwrap();

        assert!(mock.requests().iter().all(|(m, _)| m == "GET"));
    }

    #[tokio::test]
    async fn test_missing_namespace_is_created() {
        let mock = MockService::new().on_post(
            "/api/v1/namespaces",
            201,
            &namespace_json("castai-agent"),
        );
        let client = mock.clone().into_client();

        ensure_namespace_exists(&client, "castai-agent").await.unwrap();

        assert!(mock
            .requests()
            .contains(&("POST".to_string(), "/api/v1/namespaces".to_string())));
    }
}
