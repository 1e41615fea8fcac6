// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! REST client for the control plane

use super::types::*;
use super::ControlPlane;
use crate::constants::API_KEY_HEADER;
use crate::error::{ApiError, ApiResult};
use crate::secret::Secret;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct HttpControlPlane {
    client: Client,
    base_url: String,
    api_token: Secret<String>,
}

impl HttpControlPlane {
    pub fn new(base_url: &str, api_token: Secret<String>) -> ApiResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(API_KEY_HEADER, self.api_token.expose())
            .header("Accept", "application/json")
    }

    async fn execute(&self, builder: RequestBuilder) -> ApiResult<reqwest::Response> {
        let response = self.authorized(builder).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "Control plane request failed");
        Err(match status.as_u16() {
            404 => ApiError::NotFound(body),
            409 => ApiError::Conflict(body),
            code => ApiError::Status { status: code, body },
        })
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = self.execute(builder).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to decode control plane response: {}", e))
        })
    }

    async fn find_node_configuration(
        &self,
        cluster_id: &str,
        name: &str,
    ) -> ApiResult<Option<NodeConfigurationRef>> {
        let path = format!("/v1/kubernetes/clusters/{}/node-configurations", cluster_id);
        let list: NodeConfigurationList = self.send(self.client.get(self.url(&path))).await?;
        Ok(list.items.into_iter().find(|c| c.name == name))
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    #[instrument(skip(self, request), fields(cluster = %request.name))]
    async fn register_cluster(&self, request: &RegisterClusterRequest) -> ApiResult<ExternalCluster> {
        debug!("Registering external cluster");
        self.send(
            self.client
                .post(self.url("/v1/kubernetes/external-clusters"))
                .json(request),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn create_cluster_token(&self, cluster_id: &str) -> ApiResult<Secret<String>> {
        let path = format!("/v1/kubernetes/clusters/{}/token", cluster_id);
        let token: ClusterToken = self.send(self.client.post(self.url(&path))).await?;
        Ok(Secret::new(token.token))
    }

    #[instrument(skip(self))]
    async fn delegate_principal(&self, cluster_id: &str) -> ApiResult<String> {
        let path = format!(
            "/v1/kubernetes/external-clusters/{}/assume-role-user",
            cluster_id
        );
        let user: AssumeRoleUser = self.send(self.client.get(self.url(&path))).await?;
        Ok(user.arn)
    }

    #[instrument(skip(self, request))]
    async fn elevate_cluster(
        &self,
        cluster_id: &str,
        request: &ElevateClusterRequest,
    ) -> ApiResult<ExternalCluster> {
        let path = format!("/v1/kubernetes/external-clusters/{}/credentials", cluster_id);
        self.send(self.client.post(self.url(&path)).json(request))
            .await
    }

    #[instrument(skip(self, update))]
    async fn update_cluster_network(
        &self,
        cluster_id: &str,
        update: &ClusterNetworkUpdate,
    ) -> ApiResult<()> {
        let path = format!("/v1/kubernetes/external-clusters/{}", cluster_id);
        self.execute(self.client.patch(self.url(&path)).json(update))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, configuration), fields(configuration = %configuration.name))]
    async fn upsert_node_configuration(
        &self,
        cluster_id: &str,
        configuration: &NodeConfiguration,
    ) -> ApiResult<String> {
        let base = format!("/v1/kubernetes/clusters/{}/node-configurations", cluster_id);

        if let Some(existing) = self
            .find_node_configuration(cluster_id, &configuration.name)
            .await?
        {
            debug!(id = %existing.id, "Updating existing node configuration");
            let path = format!("{}/{}", base, existing.id);
            self.execute(self.client.put(self.url(&path)).json(configuration))
                .await?;
            return Ok(existing.id);
        }

        debug!("Creating node configuration");
        let created: NodeConfigurationRef = self
            .send(self.client.post(self.url(&base)).json(configuration))
            .await?;
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn set_default_node_configuration(
        &self,
        cluster_id: &str,
        configuration_id: &str,
    ) -> ApiResult<()> {
        let path = format!(
            "/v1/kubernetes/clusters/{}/node-configurations/{}/default",
            cluster_id, configuration_id
        );
        self.execute(self.client.post(self.url(&path))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(server: &MockServer) -> HttpControlPlane {
        HttpControlPlane::new(&server.uri(), Secret::new("api-token".to_string())).unwrap()
    }

    fn make_configuration() -> NodeConfiguration {
        NodeConfiguration {
            name: "default".to_string(),
            subnets: vec!["subnet-1".to_string()],
            tags: Default::default(),
            eks: Some(EksNodeConfiguration {
                security_groups: vec!["sg-1".to_string()],
                instance_profile_arn: "arn:aws:iam::1:instance-profile/p".to_string(),
            }),
            gke: None,
        }
    }

    #[tokio::test]
    async fn test_register_cluster_sends_api_key_and_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/external-clusters"))
            .and(header("X-API-Key", "api-token"))
            .and(body_json(json!({
                "name": "demo",
                "eks": {"accountId": "111122223333", "region": "eu-west-1", "clusterName": "demo"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "c-123", "credentialsId": "cred-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cluster = make_client(&server)
            .register_cluster(&RegisterClusterRequest {
                name: "demo".to_string(),
                eks: Some(EksLocation {
                    account_id: "111122223333".to_string(),
                    region: "eu-west-1".to_string(),
                    cluster_name: "demo".to_string(),
                }),
                gke: None,
            })
            .await
            .unwrap();

        assert_eq!(cluster.id, "c-123");
        assert_eq!(cluster.credentials_id.as_deref(), Some("cred-1"));
    }

    #[tokio::test]
    async fn test_cluster_token_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/clusters/c-123/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "boot"})))
            .mount(&server)
            .await;

        let token = make_client(&server).create_cluster_token("c-123").await.unwrap();

        assert_eq!(token.expose(), "boot");
        assert_eq!(format!("{:?}", token), "Secret([REDACTED])");
    }

    #[tokio::test]
    async fn test_delegate_principal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/kubernetes/external-clusters/c-123/assume-role-user"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"arn": "arn:aws:iam::999:user/castai"})),
            )
            .mount(&server)
            .await;

        let arn = make_client(&server).delegate_principal("c-123").await.unwrap();
        assert_eq!(arn, "arn:aws:iam::999:user/castai");
    }

    #[tokio::test]
    async fn test_elevate_cluster_sends_key_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/external-clusters/c-123/credentials"))
            .and(body_json(json!({
                "credentials": "{\"private_key\":\"k\"}",
                "deleteNodesOnDisconnect": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-123"})))
            .expect(1)
            .mount(&server)
            .await;

        let request = ElevateClusterRequest {
            credentials: Some(Secret::new("{\"private_key\":\"k\"}".to_string())),
            eks: None,
            delete_nodes_on_disconnect: false,
        };
        assert!(!format!("{:?}", request).contains("private_key"));

        let cluster = make_client(&server)
            .elevate_cluster("c-123", &request)
            .await
            .unwrap();
        assert_eq!(cluster.id, "c-123");
    }

    #[tokio::test]
    async fn test_update_cluster_network_patches_cluster() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1/kubernetes/external-clusters/c-123"))
            .and(body_json(json!({
                "eks": {
                    "instanceProfileArn": "arn:profile",
                    "securityGroups": ["sg-created", "sg-user"]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-123"})))
            .expect(1)
            .mount(&server)
            .await;

        make_client(&server)
            .update_cluster_network(
                "c-123",
                &ClusterNetworkUpdate {
                    eks: EksNetwork {
                        instance_profile_arn: "arn:profile".to_string(),
                        security_groups: vec!["sg-created".to_string(), "sg-user".to_string()],
                    },
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_creates_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/kubernetes/clusters/c-123/node-configurations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/clusters/c-123/node-configurations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "cfg-1", "name": "default"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = make_client(&server)
            .upsert_node_configuration("c-123", &make_configuration())
            .await
            .unwrap();
        assert_eq!(id, "cfg-1");
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/kubernetes/clusters/c-123/node-configurations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "cfg-other", "name": "spot"},
                    {"id": "cfg-7", "name": "default", "default": true}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/kubernetes/clusters/c-123/node-configurations/cfg-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cfg-7"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/clusters/c-123/node-configurations"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let id = make_client(&server)
            .upsert_node_configuration("c-123", &make_configuration())
            .await
            .unwrap();
        assert_eq!(id, "cfg-7");
    }

    #[tokio::test]
    async fn test_error_statuses_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/kubernetes/external-clusters/missing/assume-role-user"))
            .respond_with(ResponseTemplate::new(404).set_body_string("cluster not found"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/kubernetes/external-clusters/flaky/assume-role-user"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = make_client(&server);

        let err = client.delegate_principal("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref body) if body == "cluster not found"));
        assert!(!err.is_retryable());

        let err = client.delegate_principal("flaky").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/clusters/c-123/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = make_client(&server)
            .create_cluster_token("c-123")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
