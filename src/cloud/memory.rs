// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory cloud used for dry runs and tests.

use super::{CloudApi, CustomRoleSpec, RoleSpec, SecurityGroupSpec};
use crate::error::{ApiError, ApiResult};
use crate::secret::Secret;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const DEFAULT_ACCOUNT: &str = "000000000000";
const DEFAULT_VPC: &str = "vpc-0a1b2c3d4e5f60718";

#[derive(Debug, Default)]
pub struct CloudState {
    pub roles: BTreeMap<String, RoleSpec>,
    pub policies: BTreeMap<String, Value>,
    pub role_attachments: BTreeSet<(String, String)>,
    pub instance_profiles: BTreeMap<String, String>,
    /// name -> (id, spec)
    pub security_groups: BTreeMap<String, (String, SecurityGroupSpec)>,
    /// group id -> number of self-referencing rules
    pub self_ingress_rules: BTreeMap<String, usize>,
    /// (cluster, principal) -> kind
    pub access_entries: BTreeMap<(String, String), String>,
    pub service_accounts: BTreeMap<String, String>,
    pub custom_roles: BTreeMap<String, CustomRoleSpec>,
    pub bindings: BTreeSet<(String, String, String)>,
    /// service account email -> ids of its live keys
    pub service_account_keys: BTreeMap<String, Vec<String>>,
    pub keys_issued: usize,
}

#[derive(Default)]
struct Inner {
    state: CloudState,
    calls: Vec<String>,
    failures: HashMap<&'static str, String>,
}

/// Cloud double keeping every resource in process memory.
///
/// Resources are keyed by name, so repeated puts return the original resource.
/// Clones share state.
#[derive(Clone)]
pub struct MemoryCloud {
    account_id: String,
    vpc_id: String,
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self {
            account_id: DEFAULT_ACCOUNT.to_string(),
            vpc_id: DEFAULT_VPC.to_string(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Account embedded in the ARNs this cloud hands out
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    pub fn with_vpc(mut self, vpc_id: impl Into<String>) -> Self {
        self.vpc_id = vpc_id.into();
        self
    }

    /// Make every call of `method` fail with a provider error
    pub fn fail_on(self, method: &'static str, message: impl Into<String>) -> Self {
        self.lock().failures.insert(method, message.into());
        self
    }

    /// Method names of all calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == method).count()
    }

    pub fn inspect<R>(&self, f: impl FnOnce(&CloudState) -> R) -> R {
        f(&self.lock().state)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a poisoned lock only means a test panicked mid-call; the state is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and return the guard, or the injected failure
    fn enter(&self, method: &'static str) -> ApiResult<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.calls.push(method.to_string());
        if let Some(message) = inner.failures.get(method) {
            return Err(ApiError::Provider(message.clone()));
        }
        debug!(method, "memory cloud call");
        Ok(inner)
    }

    fn arn(&self, kind: &str, name: &str) -> String {
        format!("arn:aws:iam::{}:{}/{}", self.account_id, kind, name)
    }
}

#[async_trait]
impl CloudApi for MemoryCloud {
    async fn put_role(&self, spec: &RoleSpec) -> ApiResult<String> {
        let mut inner = self.enter("put_role")?;
        inner
            .state
            .roles
            .entry(spec.name.clone())
            .or_insert_with(|| spec.clone());
        Ok(self.arn("role", &spec.name))
    }

    async fn put_policy(&self, name: &str, document: &Value) -> ApiResult<String> {
        let mut inner = self.enter("put_policy")?;
        inner
            .state
            .policies
            .entry(name.to_string())
            .or_insert_with(|| document.clone());
        Ok(self.arn("policy", name))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> ApiResult<()> {
        let mut inner = self.enter("attach_role_policy")?;
        if !inner.state.roles.contains_key(role_name) {
            return Err(ApiError::NotFound(format!("role {}", role_name)));
        }
        inner
            .state
            .role_attachments
            .insert((role_name.to_string(), policy_arn.to_string()));
        Ok(())
    }

    async fn put_instance_profile(&self, name: &str, role_name: &str) -> ApiResult<String> {
        let mut inner = self.enter("put_instance_profile")?;
        if !inner.state.roles.contains_key(role_name) {
            return Err(ApiError::NotFound(format!("role {}", role_name)));
        }
        inner
            .state
            .instance_profiles
            .entry(name.to_string())
            .or_insert_with(|| role_name.to_string());
        Ok(self.arn("instance-profile", name))
    }

    async fn cluster_vpc(&self, _cluster_name: &str, _region: &str) -> ApiResult<String> {
        self.enter("cluster_vpc")?;
        Ok(self.vpc_id.clone())
    }

    async fn put_security_group(&self, spec: &SecurityGroupSpec) -> ApiResult<String> {
        let mut inner = self.enter("put_security_group")?;
        let next = inner.state.security_groups.len() + 1;
        let (id, _) = inner
            .state
            .security_groups
            .entry(spec.name.clone())
            .or_insert_with(|| (format!("sg-{:017x}", next), spec.clone()));
        Ok(id.clone())
    }

    async fn authorize_self_ingress(&self, group_id: &str) -> ApiResult<bool> {
        let mut inner = self.enter("authorize_self_ingress")?;
        let rules = inner
            .state
            .self_ingress_rules
            .entry(group_id.to_string())
            .or_insert(0);
        if *rules > 0 {
            return Ok(false);
        }
        *rules += 1;
        Ok(true)
    }

    async fn ensure_access_entry(
        &self,
        cluster_name: &str,
        principal_arn: &str,
        kind: &str,
    ) -> ApiResult<bool> {
        let mut inner = self.enter("ensure_access_entry")?;
        let key = (cluster_name.to_string(), principal_arn.to_string());
        if inner.state.access_entries.contains_key(&key) {
            return Ok(false);
        }
        inner.state.access_entries.insert(key, kind.to_string());
        Ok(true)
    }

    async fn put_service_account(
        &self,
        project_id: &str,
        account_id: &str,
        _display_name: &str,
    ) -> ApiResult<String> {
        let mut inner = self.enter("put_service_account")?;
        let email = format!("{}@{}.iam.gserviceaccount.com", account_id, project_id);
        inner
            .state
            .service_accounts
            .insert(email.clone(), project_id.to_string());
        Ok(email)
    }

    async fn put_custom_role(&self, project_id: &str, spec: &CustomRoleSpec) -> ApiResult<String> {
        let mut inner = self.enter("put_custom_role")?;
        let name = format!("projects/{}/roles/{}", project_id, spec.role_id);
        // custom roles are updated in place so permission changes land on re-runs
        inner.state.custom_roles.insert(name.clone(), spec.clone());
        Ok(name)
    }

    async fn add_project_binding(
        &self,
        project_id: &str,
        role: &str,
        member: &str,
    ) -> ApiResult<()> {
        let mut inner = self.enter("add_project_binding")?;
        inner.state.bindings.insert((
            project_id.to_string(),
            role.to_string(),
            member.to_string(),
        ));
        Ok(())
    }

    async fn rotate_service_account_key(&self, email: &str) -> ApiResult<Secret<String>> {
        let mut inner = self.enter("rotate_service_account_key")?;
        if !inner.state.service_accounts.contains_key(email) {
            return Err(ApiError::NotFound(format!("service account {}", email)));
        }
        let key_id = uuid::Uuid::new_v4().to_string();
        inner.state.keys_issued += 1;
        inner
            .state
            .service_account_keys
            .insert(email.to_string(), vec![key_id.clone()]);
        let key = json!({
            "type": "service_account",
            "client_email": email,
            "private_key_id": key_id,
        });
        Ok(Secret::new(key.to_string()))
    }
}
