// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster-side component installation. Charts are opaque: we pass values and
//! optionally wait for the workload to become available.

pub mod helm;
pub mod memory;
pub mod values;

pub use helm::HelmInstaller;
pub use memory::MemoryInstaller;
pub use values::{values_for, ValuesContext};

use crate::error::ApiResult;
use crate::secret::Secret;
use crate::types::Component;
use async_trait::async_trait;
use serde_json::Value;

/// One chart release to install or upgrade
#[derive(Debug, Clone)]
pub struct Release {
    pub component: Component,
    pub chart: &'static str,
    pub name: &'static str,
    pub namespace: &'static str,
    pub create_namespace: bool,
    pub await_ready: bool,
    /// Values carry API keys, so they are kept out of logs
    pub values: Secret<Value>,
}

impl Release {
    pub fn new(component: Component, values: Value) -> Self {
        Self {
            component,
            chart: component.chart(),
            name: component.release_name(),
            namespace: component.namespace(),
            create_namespace: component.creates_namespace(),
            await_ready: component.await_ready(),
            values: Secret::new(values),
        }
    }
}

#[async_trait]
pub trait ComponentInstaller: Send + Sync {
    /// Install or upgrade the release. Returns once the release is applied and,
    /// if `await_ready` is set, its workload is available.
    async fn install(&self, release: &Release) -> ApiResult<()>;
}
