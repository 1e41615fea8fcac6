// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory installer used for dry runs and tests.

use super::{ComponentInstaller, Release};
use crate::error::{ApiError, ApiResult};
use crate::types::Component;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

#[derive(Default)]
struct Inner {
    installed: Vec<(Component, Value)>,
    failures: HashMap<Component, String>,
    delays: HashMap<Component, Duration>,
}

/// Records every release it is asked to install
#[derive(Clone, Default)]
pub struct MemoryInstaller {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make installs of `component` fail with `message`
    pub fn fail_on(self, component: Component, message: &str) -> Self {
        self.lock().failures.insert(component, message.to_string());
        self
    }

    /// Make installs of `component` take `delay` before completing
    pub fn delay(self, component: Component, delay: Duration) -> Self {
        self.lock().delays.insert(component, delay);
        self
    }

    /// Components installed so far, in completion order
    pub fn installed(&self) -> Vec<Component> {
        self.lock().installed.iter().map(|(c, _)| *c).collect()
    }

    /// Values the last install of `component` received
    pub fn values(&self, component: Component) -> Option<Value> {
        self.lock()
            .installed
            .iter()
            .rev()
            .find(|(c, _)| *c == component)
            .map(|(_, v)| v.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ComponentInstaller for MemoryInstaller {
    async fn install(&self, release: &Release) -> ApiResult<()> {
        let delay = self.lock().delays.get(&release.component).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.lock().failures.get(&release.component).cloned() {
            return Err(ApiError::Command(message));
        }

        info!("Recorded release {} in {}", release.name, release.namespace);
        self.lock()
            .installed
            .push((release.component, release.values.expose().clone()));
        Ok(())
    }
}
