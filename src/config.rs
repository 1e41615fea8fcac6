// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::helm;
use crate::secret::Secret;
use crate::types::OnboardingRequest;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the onboarding request (YAML or JSON)
    pub request_path: PathBuf,
    /// Overrides the token in the request file when set
    pub api_token: Option<Secret<String>>,
    pub api_url: Option<String>,
    /// Cluster connection used for the legacy auth merge and component installs
    pub kubeconfig_path: Option<PathBuf>,
    /// Run against in-memory collaborators only
    pub dry_run: bool,
    pub install_timeout: Duration,
    pub retry_max_attempts: u32,
    pub helm_repository: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let request_path = lookup("ONBOARDING_REQUEST")
            .map(PathBuf::from)
            .context("ONBOARDING_REQUEST environment variable not set")?;

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let dry_run: bool = non_empty("DRY_RUN")
            .unwrap_or_else(|| "false".to_string())
            .parse()
            .unwrap_or(false);

        let install_timeout_secs: u64 = match non_empty("INSTALL_TIMEOUT_SECS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("INSTALL_TIMEOUT_SECS is not a number: {}", v))?,
            None => helm::DEFAULT_TIMEOUT_SECS,
        };

        let retry_max_attempts: u32 = match non_empty("RETRY_MAX_ATTEMPTS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("RETRY_MAX_ATTEMPTS is not a number: {}", v))?,
            None => 5,
        };

        Ok(Config {
            request_path,
            api_token: non_empty("CASTAI_API_TOKEN").map(Secret::new),
            api_url: non_empty("CASTAI_API_URL"),
            kubeconfig_path: non_empty("KUBECONFIG_PATH").map(PathBuf::from),
            dry_run,
            install_timeout: Duration::from_secs(install_timeout_secs),
            retry_max_attempts: retry_max_attempts.max(1),
            helm_repository: non_empty("HELM_REPOSITORY")
                .unwrap_or_else(|| helm::DEFAULT_REPOSITORY.to_string()),
        })
    }

    /// Read the request file and apply the environment overrides
    pub async fn load_request(&self) -> Result<OnboardingRequest> {
        let raw = tokio::fs::read_to_string(&self.request_path)
            .await
            .with_context(|| format!("Failed to read {}", self.request_path.display()))?;
        // YAML is a superset of JSON, one parser covers both
        let request: OnboardingRequest = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.request_path.display()))?;
        Ok(self.apply_overrides(request))
    }

    pub fn apply_overrides(&self, mut request: OnboardingRequest) -> OnboardingRequest {
        if let Some(token) = &self.api_token {
            request.api_token = token.clone();
        }
        if let Some(url) = &self.api_url {
            request.api_url = url.clone();
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = make_config(&[("ONBOARDING_REQUEST", "/tmp/request.yaml")]).unwrap();

        assert_eq!(config.request_path, PathBuf::from("/tmp/request.yaml"));
        assert!(!config.dry_run);
        assert!(config.api_token.is_none());
        assert!(config.kubeconfig_path.is_none());
        assert_eq!(config.install_timeout, Duration::from_secs(300));
        assert_eq!(config.retry_max_attempts, 5);
        assert_eq!(config.helm_repository, "https://castai.github.io/helm-charts");
    }

    #[test]
    fn test_request_path_is_required() {
        assert!(make_config(&[]).is_err());
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let result = make_config(&[
            ("ONBOARDING_REQUEST", "r.yaml"),
            ("INSTALL_TIMEOUT_SECS", "soon"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_replace_request_fields() {
        let config = make_config(&[
            ("ONBOARDING_REQUEST", "r.yaml"),
            ("CASTAI_API_TOKEN", "from-env"),
            ("CASTAI_API_URL", "https://api.example.com"),
            ("DRY_RUN", "true"),
        ])
        .unwrap();
        assert!(config.dry_run);

        let request: OnboardingRequest = serde_yaml::from_str(
            "clusterName: demo\ncloud: { provider: gke, projectId: p, location: l }\napiToken: from-file\n",
        )
        .unwrap();
        let request = config.apply_overrides(request);

        assert_eq!(request.api_token.expose(), "from-env");
        assert_eq!(request.api_url, "https://api.example.com");
    }
}
