// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for client creation and namespace management.

pub mod client;
pub mod namespaces;

pub use client::client_from_kubeconfig_file;
pub use namespaces::ensure_namespace_exists;
