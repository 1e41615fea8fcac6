// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod auth;
pub mod cloud;
pub mod config;
pub mod constants;
pub mod control_plane;
pub mod error;
pub mod install;
pub mod kubernetes;
pub mod naming;
pub mod orchestrator;
pub mod policy;
pub mod provision;
pub mod retry;
pub mod secret;
pub mod types;
pub mod validate;

#[cfg(test)]
pub mod test_utils;
