// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod auth;
pub mod component;
pub mod identity;
pub mod registration;
pub mod request;
pub mod step;

pub use auth::{AuthEntry, AuthReconciliation, MergeOutcome};
pub use component::{Component, ComponentInstallation, InstallStatus};
pub use identity::{CloudIdentity, IdentityDetail, TrustStatement};
pub use registration::{Phase, PhaseError, RegistrationRecord};
pub use request::{CloudLocation, ComponentToggles, NetworkScope, OnboardingRequest};
pub use step::StepId;
