// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Length-bounded cloud resource names derived from the cluster name and id.
//!
//! Names are composed as `<prefix>-<cluster name>-<kind>-<id>` where `<id>` is the
//! first [`CLUSTER_ID_PREFIX_LEN`] alphanumeric characters of the control-plane
//! cluster id. Only the cluster name segment is variable in length; it gets
//! whatever budget is left after the fixed segments and is truncated to fit, so
//! the composed name can never exceed the provider limit.

pub const CLUSTER_ID_PREFIX_LEN: usize = 8;

/// Provider constraints for one kind of resource name
#[derive(Debug, Clone, Copy)]
pub struct NameRules {
    pub max_len: usize,
    pub separator: char,
    pub lowercase: bool,
    allowed: fn(char) -> bool,
}

fn iam_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "+=,.@_-".contains(c)
}

fn security_group_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "._-:/()#,@[]+=&;{}!$*".contains(c)
}

fn gcp_account_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

fn gcp_role_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

pub const IAM_ROLE: NameRules = NameRules {
    max_len: 64,
    separator: '-',
    lowercase: false,
    allowed: iam_char,
};

pub const IAM_POLICY: NameRules = NameRules {
    max_len: 128,
    separator: '-',
    lowercase: false,
    allowed: iam_char,
};

pub const IAM_INSTANCE_PROFILE: NameRules = NameRules {
    max_len: 128,
    separator: '-',
    lowercase: false,
    allowed: iam_char,
};

pub const SECURITY_GROUP: NameRules = NameRules {
    max_len: 255,
    separator: '-',
    lowercase: false,
    allowed: security_group_char,
};

/// GCP service account ids: `^[a-z](?:[-a-z0-9]{4,28}[a-z0-9])$`
pub const GCP_SERVICE_ACCOUNT: NameRules = NameRules {
    max_len: 30,
    separator: '-',
    lowercase: true,
    allowed: gcp_account_char,
};

pub const GCP_CUSTOM_ROLE: NameRules = NameRules {
    max_len: 64,
    separator: '_',
    lowercase: false,
    allowed: gcp_role_char,
};

impl NameRules {
    fn sanitize(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            let c = if self.lowercase {
                c.to_ascii_lowercase()
            } else {
                c
            };
            let c = if (self.allowed)(c) { c } else { self.separator };
            if c == self.separator && out.ends_with(self.separator) {
                continue;
            }
            out.push(c);
        }
        out.trim_matches(self.separator).to_string()
    }

    fn id_part(&self, cluster_id: &str) -> String {
        cluster_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| {
                if self.lowercase {
                    c.to_ascii_lowercase()
                } else {
                    c
                }
            })
            .take(CLUSTER_ID_PREFIX_LEN)
            .collect()
    }
}

/// Compose a resource name that never exceeds `rules.max_len`.
pub fn bounded_name(
    rules: &NameRules,
    prefix: &str,
    cluster_name: &str,
    kind: Option<&str>,
    cluster_id: &str,
) -> String {
    let sep = rules.separator;
    let id = rules.id_part(cluster_id);
    let fixed: Vec<&str> = [Some(prefix), kind, Some(id.as_str())]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();

    let fixed_len: usize =
        fixed.iter().map(|s| s.len()).sum::<usize>() + fixed.len().saturating_sub(1);
    // one extra separator joins the cluster name segment
    let name_budget = rules.max_len.saturating_sub(fixed_len + 1);

    let name: String = rules.sanitize(cluster_name).chars().take(name_budget).collect();
    let name = name.trim_end_matches(sep);

    let mut parts: Vec<&str> = Vec::with_capacity(4);
    parts.push(prefix);
    if !name.is_empty() {
        parts.push(name);
    }
    parts.extend(fixed.iter().skip(1).copied());

    let mut composed = parts.join(&sep.to_string());
    if composed.len() > rules.max_len {
        composed.truncate(rules.max_len);
    }
    composed.trim_end_matches(sep).to_string()
}
