//! Coarse-grained permission tags read from user metadata.
//!
//! Matching is exact string equality over an unordered set. There is no hierarchy
//! and no wildcard.

use std::collections::HashSet;

use serde_json::Value;

use crate::services::identity::User;

pub const PROFILE_READ: &str = "profile:read";
pub const APP_ACCESS: &str = "app:access";

const DEFAULT_DESCRIPTION: &str = "Access to application features";

/// Human readable description shown on the consent screen.
pub fn describe(scope: &str) -> &'static str {
    match scope {
        "profile:read" => "View your profile information (name, email)",
        "app:access" => "Access and interact with the application",
        "tasks:read" => "Read your tasks and projects",
        "tasks:write" => "Create and update your tasks",
        _ => DEFAULT_DESCRIPTION,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scopes(HashSet<String>);

impl Scopes {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `user_metadata.scopes` wins unless it is unset or falsy; then `app_metadata.scopes`.
    /// Whatever is picked must be an array; non-string entries are dropped.
    pub fn from_user(user: &User) -> Self {
        let picked = [&user.user_metadata, &user.app_metadata]
            .into_iter()
            .filter_map(|metadata| metadata.get("scopes"))
            .find(|value| is_truthy(value));

        match picked {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Self::empty(),
        }
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// True iff every required scope is present. An empty requirement always passes.
    pub fn contains_all<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|scope| self.contains(scope.as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<String> for Scopes {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
