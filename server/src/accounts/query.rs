//! Filter semantics for `GET /users`.
//!
//! The query accepts `_id` (single id or comma-separated list), a `select`
//! parameter holding a JSON object of field conditions, and any remaining
//! query fields as string-equality conditions. Every condition must match
//! for a user to be included. The `roles` array field matches by membership
//! (string condition) or by any-overlap (array condition). Unknown ids and
//! empty results are not errors.

use std::collections::HashMap;

use serde_json::Value;

use crate::db::models::User;
use crate::error::ApiError;

#[derive(Debug, Default)]
pub struct UserFilter {
    /// Restrict the candidate set to these ids before filtering.
    pub ids: Option<Vec<String>>,
    /// Field conditions; all of them must match.
    pub conditions: Vec<(String, Value)>,
}

impl UserFilter {
    /// Parse raw query parameters into a filter.
    pub fn parse(params: &HashMap<String, String>) -> Result<Self, ApiError> {
        let mut filter = UserFilter::default();

        for (key, raw) in params {
            match key.as_str() {
                "_id" => {
                    let ids: Vec<String> = raw
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                    if ids.is_empty() {
                        return Err(ApiError::Validation("_id must not be empty".to_string()));
                    }
                    filter.ids = Some(ids);
                }
                "select" => {
                    let parsed: Value = serde_json::from_str(raw).map_err(|e| {
                        ApiError::Validation(format!("select is not valid JSON: {e}"))
                    })?;
                    let Value::Object(map) = parsed else {
                        return Err(ApiError::Validation(
                            "select must be a JSON object".to_string(),
                        ));
                    };
                    for (field, condition) in map {
                        filter.conditions.push((field, condition));
                    }
                }
                _ => {
                    filter
                        .conditions
                        .push((key.clone(), Value::String(raw.clone())));
                }
            }
        }

        Ok(filter)
    }

    /// Keep the users for which every condition matches.
    pub fn apply(&self, users: Vec<User>) -> Vec<User> {
        users
            .into_iter()
            .filter(|user| {
                self.conditions
                    .iter()
                    .all(|(field, condition)| matches_field(user, field, condition))
            })
            .collect()
    }
}

fn matches_field(user: &User, field: &str, condition: &Value) -> bool {
    match field {
        "roles" => match condition {
            Value::String(role) => user.roles.iter().any(|r| r == role),
            Value::Array(wanted) => wanted
                .iter()
                .filter_map(Value::as_str)
                .any(|role| user.roles.iter().any(|r| r == role)),
            _ => false,
        },
        "_id" | "id" => condition.as_str() == Some(user.id.as_str()),
        "username" => condition.as_str() == Some(user.username.as_str()),
        "email" => condition.as_str() == Some(user.email.as_str()),
        "fullName" | "full_name" => {
            condition.as_str().is_some() && condition.as_str() == user.full_name.as_deref()
        }
        "avatar" => condition.as_str().is_some() && condition.as_str() == user.avatar.as_deref(),
        _ => false,
    }
}
