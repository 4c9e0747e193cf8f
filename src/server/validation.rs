use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::dto::CreateSentryAppRequest;
use crate::apps::NewSentryApp;
use crate::types::{Caller, Scopes};

const MAX_APP_NAME_LEN: usize = 64;

const REQUIRED: &str = "This field is required.";
const NOT_A_STRING: &str = "Not a valid string.";

/// Field name to the list of messages for that field.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

/// Reads a required string field. Records an error and returns None when the
/// value is missing, blank, or not a JSON string.
fn required_str<'a>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&'a Value>,
) -> Option<&'a str> {
    match value {
        None | Some(Value::Null) => {
            errors.add(field, REQUIRED);
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(field, REQUIRED);
            None
        }
        Some(Value::String(s)) => Some(s.trim()),
        Some(_) => {
            errors.add(field, NOT_A_STRING);
            None
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn validate_scopes(errors: &mut FieldErrors, value: Option<&Value>) -> Option<Scopes> {
    let items = match value {
        None | Some(Value::Null) => {
            errors.add("scopes", REQUIRED);
            return None;
        }
        Some(Value::Array(items)) if items.is_empty() => {
            errors.add("scopes", REQUIRED);
            return None;
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            errors.add(
                "scopes",
                format!(
                    "Expected a list of items but got type \"{}\".",
                    json_type_name(other)
                ),
            );
            return None;
        }
    };

    let mut scopes = Scopes::default();
    let mut valid = true;
    for item in items {
        match item.as_str().map(|token| (token, Scopes::parse(token))) {
            Some((_, Some(scope))) => scopes = scopes.union(scope),
            Some((token, None)) => {
                errors.add("scopes", format!("'{token}' is not a valid scope."));
                valid = false;
            }
            None => {
                errors.add("scopes", NOT_A_STRING);
                valid = false;
            }
        }
    }

    valid.then_some(scopes)
}

/// Checks a create request and resolves its organization against the caller's
/// memberships. Reports every failing field at once.
pub fn validate_create(
    req: &CreateSentryAppRequest,
    caller: &Caller,
) -> Result<NewSentryApp, FieldErrors> {
    let mut errors = FieldErrors::default();

    let name = match required_str(&mut errors, "name", req.name.as_ref()) {
        Some(name) if name.chars().count() > MAX_APP_NAME_LEN => {
            errors.add(
                "name",
                format!("Ensure this field has no more than {MAX_APP_NAME_LEN} characters."),
            );
            None
        }
        name => name.map(str::to_string),
    };

    let organization = required_str(&mut errors, "organization", req.organization.as_ref())
        .and_then(|slug| {
            let org = caller.find_organization(slug).cloned();
            if org.is_none() {
                errors.add("organization", "Organization not found.");
            }
            org
        });

    let scopes = validate_scopes(&mut errors, req.scopes.as_ref());

    let webhook_url = match required_str(&mut errors, "webhook_url", req.webhook_url.as_ref()) {
        Some(raw) if !is_http_url(raw) => {
            errors.add("webhook_url", "Enter a valid URL.");
            None
        }
        raw => raw.map(str::to_string),
    };

    match (name, organization, scopes, webhook_url) {
        (Some(name), Some(organization), Some(scopes), Some(webhook_url)) if errors.is_empty() => {
            Ok(NewSentryApp {
                name,
                organization,
                scopes,
                webhook_url,
            })
        }
        _ => Err(errors),
    }
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}
