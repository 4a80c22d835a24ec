use std::env;
use std::fs;
use std::path::Path;
#[cfg(windows)]
use std::process::Command;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-api-key";
const ADMIN_TOKEN_FILE: &str = ".admin_token";

/// Shared secret guarding the administrative endpoints.
#[derive(Debug, Clone)]
pub struct AdminToken {
    value: String,
}

impl AdminToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Identifies the running process. Chat histories stamped with a different
/// token were written by an earlier process and are cleared on access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunToken {
    value: String,
}

impl RunToken {
    pub fn generate() -> Self {
        Self {
            value: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn from_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn matches(&self, stored: &str) -> bool {
        self.value == stored
    }
}

pub fn init_admin_token(paths: &AppPaths) -> AdminToken {
    if let Ok(token) = env::var("NEET_TUTOR_ADMIN_TOKEN") {
        if !token.trim().is_empty() {
            return AdminToken::new(token);
        }
    }

    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let token_path = paths.user_data_dir.join(ADMIN_TOKEN_FILE);
    if let Some(parent) = token_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Err(err) = fs::write(&token_path, &token) {
        tracing::warn!("Failed to write admin token: {}", err);
    }
    restrict_permissions(&token_path);

    AdminToken::new(token)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = fs::metadata(path) {
        let mut perms = metadata.permissions();
        perms.set_mode(0o600);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(windows)]
fn restrict_permissions(path: &Path) {
    let Some(path_str) = path.to_str() else {
        return;
    };

    let username = match env::var("USERNAME") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return,
    };
    let grant = format!("{}:(F)", username);

    let mut command = Command::new("icacls");
    command
        .arg(path_str)
        .arg("/inheritance:r")
        .arg("/grant:r")
        .arg(&grant)
        .arg("/remove:g")
        .arg("Users")
        .arg("Authenticated Users")
        .arg("Everyone");

    match command.status() {
        Ok(status) if status.success() => {}
        Ok(status) => {
            tracing::warn!(
                "Failed to apply Windows ACL to admin token (status: {})",
                status
            )
        }
        Err(err) => tracing::warn!("Failed to run icacls for admin token ACL: {}", err),
    }
}

#[cfg(not(any(unix, windows)))]
fn restrict_permissions(_path: &Path) {}

pub fn require_api_key(headers: &HeaderMap, expected: &AdminToken) -> Result<(), ApiError> {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() || header_value != expected.value() {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}
