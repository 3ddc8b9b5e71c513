//! Registry credentials for restored services
//!
//! Services are created with an `X-Registry-Auth` header so that managers can
//! pull private images. The credentials come from a JSON file following
//! Docker's registry authentication format.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SwarmError};

/// Credentials file looked up in the working directory when no path is given
pub const DEFAULT_CREDENTIALS_PATH: &str = "registry-credentials.json";

/// Docker registry authentication document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serveraddress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identitytoken: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrytoken: Option<String>,
}

impl RegistryAuth {
    /// Value of the `X-Registry-Auth` header: base64url-encoded JSON
    pub fn header_value(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(base64::engine::general_purpose::URL_SAFE.encode(json))
    }

    /// Parse credentials from JSON text
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Load registry credentials
///
/// With an explicit `path` the file must exist and parse. Without one, the
/// default file is used if present and silently skipped otherwise.
pub fn load_registry_auth(path: Option<&Path>) -> Result<Option<RegistryAuth>> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CREDENTIALS_PATH), false),
    };

    tracing::trace!(path = %path.display(), "reading registry credentials");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if explicit {
                return Err(SwarmError::CredentialsMissing {
                    path: path.display().to_string(),
                });
            }
            tracing::debug!("no registry credentials, restoring services without auth");
            return Ok(None);
        }
        Err(e) => {
            return Err(SwarmError::CredentialsParse {
                path: path.display().to_string(),
                message: e.to_string(),
            });
        }
    };

    let auth = RegistryAuth::from_json(&content).map_err(|e| SwarmError::CredentialsParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Some(auth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("creds.json");
        std::fs::write(
            &path,
            r#"{"username":"deploy","password":"s3cret","serveraddress":"registry.example.com"}"#,
        )
        .unwrap();

        let auth = load_registry_auth(Some(&path)).unwrap().unwrap();
        assert_eq!(auth.username.as_deref(), Some("deploy"));
        assert_eq!(auth.serveraddress.as_deref(), Some("registry.example.com"));
        assert!(auth.identitytoken.is_none());
    }

    #[test]
    fn test_explicit_missing_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.json");

        let result = load_registry_auth(Some(&path));
        assert!(matches!(result, Err(SwarmError::CredentialsMissing { .. })));
    }

    #[test]
    fn test_default_missing_is_tolerated() {
        // Tests run from the crate directory, which has no credentials file
        assert!(load_registry_auth(None).unwrap().is_none());
    }

    #[test]
    fn test_malformed_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("creds.json");
        std::fs::write(&path, "{ username: nope").unwrap();

        let result = load_registry_auth(Some(&path));
        assert!(matches!(result, Err(SwarmError::CredentialsParse { .. })));
    }

    #[test]
    fn test_header_value_is_url_safe_json() {
        let auth = RegistryAuth {
            username: Some("u".to_string()),
            password: Some("p".to_string()),
            ..Default::default()
        };
        let header = auth.header_value().unwrap();
        assert!(!header.contains('+') && !header.contains('/'));

        let decoded = base64::engine::general_purpose::URL_SAFE
            .decode(header)
            .unwrap();
        let back: RegistryAuth = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(back, auth);
    }
}
