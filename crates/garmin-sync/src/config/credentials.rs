use crate::client::OAuth2Token;
use crate::error::{GarminError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const OAUTH2_FILENAME: &str = "oauth2_token.json";
const DEFAULT_PROFILE: &str = "default";

/// Reads the bearer token that the login step leaves in the profile directory.
pub struct CredentialStore {
    profile: String,
    base_dir: PathBuf,
}

impl CredentialStore {
    /// Credential store for `profile` beneath `data_dir`
    pub fn new(data_dir: &Path, profile: Option<String>) -> Result<Self> {
        let profile = profile.unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        if profile.is_empty() || profile.contains(&['/', '\\'][..]) || profile == ".." {
            return Err(GarminError::config(format!("Invalid profile name: {:?}", profile)));
        }
        let base_dir = data_dir.join(&profile);
        super::ensure_dir(&base_dir)?;

        Ok(Self { profile, base_dir })
    }

    /// Get the profile name
    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn token_path(&self) -> PathBuf {
        self.base_dir.join(OAUTH2_FILENAME)
    }

    /// Save OAuth2 token to storage
    pub fn save_oauth2(&self, token: &OAuth2Token) -> Result<()> {
        let path = self.token_path();
        let json = serde_json::to_string_pretty(token)?;
        fs::write(&path, json)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Load OAuth2 token from storage
    pub fn load_oauth2(&self) -> Result<Option<OAuth2Token>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)?;
        let token: OAuth2Token = serde_json::from_str(&json)
            .map_err(|e| GarminError::auth(format!("Unreadable token file {}: {}", path.display(), e)))?;
        Ok(Some(token))
    }

    /// Load a token that is usable right now
    pub fn require_token(&self) -> Result<OAuth2Token> {
        let token = self.load_oauth2()?.ok_or(GarminError::NotAuthenticated)?;
        token.ensure_valid()?;
        Ok(token)
    }

    /// Check if credentials exist
    pub fn has_credentials(&self) -> bool {
        self.token_path().exists()
    }

    /// Clear stored credentials
    pub fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
