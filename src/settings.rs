use crate::error::{AppError, AppResult};
use crate::login::{hash_password, verify_password};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsData {
    #[serde(default)]
    sheet_url: Option<String>,
    /// Argon2 PHC string; the plain password is never written.
    #[serde(default)]
    password_hash: Option<String>,
}

/// Sheet endpoint URL guarded by a settings password
///
/// Persisted as `settings.json` in the data directory and rewritten after
/// every change.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    data: SettingsData,
}

/// Public view of the settings; never includes the hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub sheet_url: Option<String>,
    pub is_password_set: bool,
}

impl Settings {
    /// Load settings from `path`, starting empty when the file does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str(&json)
                .map_err(|e| AppError::Storage(format!("Failed to parse settings: {}", e)))?
        } else {
            SettingsData::default()
        };
        Ok(Settings { path, data })
    }

    /// In-memory settings that are never written; used by tests and ephemeral runs.
    pub fn in_memory() -> Self {
        Settings {
            path: PathBuf::new(),
            data: SettingsData::default(),
        }
    }

    /// Write `data` and adopt it only once the file is written.
    fn commit(&mut self, data: SettingsData) -> AppResult<()> {
        if !self.path.as_os_str().is_empty() {
            self.write(&data)?;
        }
        self.data = data;
        Ok(())
    }

    fn write(&self, data: &SettingsData) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| AppError::Storage(format!("Failed to serialize settings: {}", e)))?;
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn sheet_url(&self) -> Option<&str> {
        self.data
            .sheet_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
    }

    pub fn is_password_set(&self) -> bool {
        self.data.password_hash.is_some()
    }

    pub fn view(&self) -> SettingsView {
        SettingsView {
            sheet_url: self.sheet_url().map(str::to_string),
            is_password_set: self.is_password_set(),
        }
    }

    /// First-time setup of the endpoint URL and the settings password.
    pub fn setup(&mut self, url: &str, password: &str, confirm: &str) -> AppResult<()> {
        if self.is_password_set() {
            return Err(AppError::Conflict(
                "Settings are already set up. Use the change form instead.".to_string(),
            ));
        }
        if url.trim().is_empty() || password.is_empty() || confirm.is_empty() {
            return Err(AppError::Validation("Please fill all fields.".to_string()));
        }
        if password != confirm {
            return Err(AppError::Validation(
                "Passwords do not match. Please try again.".to_string(),
            ));
        }
        let hash = hash_password(password).map_err(AppError::Internal)?;
        self.commit(SettingsData {
            sheet_url: Some(url.trim().to_string()),
            password_hash: Some(hash),
        })
    }

    /// Replace the endpoint URL after checking the settings password.
    pub fn change_url(&mut self, current_password: &str, new_url: &str) -> AppResult<()> {
        let verified = match &self.data.password_hash {
            Some(hash) => verify_password(current_password, hash).map_err(AppError::Internal)?,
            None => false,
        };
        if !verified {
            return Err(AppError::Validation(
                "Incorrect password. Please try again.".to_string(),
            ));
        }
        if new_url.trim().is_empty() {
            return Err(AppError::Validation(
                "The new URL field cannot be empty.".to_string(),
            ));
        }
        self.commit(SettingsData {
            sheet_url: Some(new_url.trim().to_string()),
            ..self.data.clone()
        })
    }
}
