#[cfg(feature = "web")]
use crate::app::AppState;
use crate::config::BootstrapConfig;
use crate::error::{AppError, AppResult};
use crate::model::{NewUser, Role, User, View};
use crate::sheet::SheetClient;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
#[cfg(feature = "web")]
use axum::{
    Extension, Json,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
#[cfg(feature = "web")]
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
#[cfg(feature = "web")]
use std::sync::Arc;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds
const MIN_PASSWORD_LEN: usize = 6;

/// Credentials posted by the login form
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Server-side session data
#[derive(Debug, Clone)]
struct Session {
    user: User,
    expires_at: SystemTime,
}

/// In-memory session table keyed by the session cookie value
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(SESSION_DURATION))
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a session
    ///
    /// Generates a new session ID and stores the session with an expiration time.
    ///
    /// # Arguments
    /// * `user` - The user the session belongs to
    ///
    /// # Returns
    /// * `String` - A unique session ID
    pub fn create(&self, user: User) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            user,
            expires_at: SystemTime::now() + self.ttl,
        };
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.expires_at > SystemTime::now());
        sessions.insert(session_id.clone(), session);
        session_id
    }

    /// The session's user, if the session exists and has not expired.
    pub fn validate(&self, session_id: &str) -> Option<User> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id)
            .filter(|s| s.expires_at > SystemTime::now())
            .map(|s| s.user.clone())
    }

    pub fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id).is_some()
    }
}

/// Hash a password using Argon2
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String, String>` - The PHC-formatted hash or an error message
pub(crate) fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

/// Verify a password against a stored Argon2 hash
pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Reject a user whose role does not include `view`.
pub fn require_view(user: &User, view: View) -> AppResult<()> {
    if user.role.can_view(view) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied("Access Denied".to_string()))
    }
}

/// Login and signup against the sheet, plus the bootstrap credential
pub struct Authenticator {
    bootstrap: BootstrapConfig,
    http: reqwest::Client,
}

impl Authenticator {
    pub fn new(bootstrap: BootstrapConfig, http: reqwest::Client) -> Self {
        Authenticator { bootstrap, http }
    }

    fn bootstrap_user(&self) -> User {
        User {
            id: "temp-admin".to_string(),
            name: "Default Admin".to_string(),
            role: Role::Admin,
            email: self.bootstrap.email.clone(),
        }
    }

    /// Authenticate a user
    ///
    /// While no sheet endpoint is configured, only the bootstrap credential is
    /// accepted and yields a synthetic Admin. Once an endpoint exists, every
    /// login goes to the sheet.
    ///
    /// # Arguments
    /// * `sheet_url` - Configured endpoint, if any
    /// * `email` - Email entered on the form
    /// * `password` - Password entered on the form
    ///
    /// # Returns
    /// * `AppResult<User>` - The authenticated user
    pub async fn login(
        &self,
        sheet_url: Option<&str>,
        email: &str,
        password: &str,
    ) -> AppResult<User> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required.".to_string(),
            ));
        }

        let client = match SheetClient::connect(self.http.clone(), sheet_url) {
            Ok(client) => client,
            Err(not_configured) => {
                if self.bootstrap.enabled
                    && email.trim() == self.bootstrap.email
                    && password == self.bootstrap.password
                {
                    log::warn!(
                        "Bootstrap admin login for {}; configure the Google Sheet URL in Settings",
                        email.trim()
                    );
                    return Ok(self.bootstrap_user());
                }
                return Err(not_configured.into());
            }
        };

        let user = client.login(email.trim(), password).await?;
        log::info!("{} ({}) logged in", user.name, user.role);
        Ok(user)
    }

    /// Register a user row on the sheet.
    pub async fn signup(&self, sheet_url: Option<&str>, user: &NewUser) -> AppResult<()> {
        if user.name.trim().is_empty() || user.email.trim().is_empty() {
            return Err(AppError::Validation("Please fill all fields.".to_string()));
        }
        if user.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LEN
            )));
        }
        let client = SheetClient::connect(self.http.clone(), sheet_url).map_err(|_| {
            AppError::Config(
                "Google Sheet URL is not configured. Please set the URL in Settings.".to_string(),
            )
        })?;
        client.signup(user).await?;
        log::info!("Signed up {} as {}", user.email, user.role);
        Ok(())
    }
}

/// Who is logged in and which views they may open
#[cfg(feature = "web")]
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub views: &'static [View],
}

#[cfg(feature = "web")]
fn session_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie
}

/// Handle user login
///
/// Checks the credentials and sets the session cookie.
#[cfg(feature = "web")]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<LoginRequest>,
) -> Result<(CookieJar, Json<MeResponse>), AppError> {
    let sheet_url = state.sheet_url();
    let user = state
        .auth
        .login(sheet_url.as_deref(), &credentials.email, &credentials.password)
        .await?;
    let session_id = state.sessions.create(user.clone());
    let views = user.role.permitted_views();
    Ok((jar.add(session_cookie(session_id)), Json(MeResponse { user, views })))
}

/// Handle user registration
#[cfg(feature = "web")]
pub async fn handle_signup(
    State(state): State<Arc<AppState>>,
    Json(user): Json<NewUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let sheet_url = state.sheet_url();
    state.auth.signup(sheet_url.as_deref(), &user).await?;
    Ok(Json(
        serde_json::json!({ "message": "Signup successful! Please log in." }),
    ))
}

/// Handle user logout
///
/// Drops the server-side session and clears the cookie.
#[cfg(feature = "web")]
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> CookieJar {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    jar.remove(session_cookie(String::new()))
}

#[cfg(feature = "web")]
pub async fn handle_me(Extension(user): Extension<User>) -> Json<MeResponse> {
    let views = user.role.permitted_views();
    Json(MeResponse { user, views })
}

/// Authentication middleware
///
/// Puts the session's [`User`] into the request extensions, or answers 401.
///
/// # Arguments
/// * `state` - Shared application state holding the session table
/// * `jar` - Cookie jar containing session information
/// * `request` - The incoming request
/// * `next` - Next middleware in the chain
#[cfg(feature = "web")]
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Some(user) = state.sessions.validate(session_cookie.value()) {
            request.extensions_mut().insert(user);
            return next.run(request).await;
        }
    }
    AppError::Unauthorized("Please log in to continue.".to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new(BootstrapConfig::default(), reqwest::Client::new())
    }

    fn user() -> User {
        User {
            id: "u2".into(),
            name: "Security Guard".into(),
            role: Role::Security,
            email: "security@jabedagro.com".into(),
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("admin123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("admin123", &hash).unwrap());
        assert!(!verify_password("admin124", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn sessions_expire_and_can_be_removed() {
        let store = SessionStore::default();
        let id = store.create(user());
        assert_eq!(store.validate(&id).unwrap().role, Role::Security);
        assert!(store.remove(&id));
        assert!(store.validate(&id).is_none());

        let expired = SessionStore::new(Duration::ZERO);
        let id = expired.create(user());
        assert!(expired.validate(&id).is_none());
    }

    #[test]
    fn view_permissions() {
        assert!(require_view(&user(), View::GatePasses).is_ok());
        let err = require_view(&user(), View::Settings).unwrap_err();
        assert_eq!(err.to_string(), "Access Denied");
    }

    #[tokio::test]
    async fn bootstrap_admin_without_endpoint() {
        let user = authenticator()
            .login(None, "admin@jabedagro.com", "admin123")
            .await
            .unwrap();
        assert_eq!(user.id, "temp-admin");
        assert_eq!(user.name, "Default Admin");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn other_credentials_need_endpoint() {
        let err = authenticator()
            .login(None, "jane@jabedagro.com", "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn bootstrap_can_be_switched_off() {
        let auth = Authenticator::new(
            BootstrapConfig {
                enabled: false,
                ..Default::default()
            },
            reqwest::Client::new(),
        );
        let err = auth
            .login(None, "admin@jabedagro.com", "admin123")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn bootstrap_ignored_once_endpoint_is_set() {
        let err = authenticator()
            .login(Some("http://127.0.0.1:9/exec"), "admin@jabedagro.com", "admin123")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Remote(_)));
    }

    #[tokio::test]
    async fn signup_checks_password_length() {
        let err = authenticator()
            .signup(
                Some("http://127.0.0.1:9/exec"),
                &NewUser {
                    name: "Jane".into(),
                    email: "jane@x.com".into(),
                    password: "12345".into(),
                    role: Role::StoreOfficer,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters.");
    }
}
