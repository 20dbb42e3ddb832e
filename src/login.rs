use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::Json;
use axum::extract::State;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::app::{ApiResponse, AppState};
use crate::error::AppError;
use crate::store::FileStore;

/// User data structure representing a registered application user
///
/// Usernames are email-shaped and case-normalized to lowercase; no two users
/// share a normalized username. Only the password hash is stored, never the
/// password itself.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Numeric identifier assigned at registration
    pub id: u64,

    /// Normalized email address (unique identifier for the user)
    pub username: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,
}

/// Public view of a user, returned as the login profile
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Credential data for login and registration
#[derive(Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Global sessions storage
///
/// Stores all active user sessions in a thread-safe map.
lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

const SESSION_DURATION: u64 = 4 * 60 * 60; // 4 hours in seconds
const MIN_PASSWORD_LEN: usize = 8;

/// Registry of all registered users
///
/// An in-memory index guarded by a lock, backed by a JSON file that is
/// rewritten atomically (temp file + rename) on every mutation, so
/// concurrent registrations can neither race on the map nor tear the file.
pub struct UserRegistry {
    path: PathBuf,
    users: RwLock<HashMap<String, User>>,
}

impl UserRegistry {
    /// Open (or create) the registry file and load the user index
    ///
    /// # Arguments
    /// * `path` - Location of the users JSON file
    ///
    /// # Errors
    /// * Returns an error if the file cannot be created, read, or parsed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Persistence(format!("failed to create database directory: {}", e))
            })?;
        }

        let users = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| AppError::Persistence(format!("failed to read users file: {}", e)))?;
            serde_json::from_str(&contents)
                .map_err(|e| AppError::Persistence(format!("failed to parse users data: {}", e)))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    /// Register a new user
    ///
    /// Validates the email shape and password length, rejects duplicates,
    /// hashes the password and flushes the updated index to disk before
    /// returning the new record.
    ///
    /// # Arguments
    /// * `username` - Email address, already lowercased by the caller
    /// * `password` - Plain text password (will be hashed)
    ///
    /// # Errors
    /// * `AuthError` for empty fields, malformed email, short password, or
    ///   an already-registered username
    pub fn register(&self, username: &str, password: &str) -> Result<User, AppError> {
        if username.is_empty() || password.is_empty() {
            return Err(AppError::Auth(
                "Email and password are required.".to_string(),
            ));
        }
        if !EMAIL_RE.is_match(username) {
            return Err(AppError::Auth("Invalid email format.".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Auth(format!(
                "Password must be at least {} characters long.",
                MIN_PASSWORD_LEN
            )));
        }

        let password_hash = hash_password(password)?;

        let mut users = self.users.write().unwrap();
        if users.contains_key(username) {
            return Err(AppError::Auth("User already exists.".to_string()));
        }

        let id = users.values().map(|u| u.id + 1).max().unwrap_or(0);
        let user = User {
            id,
            username: username.to_string(),
            password_hash,
        };
        users.insert(username.to_string(), user.clone());
        self.flush(&users)?;

        Ok(user)
    }

    /// Verify credentials, returning the matching user
    ///
    /// # Errors
    /// * `AuthError` when the user is unknown or the password does not match
    pub fn verify(&self, username: &str, password: &str) -> Result<User, AppError> {
        let users = self.users.read().unwrap();

        let user = users.get(username).ok_or_else(|| {
            AppError::Auth("Authentication failed. User not found.".to_string())
        })?;

        if verify_password(password, &user.password_hash)? {
            Ok(user.clone())
        } else {
            Err(AppError::Auth(
                "Authentication failed. Wrong password.".to_string(),
            ))
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.read().unwrap().contains_key(username)
    }

    // Atomic rewrite: write a sibling temp file, then rename over the index
    fn flush(&self, users: &HashMap<String, User>) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(users)
            .map_err(|e| AppError::Persistence(format!("failed to serialize users: {}", e)))?;

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| AppError::Persistence(format!("failed to create temp file: {}", e)))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| AppError::Persistence(format!("failed to write users data: {}", e)))?;
        tmp.persist(&self.path)
            .map_err(|e| AppError::Persistence(format!("failed to save users file: {}", e.error)))?;

        Ok(())
    }
}

/// Hash a password using Argon2
///
/// Creates a cryptographically secure hash of a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err(AppError::Auth("Password hashing failed".to_string())),
    }
}

/// Verify a password against a stored hash
fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Auth("Invalid password hash format".to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Create a new user session
///
/// Creates and stores a new session for an authenticated user.
///
/// # Arguments
/// * `username` - The username to create a session for
///
/// # Returns
/// * `String` - A unique session token
pub fn create_session(username: &str) -> String {
    let token = uuid::Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let session = Session {
        user_id: username.to_string(),
        expires_at,
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.insert(token.clone(), session);

    token
}

/// Validate a session token
///
/// # Arguments
/// * `token` - The session token to validate
///
/// # Returns
/// * `Option<String>` - The username for the session if valid, None otherwise
pub fn validate_session(token: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap();

    if let Some(session) = sessions.get(token) {
        if session.expires_at > SystemTime::now() {
            return Some(session.user_id.clone());
        }
    }

    None
}

// Web handler functions below

/// Handle user registration
///
/// Normalizes the username, creates the account, sets up the user's
/// namespace with a profile document, and returns a fresh session token.
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<ApiResponse>, AppError> {
    let username = credentials.username.to_lowercase();

    let user = state.users.register(&username, &credentials.password)?;

    // Create the user's namespace and profile document
    state.store.ensure_user(&username).await?;
    let profile = UserProfile::from(&user);
    let profile_name = format!("{}.json", FileStore::local_part(&username));
    let bytes = serde_json::to_vec_pretty(&profile)
        .map_err(|e| AppError::Persistence(format!("failed to encode profile: {}", e)))?;
    state
        .store
        .write_user_doc(&username, &profile_name, &bytes)
        .await?;

    let token = create_session(&username);

    Ok(Json(ApiResponse {
        success: true,
        message: "Registration successful".to_string(),
        token: Some(token),
        data: None,
    }))
}

/// Handle user login requests
///
/// Verifies credentials, creates a session, and returns the stored profile
/// document as `data`.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<ApiResponse>, AppError> {
    let username = credentials.username.to_lowercase();

    let user = state.users.verify(&username, &credentials.password)?;
    let token = create_session(&username);

    // Profile read is best-effort; a missing document degrades to null
    let profile_name = format!("{}.json", FileStore::local_part(&username));
    let data = match state.store.read_user_doc(&username, &profile_name).await {
        Ok(bytes) => serde_json::from_slice(&bytes).ok(),
        Err(e) => {
            log::warn!("failed to read profile for '{}': {}", user.username, e);
            None
        }
    };

    Ok(Json(ApiResponse {
        success: true,
        message: "Authentication successful".to_string(),
        token: Some(token),
        data,
    }))
}
