//! Accounts: registration, credential checks and bearer sessions.

mod password;
mod session;
mod sweeper;

pub use password::PasswordHasher;
pub use session::*;
pub use sweeper::{start_session_sweeper, sweep_once, SessionSweeperHandle};

use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::db::{self, DatabaseError, NewUser};
use crate::models::{RecentSearch, Session, User};
use crate::validation::FieldErrors;

const USERNAME_MAX: usize = 150;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Username and password are required")]
    MissingFields,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Account is disabled")]
    Disabled,
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The caller of a request. Guests carry a session only once something
/// was stored for them (a cart line, a search).
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub session: Option<Session>,
    pub user: Option<User>,
}

impl Viewer {
    pub fn anonymous(session: Session) -> Self {
        Self {
            session: Some(session),
            user: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    pub fn recent_searches(&self) -> &[RecentSearch] {
        self.session.as_ref().map_or(&[], |s| s.recent_searches.as_slice())
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_staff_like)
    }

    /// Staff, or the user identified by `owner`.
    pub fn can_manage(&self, owner: Option<i64>) -> bool {
        self.is_staff() || (owner.is_some() && owner == self.user_id())
    }
}

/// Load the viewer for an already opened session. A session whose user
/// was deleted or disabled degrades to anonymous.
pub fn viewer_for(conn: &Connection, session: Session) -> Result<Viewer, DatabaseError> {
    let user = match session.user_id {
        Some(id) => db::get_user(conn, id)?.filter(|u| u.is_active),
        None => None,
    };
    Ok(Viewer {
        session: Some(session),
        user,
    })
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "password2")]
    pub password_confirm: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn validate_username(username: &str) -> Result<(), AccountError> {
    let mut errors = FieldErrors::new();
    if username.chars().count() > USERNAME_MAX {
        errors.add("username", format!("Ensure this value has at most {USERNAME_MAX} characters."));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    errors.into_result().map_err(AccountError::Validation)
}

/// Registration input after presence and format checks.
pub struct Registration {
    pub username: String,
    pub password: Zeroizing<String>,
    pub email: String,
}

pub fn validate_registration(input: &RegisterInput) -> Result<Registration, AccountError> {
    let (Some(username), Some(password), Some(confirm)) = (
        non_empty(&input.username),
        input.password.as_deref().filter(|p| !p.is_empty()),
        input.password_confirm.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AccountError::MissingFields);
    };
    if password != confirm {
        return Err(AccountError::PasswordMismatch);
    }
    validate_username(username)?;
    Ok(Registration {
        username: username.to_string(),
        password: Zeroizing::new(password.to_string()),
        email: non_empty(&input.email).unwrap_or_default().to_string(),
    })
}

pub fn register(
    conn: &Connection,
    hasher: &PasswordHasher,
    input: &RegisterInput,
) -> Result<User, AccountError> {
    let registration = validate_registration(input)?;
    create_user(
        conn,
        hasher,
        &registration.username,
        &registration.password,
        &registration.email,
        false,
    )
}

pub fn ensure_username_free(conn: &Connection, username: &str) -> Result<(), AccountError> {
    if db::username_exists(conn, username)? {
        return Err(AccountError::UsernameTaken);
    }
    Ok(())
}

/// Insert a user with a hashed password. Used by registration and the CLI.
pub fn create_user(
    conn: &Connection,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
    email: &str,
    is_staff: bool,
) -> Result<User, AccountError> {
    ensure_username_free(conn, username)?;
    let hash = hasher.hash(password);
    insert_hashed_user(conn, username, email, &hash, is_staff)
}

/// Insert a user whose password was hashed beforehand.
pub fn insert_hashed_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    is_staff: bool,
) -> Result<User, AccountError> {
    let user = db::insert_user(
        conn,
        &NewUser {
            username,
            email,
            password_hash,
            is_staff,
            is_superuser: false,
        },
    )
    .map_err(|e| {
        if e.is_unique_violation() {
            AccountError::UsernameTaken
        } else {
            AccountError::Database(e)
        }
    })?;
    tracing::info!(user_id = user.id, is_staff, "User created");
    Ok(user)
}

/// Stored user and password hash for a login attempt. The password is
/// only checked for presence here.
pub fn load_credentials(conn: &Connection, username: &str, password: &str) -> Result<(User, String), AccountError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AccountError::MissingFields);
    }
    db::get_credentials(conn, username)?.ok_or(AccountError::InvalidCredentials)
}

/// Compare `password` against the stored hash. CPU-bound; holds no
/// database handle.
pub fn verify_credentials(
    hasher: &PasswordHasher,
    user: User,
    password_hash: &str,
    password: &str,
) -> Result<User, AccountError> {
    if !hasher.verify(password, password_hash) {
        tracing::debug!(user_id = user.id, "Password mismatch");
        return Err(AccountError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AccountError::Disabled);
    }
    Ok(user)
}

pub fn authenticate(
    conn: &Connection,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<User, AccountError> {
    let (user, hash) = load_credentials(conn, username, password)?;
    verify_credentials(hasher, user, &hash, password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1_000)
    }

    fn input(username: &str, password: &str, confirm: &str) -> RegisterInput {
        RegisterInput {
            username: Some(username.into()),
            password: Some(password.into()),
            password_confirm: Some(confirm.into()),
            email: None,
        }
    }

    #[test]
    fn register_then_authenticate() {
        let conn = open_memory_database().unwrap();
        let user = register(&conn, &hasher(), &input("budi", "rahasia", "rahasia")).unwrap();
        assert!(!user.is_staff);
        let authed = authenticate(&conn, &hasher(), "budi", "rahasia").unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[test]
    fn register_requires_all_fields() {
        let conn = open_memory_database().unwrap();
        let err = register(&conn, &hasher(), &input("budi", "", "")).unwrap_err();
        assert!(matches!(err, AccountError::MissingFields));
        let err = register(&conn, &hasher(), &RegisterInput::default()).unwrap_err();
        assert!(matches!(err, AccountError::MissingFields));
    }

    #[test]
    fn register_rejects_mismatch_and_duplicates() {
        let conn = open_memory_database().unwrap();
        let err = register(&conn, &hasher(), &input("budi", "a", "b")).unwrap_err();
        assert!(matches!(err, AccountError::PasswordMismatch));

        register(&conn, &hasher(), &input("budi", "a", "a")).unwrap();
        let err = register(&conn, &hasher(), &input("budi", "a", "a")).unwrap_err();
        assert!(matches!(err, AccountError::UsernameTaken));
    }

    #[test]
    fn register_rejects_bad_username() {
        let conn = open_memory_database().unwrap();
        let err = register(&conn, &hasher(), &input("bad name!", "a", "a")).unwrap_err();
        match err {
            AccountError::Validation(fields) => assert!(fields.contains("username")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn authenticate_failures() {
        let conn = open_memory_database().unwrap();
        let user = register(&conn, &hasher(), &input("budi", "rahasia", "rahasia")).unwrap();

        let err = authenticate(&conn, &hasher(), "budi", "salah").unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
        let err = authenticate(&conn, &hasher(), "siapa", "rahasia").unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
        let err = authenticate(&conn, &hasher(), "", "").unwrap_err();
        assert!(matches!(err, AccountError::MissingFields));

        db::set_active(&conn, user.id, false).unwrap();
        let err = authenticate(&conn, &hasher(), "budi", "rahasia").unwrap_err();
        assert!(matches!(err, AccountError::Disabled));
    }

    #[test]
    fn viewer_permissions() {
        let conn = open_memory_database().unwrap();
        let staff = create_user(&conn, &hasher(), "admin", "pw", "", true).unwrap();
        let member = create_user(&conn, &hasher(), "budi", "pw", "", false).unwrap();
        let session = db::insert_session(&conn, "s1", Some(member.id), db::now()).unwrap();

        let viewer = Viewer { session: Some(session.clone()), user: Some(member.clone()) };
        assert!(viewer.can_manage(Some(member.id)));
        assert!(!viewer.can_manage(Some(staff.id)));
        assert!(!viewer.can_manage(None));

        let admin = Viewer { session: Some(session.clone()), user: Some(staff) };
        assert!(admin.can_manage(Some(member.id)));
        assert!(admin.is_staff());

        let guest = Viewer::anonymous(session);
        assert!(!guest.is_authenticated());
        assert!(!guest.can_manage(None));

        let passerby = Viewer::default();
        assert!(passerby.session_id().is_none());
        assert!(passerby.recent_searches().is_empty());
    }

    #[test]
    fn disabled_user_session_degrades_to_anonymous() {
        let conn = open_memory_database().unwrap();
        let member = create_user(&conn, &hasher(), "budi", "pw", "", false).unwrap();
        let session = db::insert_session(&conn, "s1", Some(member.id), db::now()).unwrap();
        assert!(viewer_for(&conn, session.clone()).unwrap().is_authenticated());
        db::set_active(&conn, member.id, false).unwrap();
        assert!(!viewer_for(&conn, session).unwrap().is_authenticated());
    }
}
