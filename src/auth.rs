use std::collections::BTreeMap;
use std::fmt;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Global capability tier of a principal, distinct from per-table ACLs.
/// Ordered so that a single minimum-role check covers both "admin
/// required" and "modification requires more than readonly".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Role {
    Readonly,
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Readonly => write!(f, "readonly"),
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Where the engine gets authentication results and roles from. The
/// engine never stores credentials itself.
pub trait Authenticator {
    /// Verifies a secret for an identity. Unknown identities simply fail.
    fn authenticate(&self, identity: &str, secret: &str) -> bool;

    /// The identity's global role, or `None` for unknown identities.
    fn role_of(&self, identity: &str) -> Option<Role>;

    /// Assigns a role to `target` on behalf of `acting`.
    ///
    /// # Errors
    /// [Error::Forbidden] unless `acting` holds the admin role;
    /// [Error::NotFound] when `target` is unknown.
    fn set_role(&mut self, acting: &str, target: &str, role: Role) -> Result<()>;
}

#[derive(Debug, Clone)]
struct User {
    /// Argon2 PHC string. Empty means the account admits only the empty
    /// password (bootstrap-style accounts).
    password_hash: String,
    role: Role,
}

/// In-memory user registry with argon2 password hashes. The default
/// [Authenticator] implementation.
#[derive(Debug, Default)]
pub struct AuthManager {
    users: BTreeMap<String, User>,
}

impl AuthManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user. An empty password stores an empty hash rather
    /// than hashing the empty string.
    pub fn add_user(&mut self, username: &str, password: &str, role: Role) -> Result<()> {
        if self.users.contains_key(username) {
            return Err(Error::AlreadyExists(format!("user {username}")));
        }
        let password_hash = if password.is_empty() {
            String::new()
        } else {
            hash_password(password)?
        };
        self.users
            .insert(username.to_string(), User { password_hash, role });
        Ok(())
    }

    pub fn change_password(&mut self, username: &str, new_password: &str) -> Result<()> {
        let password_hash = hash_password(new_password)?;
        match self.users.get_mut(username) {
            Some(user) => {
                user.password_hash = password_hash;
                Ok(())
            }
            None => Err(Error::NotFound(format!("user {username}"))),
        }
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("password hash: {e}")))
}

impl Authenticator for AuthManager {
    fn authenticate(&self, identity: &str, secret: &str) -> bool {
        let Some(user) = self.users.get(identity) else {
            return false;
        };
        if user.password_hash.is_empty() {
            return secret.is_empty();
        }
        PasswordHash::new(&user.password_hash).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
    }

    fn role_of(&self, identity: &str) -> Option<Role> {
        self.users.get(identity).map(|user| user.role)
    }

    fn set_role(&mut self, acting: &str, target: &str, role: Role) -> Result<()> {
        if self.role_of(acting) != Some(Role::Admin) {
            return Err(Error::Forbidden("only admins can assign roles".into()));
        }
        match self.users.get_mut(target) {
            Some(user) => {
                user.role = role;
                Ok(())
            }
            None => Err(Error::NotFound(format!("user {target}"))),
        }
    }
}
