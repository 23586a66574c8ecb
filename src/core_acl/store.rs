use crate::core_acl::user::{User, UserId};
use crate::helpers::wildcard_match;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AclError {
    #[error("Unknown user: {0}")]
    UserNotFound(String),

    #[error("Bad password for user: {0}")]
    BadPassword(String),

    #[error("Failed to read user file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse user file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Deserialize)]
struct UsersFile {
    #[serde(default)]
    user: Vec<User>,
}

/// TOML-backed user and ACL store.
///
/// Queries run against the in-memory map; `refresh` re-reads the file and is
/// driven by the UserUpdate / ReloadConfig paths, never from the transfer
/// hot path.
pub struct UserStore {
    path: PathBuf,
    users: RwLock<HashMap<UserId, User>>,
}

impl UserStore {
    pub fn load_from_file(path: &Path) -> Result<Self, AclError> {
        let users = Self::parse(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            users: RwLock::new(users),
        })
    }

    fn parse(path: &Path) -> Result<HashMap<UserId, User>, AclError> {
        let contents = std::fs::read_to_string(path)?;
        let file: UsersFile = toml::from_str(&contents)?;
        Ok(file.user.into_iter().map(|u| (u.uid, u)).collect())
    }

    pub fn refresh(&self) -> Result<(), AclError> {
        let users = Self::parse(&self.path)?;
        debug!("Reloaded {} user records from {:?}", users.len(), self.path);
        *self.users.write().expect("user store lock poisoned") = users;
        Ok(())
    }

    pub fn load(&self, uid: UserId) -> Option<User> {
        self.users
            .read()
            .expect("user store lock poisoned")
            .get(&uid)
            .cloned()
    }

    pub fn lookup_name(&self, name: &str) -> Option<User> {
        self.users
            .read()
            .expect("user store lock poisoned")
            .values()
            .find(|u| u.name == name)
            .cloned()
    }

    pub fn authenticate(&self, name: &str, password: &str) -> Result<User, AclError> {
        let user = self
            .lookup_name(name)
            .ok_or_else(|| AclError::UserNotFound(name.to_string()))?;
        if !user.verify_password(password) {
            return Err(AclError::BadPassword(name.to_string()));
        }
        Ok(user)
    }

    /// Pre-authorization gate: is any account allowed from this address?
    /// A store with no masks configured anywhere is an open server.
    pub fn is_ip_allowed(&self, host_or_ip: &str) -> bool {
        let users = self.users.read().expect("user store lock poisoned");
        let mut any_masks = false;
        for user in users.values() {
            for mask in &user.ip_masks {
                any_masks = true;
                let host_mask = mask.split('@').nth(1).unwrap_or(mask);
                if wildcard_match(host_mask, host_or_ip, true) {
                    return true;
                }
            }
        }
        !any_masks
    }

    /// Post-authentication gate against the user's own `ident@host` masks.
    pub fn is_ident_ip_allowed(&self, uid: UserId, ident_address: &str) -> bool {
        match self.load(uid) {
            Some(user) => {
                user.ip_masks.is_empty()
                    || user
                        .ip_masks
                        .iter()
                        .any(|mask| wildcard_match(mask, ident_address, true))
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store_with(users_toml: &str) -> (UserStore, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(users_toml.as_bytes()).unwrap();
        let store = UserStore::load_from_file(file.path()).unwrap();
        (store, file)
    }

    fn alice_toml() -> String {
        let hash = bcrypt::hash("secret", 4).unwrap();
        format!(
            r#"
            [[user]]
            uid = 1
            name = "alice"
            password_hash = "{}"
            group = "staff"
            ip_masks = ["*@10.0.0.*"]
            "#,
            hash
        )
    }

    #[test]
    fn authenticate_known_user() {
        let (store, _file) = store_with(&alice_toml());
        let user = store.authenticate("alice", "secret").unwrap();
        assert_eq!(user.uid, 1);
        assert_eq!(user.group, "staff");
        assert!(matches!(
            store.authenticate("alice", "nope"),
            Err(AclError::BadPassword(_))
        ));
        assert!(matches!(
            store.authenticate("bob", "secret"),
            Err(AclError::UserNotFound(_))
        ));
    }

    #[test]
    fn ip_gates() {
        let (store, _file) = store_with(&alice_toml());
        assert!(store.is_ip_allowed("10.0.0.42"));
        assert!(!store.is_ip_allowed("192.168.7.7"));
        assert!(store.is_ident_ip_allowed(1, "joe@10.0.0.42"));
        assert!(!store.is_ident_ip_allowed(1, "joe@192.168.7.7"));
        assert!(!store.is_ident_ip_allowed(99, "joe@10.0.0.42"));
    }

    #[test]
    fn refresh_picks_up_changes() {
        let (store, mut file) = store_with(&alice_toml());
        assert!(store.load(2).is_none());
        let hash = bcrypt::hash("pw", 4).unwrap();
        writeln!(
            file,
            r#"
            [[user]]
            uid = 2
            name = "bob"
            password_hash = "{}"
            "#,
            hash
        )
        .unwrap();
        file.flush().unwrap();
        store.refresh().unwrap();
        assert_eq!(store.load(2).unwrap().name, "bob");
    }
}
