use serde::{Deserialize, Serialize};

pub type UserId = u32;

/// Single-letter account flags carried in the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Bypasses login caps.
    Exempt,
    /// Record is dead; sessions terminate on their next reload.
    Deleted,
    Siteop,
}

impl Flag {
    fn letter(self) -> char {
        match self {
            Flag::Exempt => 'E',
            Flag::Deleted => 'D',
            Flag::Siteop => 'S',
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub uid: UserId,
    pub name: String,
    /// bcrypt hash.
    pub password_hash: String,
    #[serde(default)]
    pub flags: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub tagline: String,
    /// Simultaneous-login cap for this user. 0 means unlimited.
    #[serde(default)]
    pub num_logins: usize,
    /// Idle seconds before disconnect: -1 uses the server default, 0 disables.
    #[serde(default = "default_idle_time")]
    pub idle_time: i64,
    /// Per-transfer ceilings in KiB/s. 0 means unlimited.
    #[serde(default)]
    pub max_dl_speed: u64,
    #[serde(default)]
    pub max_ul_speed: u64,
    /// `ident@host` wildcards this account may connect from. Empty allows any.
    #[serde(default)]
    pub ip_masks: Vec<String>,
}

fn default_group() -> String {
    "users".to_string()
}

fn default_idle_time() -> i64 {
    -1
}

impl User {
    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(flag.letter())
    }

    pub fn is_siteop(&self) -> bool {
        self.has_flag(Flag::Siteop)
    }

    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

#[cfg(test)]
pub fn test_user(uid: UserId, name: &str, password: &str) -> User {
    User {
        uid,
        name: name.to_string(),
        password_hash: bcrypt::hash(password, 4).unwrap(),
        flags: String::new(),
        group: default_group(),
        tagline: String::new(),
        num_logins: 0,
        idle_time: -1,
        max_dl_speed: 0,
        max_ul_speed: 0,
        ip_masks: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse_from_letters() {
        let mut user = test_user(1, "alice", "pw");
        user.flags = "ES".to_string();
        assert!(user.has_flag(Flag::Exempt));
        assert!(user.is_siteop());
        assert!(!user.has_flag(Flag::Deleted));
    }

    #[test]
    fn password_verification() {
        let user = test_user(1, "alice", "secret");
        assert!(user.verify_password("secret"));
        assert!(!user.verify_password("wrong"));
    }
}
