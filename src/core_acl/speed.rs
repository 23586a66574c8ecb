//! Per-user and per-path speed rules resolved at transfer start.

use crate::config::Config;
use crate::core_acl::user::User;
use crate::core_fs::VirtualPath;
use crate::helpers::wildcard_match;

/// A named global bandwidth budget this transfer participates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitClass {
    pub name: String,
    pub bytes_per_sec: u64,
}

/// Everything the speed controller needs, captured from one config snapshot
/// when the transfer opens. A later reload does not change a running
/// transfer's rules.
#[derive(Debug, Clone, Default)]
pub struct TransferRules {
    /// Sustained floor in bytes/s; 0 disables the minimum check.
    pub minimum: u64,
    /// Per-user ceiling in bytes/s; 0 disables shaping.
    pub maximum: u64,
    pub classes: Vec<LimitClass>,
}

impl TransferRules {
    pub fn is_empty(&self) -> bool {
        self.minimum == 0 && self.maximum == 0 && self.classes.is_empty()
    }
}

pub fn upload_rules(user: &User, path: &VirtualPath, config: &Config) -> TransferRules {
    let mut rules = TransferRules {
        minimum: 0,
        maximum: user.max_ul_speed * 1024,
        classes: Vec::new(),
    };
    for limit in &config.speed_limit {
        if !wildcard_match(&limit.path_mask, path.as_str(), false) {
            continue;
        }
        rules.minimum = rules.minimum.max(limit.ul_minimum * 1024);
        if limit.ul_limit > 0 {
            rules.classes.push(LimitClass {
                name: limit.name.clone(),
                bytes_per_sec: limit.ul_limit * 1024,
            });
        }
    }
    rules
}

pub fn download_rules(user: &User, path: &VirtualPath, config: &Config) -> TransferRules {
    let mut rules = TransferRules {
        minimum: 0,
        maximum: user.max_dl_speed * 1024,
        classes: Vec::new(),
    };
    for limit in &config.speed_limit {
        if !wildcard_match(&limit.path_mask, path.as_str(), false) {
            continue;
        }
        rules.minimum = rules.minimum.max(limit.dl_minimum * 1024);
        if limit.dl_limit > 0 {
            rules.classes.push(LimitClass {
                name: limit.name.clone(),
                bytes_per_sec: limit.dl_limit * 1024,
            });
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_acl::user::test_user;

    fn config_with_limits() -> Config {
        toml::from_str(
            r#"
            [server]
            root_dir = "/srv/ftp"
            users_file = "users.toml"

            [[speed_limit]]
            name = "archive"
            path_mask = "/archive/*"
            dl_limit = 1000
            dl_minimum = 10

            [[speed_limit]]
            name = "incoming"
            path_mask = "/incoming/*"
            ul_limit = 500
            "#,
        )
        .unwrap()
    }

    #[test]
    fn rules_pick_up_matching_classes() {
        let config = config_with_limits();
        let mut user = test_user(1, "alice", "pw");
        user.max_dl_speed = 10;

        let rules = download_rules(
            &user,
            &VirtualPath::from_user(&VirtualPath::root(), "/archive/big.iso"),
            &config,
        );
        assert_eq!(rules.maximum, 10 * 1024);
        assert_eq!(rules.minimum, 10 * 1024);
        assert_eq!(rules.classes.len(), 1);
        assert_eq!(rules.classes[0].name, "archive");
        assert_eq!(rules.classes[0].bytes_per_sec, 1000 * 1024);
    }

    #[test]
    fn unrelated_paths_short_circuit() {
        let config = config_with_limits();
        let user = test_user(1, "alice", "pw");
        let rules = download_rules(
            &user,
            &VirtualPath::from_user(&VirtualPath::root(), "/pub/file"),
            &config,
        );
        assert!(rules.is_empty());
    }
}
