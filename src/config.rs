use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Storage root every virtual path resolves under.
    pub root_dir: String,
    pub users_file: String,
    /// Banner file sent on connect; the login prompt is used when unset.
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default = "default_login_prompt")]
    pub login_prompt: String,
    /// Address advertised in PASV replies; the local address when unset.
    #[serde(default)]
    pub pasv_address: Option<String>,
    #[serde(default = "default_pasv_port_min")]
    pub pasv_port_min: u16,
    #[serde(default = "default_pasv_port_max")]
    pub pasv_port_max: u16,
    /// Seconds a logged-in session may sit idle. 0 disables the timer.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
    /// Global cap on simultaneous logins.
    #[serde(default = "default_max_users")]
    pub max_users: usize,
    /// -1 means unlimited.
    #[serde(default = "default_max_transfers")]
    pub max_uploads: i64,
    #[serde(default = "default_max_transfers")]
    pub max_downloads: i64,
    #[serde(default)]
    pub bouncer_only: bool,
    /// Addresses recognized as bouncers, allowed to send IDNT.
    #[serde(default)]
    pub bouncer_addresses: Vec<String>,
    /// Command-line wildcards that do not reset the idle clock.
    #[serde(default)]
    pub idle_exempt: Vec<String>,
    /// Virtual path wildcards kept in the site index.
    #[serde(default)]
    pub indexed_paths: Vec<String>,
    /// Virtual path wildcards whose changes are written to the event log.
    #[serde(default)]
    pub event_logged_paths: Vec<String>,
    /// Virtual path wildcards invisible to non-siteops.
    #[serde(default)]
    pub hidden_paths: Vec<String>,
    #[serde(default)]
    pub tls_certificate: Option<String>,
    #[serde(default)]
    pub tls_key: Option<String>,
    /// Whether CCC may strip TLS from an upgraded control channel.
    #[serde(default)]
    pub allow_ccc: bool,
    #[serde(default)]
    pub upload_buffer_size: Option<usize>,
    #[serde(default)]
    pub download_buffer_size: Option<usize>,
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}
fn default_listen_port() -> u16 {
    21
}
fn default_login_prompt() -> String {
    "ferroftpd ready.".to_string()
}
fn default_pasv_port_min() -> u16 {
    49152
}
fn default_pasv_port_max() -> u16 {
    65534
}
fn default_idle_timeout() -> u64 {
    900
}
fn default_max_users() -> usize {
    200
}
fn default_max_transfers() -> i64 {
    -1
}

/// A named global bandwidth budget; transfers under `path_mask` join it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeedLimitConfig {
    pub name: String,
    pub path_mask: String,
    /// KiB/s ceilings shared by every member of the class. 0 means none.
    #[serde(default)]
    pub dl_limit: u64,
    #[serde(default)]
    pub ul_limit: u64,
    /// KiB/s per-transfer floors under this mask. 0 means none.
    #[serde(default)]
    pub dl_minimum: u64,
    #[serde(default)]
    pub ul_minimum: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CscriptType {
    Pre,
    Post,
}

/// External program hooked before or after an FTP verb.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CscriptConfig {
    pub command: String,
    pub path: String,
    #[serde(rename = "type")]
    pub hook: CscriptType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteCmdKind {
    Exec,
    Text,
    Alias,
}

/// Operator-defined SITE command.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteCmdConfig {
    pub name: String,
    pub kind: SiteCmdKind,
    /// Program path, text file, or alias target depending on `kind`.
    pub target: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub speed_limit: Vec<SpeedLimitConfig>,
    #[serde(default)]
    pub cscript: Vec<CscriptConfig>,
    #[serde(default)]
    pub site_cmd: Vec<SiteCmdConfig>,
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Config> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))?;
        Ok(config)
    }

    pub fn is_bouncer(&self, ip: &str) -> bool {
        self.server
            .bouncer_addresses
            .iter()
            .any(|mask| crate::helpers::wildcard_match(mask, ip, false))
    }

    pub fn is_indexed(&self, virtual_path: &str) -> bool {
        self.server
            .indexed_paths
            .iter()
            .any(|mask| crate::helpers::wildcard_match(mask, virtual_path, false))
    }

    pub fn is_event_logged(&self, virtual_path: &str) -> bool {
        self.server
            .event_logged_paths
            .iter()
            .any(|mask| crate::helpers::wildcard_match(mask, virtual_path, false))
    }
}

static CONFIG: Lazy<RwLock<Option<Arc<Config>>>> = Lazy::new(|| RwLock::new(None));
static CONFIG_PATH: Lazy<RwLock<Option<String>>> = Lazy::new(|| RwLock::new(None));

/// Publishes the initial configuration snapshot.
pub fn init(config: Config, path: &str) {
    *CONFIG.write().expect("config lock poisoned") = Some(Arc::new(config));
    *CONFIG_PATH.write().expect("config lock poisoned") = Some(path.to_string());
}

/// Returns the current snapshot. Commands capture one snapshot and use it
/// throughout, so a concurrent reload never changes behaviour mid-command.
pub fn get() -> Arc<Config> {
    CONFIG
        .read()
        .expect("config lock poisoned")
        .clone()
        .expect("config not initialised")
}

/// Swaps in a new snapshot; existing holders keep the one they captured.
pub fn replace(config: Config) {
    *CONFIG.write().expect("config lock poisoned") = Some(Arc::new(config));
}

pub fn path() -> Option<String> {
    CONFIG_PATH.read().expect("config lock poisoned").clone()
}

#[cfg(test)]
pub fn test_config(root_dir: &str) -> Config {
    let toml = format!(
        r#"
        [server]
        root_dir = "{}"
        users_file = "users.toml"
        "#,
        root_dir
    );
    toml::from_str(&toml).expect("test config parses")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = test_config("/srv/ftp");
        assert_eq!(config.server.listen_port, 21);
        assert_eq!(config.server.idle_timeout, 900);
        assert_eq!(config.server.max_uploads, -1);
        assert!(config.speed_limit.is_empty());
    }

    #[test]
    fn speed_limit_and_site_cmd_tables_parse() {
        let toml = r#"
            [server]
            root_dir = "/srv/ftp"
            users_file = "users.toml"
            bouncer_addresses = ["10.0.0.*"]

            [[speed_limit]]
            name = "archive"
            path_mask = "/archive/*"
            dl_limit = 5000

            [[site_cmd]]
            name = "UPTIME"
            kind = "exec"
            target = "/usr/bin/uptime"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.is_bouncer("10.0.0.7"));
        assert!(!config.is_bouncer("192.168.1.1"));
        assert_eq!(config.speed_limit[0].dl_limit, 5000);
        assert_eq!(config.site_cmd[0].kind, SiteCmdKind::Exec);
    }
}
