//! Structured logging sinks layered on the `log` facade.
//!
//! Log types:
//!
//! * events   - user events: mkdir, rmdir, login, logout
//! * security - bad password, connect from unknown host, other access errors
//! * siteop   - operator actions
//! * db       - index / statistics writes
//! * transfer - completed transfers
//! * error    - exceptional failures

use log::{error, info, warn};

fn format_bag(fields: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (key, value) in fields {
        if !out.is_empty() {
            out.push(' ');
        }
        if value.contains(' ') || value.is_empty() {
            out.push_str(&format!("{}=\"{}\"", key, value));
        } else {
            out.push_str(&format!("{}={}", key, value));
        }
    }
    out
}

/// Records a user event as a key-value bag, e.g. LOGIN, LOGOUT, DELDIR.
pub fn event(what: &str, fields: &[(&str, &str)]) {
    info!(target: "event", "{} {}", what.to_uppercase(), format_bag(fields));
}

/// Records an access or security failure, e.g. NONBOUNCER, BADIDNT.
pub fn security(what: &str, message: &str) {
    warn!(target: "security", "{}: {}", what.to_uppercase(), message);
}

pub fn siteop(admin: &str, message: &str) {
    info!(target: "siteop", "admin='{}' message=\"{}\"", admin, message);
}

pub fn database(message: &str) {
    info!(target: "db", "{}", message);
}

pub fn transfer(fields: &[(&str, &str)]) {
    info!(target: "transfer", "{}", format_bag(fields));
}

pub fn failure(message: &str) {
    error!(target: "error", "{}", message);
}

#[cfg(test)]
mod tests {
    use super::format_bag;

    #[test]
    fn bag_quotes_values_with_spaces() {
        let bag = format_bag(&[("user", "alice"), ("tagline", "no tagline set")]);
        assert_eq!(bag, "user=alice tagline=\"no tagline set\"");
    }
}
