//! Fire-and-forget hooks into the index and statistics store.

use crate::core_acl::user::UserId;
use crate::core_log;

/// Records a session's protocol traffic totals at teardown, in KiB.
pub fn protocol_update(uid: Option<UserId>, sent_kb: u64, received_kb: u64) {
    let uid = uid.map(|u| u as i64).unwrap_or(-1);
    core_log::database(&format!(
        "protocol update uid={} sent_kb={} received_kb={}",
        uid, sent_kb, received_kb
    ));
}

/// Drops a path from the site index after DELE/RMD under an indexed mask.
pub fn index_delete(virtual_path: &str) {
    core_log::database(&format!("index delete path={}", virtual_path));
}
