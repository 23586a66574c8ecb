//! MLST and MLSD (RFC 3659): machine-readable listings.

use crate::core_fs::{DirEntryInfo, VirtualPath};
use crate::core_ftpcommand::error::CommandError;
use crate::core_ftpcommand::transfer;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use chrono::{DateTime, Utc};
use std::time::SystemTime;

fn modify_fact(modified: SystemTime) -> String {
    let when: DateTime<Utc> = modified.into();
    when.format("%Y%m%d%H%M%S").to_string()
}

fn facts(is_dir: bool, size: u64, modified: SystemTime) -> String {
    let kind = if is_dir { "dir" } else { "file" };
    format!(
        "type={};size={};modify={};",
        kind,
        size,
        modify_fact(modified)
    )
}

fn entry_line(entry: &DirEntryInfo) -> String {
    format!(
        "{} {}",
        facts(entry.is_dir, entry.size, entry.modified),
        entry.name
    )
}

/// Handles MLST: facts for a single path, inline on the control channel.
pub async fn handle_mlst_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let path = VirtualPath::from_user(&client.cwd, &arg_str);

    let meta = client.fs(&config).status(&user, &path, &config).await?;
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

    client
        .control
        .part_reply(ReplyCode::FILE_ACTION_OKAY, &format!("Listing {}", path))
        .await?;
    // RFC 3659: the fact line inside the reply starts with a space, no code.
    client
        .control
        .send_text(&format!(
            " {} {}",
            facts(meta.is_dir(), meta.len(), modified),
            path
        ))
        .await?;
    client.reply(ReplyCode::FILE_ACTION_OKAY, "End.").await?;
    Ok(())
}

/// Handles MLSD: facts for every entry of a directory, over the data
/// channel.
pub async fn handle_mlsd_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let path = VirtualPath::from_user(&client.cwd, &arg_str);

    let meta = client.fs(&config).status(&user, &path, &config).await?;
    if !meta.is_dir() {
        return Err(CommandError::failed(
            ReplyCode::ACTION_NOT_OKAY,
            format!("{}: not a directory.", path),
        ));
    }

    let mut entries = client.fs(&config).read_dir(&user, &path, &config).await?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut payload = String::new();
    for entry in &entries {
        payload.push_str(&entry_line(entry));
        payload.push_str("\r\n");
    }

    transfer::send_listing(client, payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fact_format() {
        // 2013-06-15 09:04:00 UTC
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1371287040);
        assert_eq!(
            facts(false, 17, modified),
            "type=file;size=17;modify=20130615090400;"
        );
        assert!(facts(true, 0, modified).starts_with("type=dir;"));
    }
}
