use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use chrono::{DateTime, Utc};

/// Handles MDTM: modification time as `YYYYMMDDHHMMSS` in UTC.
pub async fn handle_mdtm_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let path = VirtualPath::from_user(&client.cwd, &arg_str);

    let meta = client.fs(&config).status(&user, &path, &config).await?;
    let modified: DateTime<Utc> = meta
        .modified()
        .map_err(|e| CommandError::failed(ReplyCode::LOCAL_ERROR, e.to_string()))?
        .into();

    client
        .reply(
            ReplyCode::FILE_STATUS,
            &modified.format("%Y%m%d%H%M%S").to_string(),
        )
        .await?;
    Ok(())
}
