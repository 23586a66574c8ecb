use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles RNFR: checks the source exists and arms the pending rename.
pub async fn handle_rnfr_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let path = VirtualPath::from_user(&client.cwd, &arg_str);

    client.fs(&config).status(&user, &path, &config).await?;

    client.rename_from = Some(path);
    client
        .reply(
            ReplyCode::PENDING_FURTHER_INFO,
            "File exists, ready for destination name.",
        )
        .await?;
    Ok(())
}
