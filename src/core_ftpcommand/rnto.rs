use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles RNTO: completes a rename armed by RNFR.
pub async fn handle_rnto_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let from = match client.rename_from.take() {
        Some(from) => from,
        None => {
            return Err(CommandError::failed(
                ReplyCode::BAD_COMMAND_SEQUENCE,
                "RNFR required first.",
            ))
        }
    };

    let user = client.require_user()?;
    let config = client.config();
    let to = VirtualPath::from_user(&client.cwd, &arg_str);

    client.fs(&config).rename(&user, &from, &to, &config).await?;
    client
        .reply(ReplyCode::FILE_ACTION_OKAY, "RNTO command successful.")
        .await?;
    Ok(())
}
