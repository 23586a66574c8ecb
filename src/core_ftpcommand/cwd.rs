use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles the CWD command.
///
/// The target must resolve to a visible directory under the storage root;
/// the session's working directory only moves on success.
pub async fn handle_cwd_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let target = VirtualPath::from_user(&client.cwd, &arg_str);

    let meta = client.fs(&config).status(&user, &target, &config).await?;
    if !meta.is_dir() {
        return Err(CommandError::failed(
            ReplyCode::ACTION_NOT_OKAY,
            format!("{}: Not a directory.", target),
        ));
    }

    client.cwd = target;
    client
        .reply(ReplyCode::FILE_ACTION_OKAY, "CWD command successful.")
        .await?;
    Ok(())
}
