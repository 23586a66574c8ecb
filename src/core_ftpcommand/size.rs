use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_size_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let path = VirtualPath::from_user(&client.cwd, &arg_str);

    let meta = client.fs(&config).status(&user, &path, &config).await?;
    if meta.is_dir() {
        return Err(CommandError::failed(
            ReplyCode::ACTION_NOT_OKAY,
            format!("{}: not a regular file.", arg_str),
        ));
    }

    client
        .reply(ReplyCode::FILE_STATUS, &meta.len().to_string())
        .await?;
    Ok(())
}
