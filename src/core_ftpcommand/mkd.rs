use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_log;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_mkd_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let path = VirtualPath::from_user(&client.cwd, &arg_str);

    if let Err(e) = client
        .fs(&config)
        .make_directory(&user, &path, &config)
        .await
    {
        let (code, message) = e.to_reply();
        client
            .reply(code, &format!("{}: {}", arg_str, message))
            .await?;
        return Err(CommandError::NoPostScript);
    }

    if config.is_event_logged(path.as_str()) {
        core_log::event(
            "NEWDIR",
            &[
                ("path", path.as_str()),
                ("user", user.name.as_str()),
                ("group", user.group.as_str()),
                ("tagline", user.tagline.as_str()),
            ],
        );
    }

    let message = format!("\"{}\" directory created.", path);
    client.reply(ReplyCode::PATH_CREATED, &message).await?;
    Ok(())
}
