use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_log;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use crate::core_stats;

pub async fn handle_rmd_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let path = VirtualPath::from_user(&client.cwd, &arg_str);

    if let Err(e) = client
        .fs(&config)
        .remove_directory(&user, &path, &config)
        .await
    {
        let (code, message) = e.to_reply();
        client
            .reply(code, &format!("{}: {}", arg_str, message))
            .await?;
        return Err(CommandError::NoPostScript);
    }

    if config.is_indexed(path.as_str()) {
        core_stats::index_delete(path.as_str());
    }
    if config.is_event_logged(path.as_str()) {
        core_log::event(
            "DELDIR",
            &[
                ("path", path.as_str()),
                ("user", user.name.as_str()),
                ("group", user.group.as_str()),
                ("tagline", user.tagline.as_str()),
            ],
        );
    }

    client
        .reply(ReplyCode::FILE_ACTION_OKAY, "RMD command successful.")
        .await?;
    Ok(())
}
