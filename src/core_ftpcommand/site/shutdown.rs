use crate::core_ftpcommand::error::CommandError;
use crate::core_log;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use crate::core_task::Task;

/// Handles SITE SHUTDOWN: siteop-only, and armed twice before it fires.
pub async fn handle_site_shutdown(
    client: &mut Client,
    command_line: &str,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    if !user.is_siteop() {
        return Err(CommandError::failed(
            ReplyCode::ACTION_NOT_OKAY,
            "Permission denied.",
        ));
    }

    if !client.confirm_command(command_line) {
        client
            .reply(
                ReplyCode::COMMAND_OKAY,
                "Repeat the command to confirm shutdown.",
            )
            .await?;
        return Ok(());
    }

    core_log::siteop(&user.name, "server shutdown requested");
    client
        .reply(ReplyCode::COMMAND_OKAY, "Shutting down.")
        .await?;
    client.tasks.push(Task::Exit);
    Ok(())
}
