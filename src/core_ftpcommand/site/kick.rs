use crate::core_ftpcommand::error::CommandError;
use crate::core_log;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles SITE KICK <user>: interrupts every session of the named user.
pub async fn handle_site_kick(client: &mut Client, target: &str) -> Result<(), CommandError> {
    let admin = client.require_user()?;
    if !admin.is_siteop() {
        return Err(CommandError::failed(
            ReplyCode::ACTION_NOT_OKAY,
            "Permission denied.",
        ));
    }
    if target.is_empty() {
        return Err(CommandError::Syntax);
    }

    let victim = match client.user_store.lookup_name(target) {
        Some(victim) => victim,
        None => {
            return Err(CommandError::failed(
                ReplyCode::ACTION_NOT_OKAY,
                format!("Unknown user: {}.", target),
            ))
        }
    };

    let kicked = client.tasks.kick_user(victim.uid, false).await;
    core_log::siteop(
        &admin.name,
        &format!("kicked {} session(s) of {}", kicked, victim.name),
    );
    client
        .reply(
            ReplyCode::COMMAND_OKAY,
            &format!("Kicked {} session(s) of {}.", kicked, victim.name),
        )
        .await?;
    Ok(())
}
