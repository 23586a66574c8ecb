use crate::core_ftpcommand::error::CommandError;
use crate::core_log;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use crate::core_session::session::ClientState;

/// Handles the PASS command.
///
/// The attempt counter is checked before the password, so a client over the
/// cap never gets another verification. Exhausting the cap ends the session.
pub async fn handle_pass_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;

    if client.password_attempts_exceeded() {
        client.shared.set_state(ClientState::Finished);
        return Err(CommandError::failed(
            ReplyCode::NOT_LOGGED_IN,
            "Login incorrect.",
        ));
    }

    if !client.verify_password(&user, &arg_str) {
        core_log::security(
            "BADPASSWORD",
            &format!(
                "Failed password attempt for {} from {}",
                user.name,
                client.shared.hostname_and_ip()
            ),
        );
        if client.password_attempts_exceeded() {
            client.shared.set_state(ClientState::Finished);
        }
        return Err(CommandError::failed(
            ReplyCode::NOT_LOGGED_IN,
            "Login incorrect.",
        ));
    }

    if !client.post_check_address(&user) {
        core_log::security(
            "BADIDENTADDRESS",
            &format!(
                "User {} denied from address {}@{}",
                user.name,
                client.shared.ident(),
                client.shared.hostname_and_ip()
            ),
        );
        client.shared.set_state(ClientState::Finished);
        return Err(CommandError::failed(
            ReplyCode::NOT_LOGGED_IN,
            "Login incorrect.",
        ));
    }

    client.login().await?;
    let message = format!("User {} logged in.", user.name);
    client.reply(ReplyCode::USER_LOGGED_IN, &message).await?;
    Ok(())
}
