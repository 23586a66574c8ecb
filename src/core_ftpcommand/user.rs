use crate::core_acl::user::Flag;
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles the USER command.
///
/// Binds the named account and moves the session to `WaitingPassword`. A
/// leading `!` asks for the oldest login to be replaced if the personal cap
/// is full. A fresh USER resets the password attempt counter.
pub async fn handle_user_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    let (name, kick_login) = match args[0].strip_prefix('!') {
        Some(name) => (name, true),
        None => (args[0].as_str(), false),
    };
    if name.is_empty() {
        return Err(CommandError::Syntax);
    }

    let user = match client.user_store.lookup_name(name) {
        Some(user) if !user.has_flag(Flag::Deleted) => user,
        _ => {
            return Err(CommandError::failed(
                ReplyCode::NOT_LOGGED_IN,
                format!("User {} access denied.", name),
            ))
        }
    };

    let prompt = format!("Password required for {}.", user.name);
    client.set_waiting_password(user, kick_login);
    client.reply(ReplyCode::NEED_PASSWORD, &prompt).await?;
    Ok(())
}
