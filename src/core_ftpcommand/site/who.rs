use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles SITE WHO: a snapshot of every online session, fetched through
/// the supervisor's task queue.
pub async fn handle_site_who(client: &mut Client) -> Result<(), CommandError> {
    let users = client.tasks.get_online_users().await;

    let mut text = String::from("Users online:\n");
    for user in &users {
        text.push_str(&format!(
            " {:<12} {:<24} {:<16} idle {:>4}s  {}\n",
            user.name,
            format!("{}@{}", user.ident, user.hostname),
            user.state,
            user.idle.as_secs(),
            user.current_command.as_deref().unwrap_or("-"),
        ));
    }
    text.push_str(&format!("Total: {}.", users.len()));
    client.reply(ReplyCode::COMMAND_OKAY, &text).await?;
    Ok(())
}
