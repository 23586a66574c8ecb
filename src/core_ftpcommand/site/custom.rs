//! Operator-defined SITE commands: EXEC, TEXT and ALIAS kinds.

use crate::config::{SiteCmdConfig, SiteCmdKind};
use crate::core_exec::ProcessReader;
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use log::warn;

pub async fn handle_custom_command(
    client: &mut Client,
    cmd: &SiteCmdConfig,
    rest: &str,
) -> Result<(), CommandError> {
    match cmd.kind {
        SiteCmdKind::Exec => exec_command(client, cmd, rest).await,
        SiteCmdKind::Text => text_command(client, cmd).await,
        SiteCmdKind::Alias => alias_command(client, cmd, rest).await,
    }
}

/// Spawns the target program and streams each stdout line as a `200-`
/// continuation, closed by the terminal reply.
async fn exec_command(
    client: &mut Client,
    cmd: &SiteCmdConfig,
    rest: &str,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let mut args = vec![user.name.clone()];
    args.extend(rest.split_whitespace().map(|s| s.to_string()));

    let mut reader = match ProcessReader::spawn(&cmd.target, &args) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("SITE {}: failed to spawn {}: {}", cmd.name, cmd.target, e);
            return Err(CommandError::failed(
                ReplyCode::LOCAL_ERROR,
                "Requested action aborted. Local error in processing.",
            ));
        }
    };

    let interrupter = client.shared.interrupter().clone();
    loop {
        let line = tokio::select! {
            biased;
            _ = interrupter.wait() => break,
            line = reader.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                client
                    .control
                    .part_reply(ReplyCode::COMMAND_OKAY, &line)
                    .await?;
            }
            Ok(None) => break,
            Err(e) => {
                warn!("SITE {}: read error: {}", cmd.name, e);
                break;
            }
        }
    }

    let success = reader.close().await.unwrap_or(false);
    if success {
        client
            .reply(ReplyCode::COMMAND_OKAY, "Command successful.")
            .await?;
    } else {
        client
            .reply(ReplyCode::ACTION_NOT_OKAY, "Command failed.")
            .await?;
    }
    Ok(())
}

/// Sends a text file from disk as the reply body.
async fn text_command(client: &mut Client, cmd: &SiteCmdConfig) -> Result<(), CommandError> {
    let contents = crate::helpers::load_file(&cmd.target).map_err(|e| {
        warn!("SITE {}: {}", cmd.name, e);
        CommandError::failed(ReplyCode::LOCAL_ERROR, "Message file unavailable.")
    })?;
    client
        .reply(ReplyCode::COMMAND_OKAY, contents.trim_end())
        .await?;
    Ok(())
}

/// Re-dispatches the target command line in place of the alias.
async fn alias_command(
    client: &mut Client,
    cmd: &SiteCmdConfig,
    rest: &str,
) -> Result<(), CommandError> {
    let line = if rest.is_empty() {
        cmd.target.clone()
    } else {
        format!("{} {}", cmd.target, rest)
    };
    Box::pin(client.execute_command(&line))
        .await
        .map_err(CommandError::Network)
}
