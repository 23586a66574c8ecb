use crate::core_counter::Counter;
use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_ftpcommand::transfer;
use crate::core_log;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use crate::core_speed::SpeedControl;
use log::info;

/// Handles the RETR (retrieve file) command.
pub async fn handle_retr_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let path = VirtualPath::from_user(&client.cwd, &arg_str);

    let _guard = Counter::downloads()
        .start(config.server.max_downloads)
        .map_err(|e| CommandError::failed(ReplyCode::ACTION_NOT_OKAY, e.to_string()))?;

    let offset = client.take_rest_offset();
    let mut file = client
        .fs(&config)
        .open_read(&user, &path, offset, &config)
        .await?;

    client
        .reply(
            ReplyCode::DATA_OPEN,
            "File status okay; about to open data connection.",
        )
        .await?;
    client.open_data().await?;

    let mut speed = SpeedControl::download(&user, &path, &config);
    let buffer_size = transfer::download_buffer_size(client);
    let outcome = client.pump_send(&mut file, &mut speed, buffer_size).await?;
    drop(speed);

    if let Some(bytes) = client.end_transfer(outcome).await? {
        info!("File sent: {} ({} bytes)", path, bytes);
        core_log::transfer(&[
            ("direction", "down"),
            ("path", path.as_str()),
            ("user", user.name.as_str()),
            ("bytes", bytes.to_string().as_str()),
        ]);
    }
    Ok(())
}
