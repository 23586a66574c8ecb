use crate::core_counter::Counter;
use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_ftpcommand::transfer;
use crate::core_log;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use crate::core_speed::SpeedControl;
use log::info;

/// Handles the STOR (store file) command.
///
/// Admission runs before the data connection opens: a session over the
/// simultaneous-upload cap is refused with `550` and no endpoint is touched.
/// The byte pump honours REST offsets, ASCII translation, the speed rules
/// captured at open, and a concurrent ABOR.
pub async fn handle_stor_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    store_file(client, arg_str, false).await
}

pub(crate) async fn store_file(
    client: &mut Client,
    arg_str: String,
    append: bool,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();
    let path = VirtualPath::from_user(&client.cwd, &arg_str);

    let _guard = Counter::uploads()
        .start(config.server.max_uploads)
        .map_err(|e| CommandError::failed(ReplyCode::ACTION_NOT_OKAY, e.to_string()))?;

    let offset = if append { 0 } else { client.take_rest_offset() };
    let mut file = client
        .fs(&config)
        .open_write(&user, &path, offset, append, &config)
        .await?;

    client
        .reply(
            ReplyCode::DATA_OPEN,
            "File status okay; about to open data connection.",
        )
        .await?;
    client.open_data().await?;

    let mut speed = SpeedControl::upload(&user, &path, &config);
    let buffer_size = transfer::upload_buffer_size(client);
    let outcome = client.pump_recv(&mut file, &mut speed, buffer_size).await?;
    drop(speed);

    if let Some(bytes) = client.end_transfer(outcome).await? {
        info!("File stored: {} ({} bytes)", path, bytes);
        core_log::transfer(&[
            ("direction", "up"),
            ("path", path.as_str()),
            ("user", user.name.as_str()),
            ("bytes", bytes.to_string().as_str()),
        ]);
        if config.is_event_logged(path.as_str()) {
            core_log::event(
                "UPLOAD",
                &[
                    ("path", path.as_str()),
                    ("user", user.name.as_str()),
                    ("group", user.group.as_str()),
                ],
            );
        }
    }
    Ok(())
}
