use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::dirlist::{DirectoryList, ListOptions};
use crate::core_ftpcommand::error::CommandError;
use crate::core_ftpcommand::transfer;
use crate::core_session::client::Client;

/// Handles the LIST command.
///
/// The argument may carry `ls`-style options and a path with glob masks in
/// its final component. The listing is assembled first, then streamed over
/// the data channel.
pub async fn handle_list_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();

    let (mut options, path_part) = ListOptions::from_arg(&arg_str);
    options.long_format = true;
    let path = VirtualPath::from_user(&client.cwd, &path_part);

    let fs = client.fs(&config);
    let listing = DirectoryList::new(&fs, &user, &config, options)
        .build(&path)
        .await?;

    transfer::send_listing(client, listing).await
}
