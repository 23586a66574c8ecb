mod config;
mod constants;
mod core_acl;
mod core_cli;
mod core_counter;
mod core_exec;
mod core_fs;
mod core_ftpcommand;
mod core_log;
mod core_network;
mod core_server;
mod core_session;
mod core_speed;
mod core_stats;
mod core_task;
mod helpers;

use crate::core_cli::Cli;
use crate::core_network::tls::TlsContext;
use anyhow::{Context, Result};
use config::Config;
use core_acl::store::UserStore;
use env_logger::{Builder, Env};
use log::{info, warn};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::from_args();

    let default_filter = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    let config_path = if args.config.is_empty() {
        "/etc/ferroftpd.conf"
    } else {
        args.config.as_str()
    };
    let mut config = Config::load_from_file(config_path)?;
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }

    let user_store = Arc::new(
        UserStore::load_from_file(Path::new(&config.server.users_file))
            .with_context(|| format!("Failed to load users from {}", config.server.users_file))?,
    );

    let tls = match (&config.server.tls_certificate, &config.server.tls_key) {
        (Some(cert), Some(key)) => {
            let context = TlsContext::new(cert, key)
                .with_context(|| format!("Failed to initialise TLS from {}", cert))?;
            info!("TLS enabled with certificate {}", cert);
            Some(Arc::new(context))
        }
        _ => {
            warn!("TLS certificate or key not configured; AUTH TLS is disabled");
            None
        }
    };

    config::init(config.clone(), config_path);

    let (tasks, task_rx) = core_task::channel();

    // SIGINT drains through the task queue like any administrative exit.
    let signal_tasks = tasks.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            signal_tasks.push(core_task::Task::Exit);
        }
    });

    // SIGHUP asks for a config reload on the server loop.
    let reload_tasks = tasks.clone();
    tokio::spawn(async move {
        let mut hangup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
        {
            Ok(hangup) => hangup,
            Err(e) => {
                warn!("Failed to install SIGHUP handler: {}", e);
                return;
            }
        };
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading configuration");
            let (reload, restart) = reload_tasks.reload_config().await;
            info!("Config reload: {:?}, restart needed: {:?}", reload, restart);
        }
    });

    let mut server =
        core_server::Server::bind(&config, user_store, tls, tasks, task_rx).await?;
    server.run().await
}
