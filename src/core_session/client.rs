//! One connected client: command loop, dispatch envelope, teardown.

use crate::config::{self, Config, CscriptType};
use crate::constants::{IDNT_WAIT_SECS, MAX_PASSWORD_ATTEMPTS};
use crate::core_acl::store::UserStore;
use crate::core_acl::user::{Flag, User};
use crate::core_counter::{Counter, CounterResult};
use crate::core_exec::{self, HookOutcome};
use crate::core_fs::{FileSystem, VirtualPath};
use crate::core_ftpcommand::error::CommandError;
use crate::core_ftpcommand::{self, CommandDef};
use crate::core_log;
use crate::core_network::control::ControlChannel;
use crate::core_network::data::{DataChannel, TransferError};
use crate::core_network::error::NetworkError;
use crate::core_network::reply::ReplyCode;
use crate::core_network::socket::Socket;
use crate::core_network::tls::TlsContext;
use crate::core_network::{ident, resolver};
use crate::core_session::session::{ClientState, RequiredState, SessionId, SessionShared};
use crate::core_speed::SpeedControl;
use crate::core_stats;
use crate::core_task::{Task, TaskSender};
use crate::helpers::{compress_whitespace, wildcard_match};
use log::debug;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// How one byte pump ended.
pub enum TransferOutcome {
    Complete(u64),
    /// Client sent ABOR on the control channel mid-transfer.
    Aborted,
    Failed(TransferError),
}

pub struct Client {
    pub shared: Arc<SessionShared>,
    pub control: ControlChannel,
    pub data: DataChannel,
    pub tasks: TaskSender,
    pub user_store: Arc<UserStore>,
    pub tls: Option<Arc<TlsContext>>,
    pub cwd: VirtualPath,
    pub rename_from: Option<VirtualPath>,
    pub rest_offset: u64,
    pub kick_login: bool,
    pub epsv_all: bool,
    password_attempts: u32,
    confirm_command: Option<String>,
    idle_timeout: Duration,
    /// Survives the Finished transition so teardown traffic accounting can
    /// still name the user a QUIT already unbound.
    accounted_uid: Option<crate::core_acl::user::UserId>,
}

fn unmapped_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => ip,
        },
        v4 => v4,
    }
}

impl Client {
    pub fn new(
        stream: TcpStream,
        id: SessionId,
        user_store: Arc<UserStore>,
        tls: Option<Arc<TlsContext>>,
        tasks: TaskSender,
    ) -> Result<(Self, Arc<SessionShared>), NetworkError> {
        let peer_ip = unmapped_ip(stream.peer_addr()?.ip());
        let shared = SessionShared::new(id, peer_ip.to_string());
        let interrupter = shared.interrupter().clone();
        let socket = Socket::from_stream(stream, interrupter.clone())?;
        let client = Self {
            shared: Arc::clone(&shared),
            control: ControlChannel::new(socket),
            data: DataChannel::new(interrupter),
            tasks,
            user_store,
            tls,
            cwd: VirtualPath::root(),
            rename_from: None,
            rest_offset: 0,
            kick_login: false,
            epsv_all: false,
            password_attempts: 0,
            confirm_command: None,
            idle_timeout: Duration::ZERO,
            accounted_uid: None,
        };
        Ok((client, shared))
    }

    pub fn config(&self) -> Arc<Config> {
        config::get()
    }

    pub fn fs(&self, config: &Config) -> FileSystem {
        FileSystem::new(Path::new(&config.server.root_dir))
    }

    pub fn state(&self) -> ClientState {
        self.shared.state()
    }

    pub async fn reply(&mut self, code: ReplyCode, text: &str) -> Result<(), NetworkError> {
        self.control.reply(code, text).await
    }

    /// The bound user record; state checks guarantee one exists for the
    /// commands that call this.
    pub fn require_user(&self) -> Result<User, CommandError> {
        self.shared
            .user()
            .ok_or_else(|| CommandError::failed(ReplyCode::NOT_LOGGED_IN, "Not logged in."))
    }

    pub fn peer_ip(&self) -> IpAddr {
        unmapped_ip(self.control.peer_addr().ip())
    }

    // ---- login ----------------------------------------------------------

    pub fn set_waiting_password(&mut self, user: User, kick_login: bool) {
        self.password_attempts = 0;
        self.kick_login = kick_login;
        self.shared.set_waiting_password(user);
    }

    /// Counts the attempt before checking, so the cap cannot be probed.
    pub fn verify_password(&mut self, user: &User, password: &str) -> bool {
        self.password_attempts += 1;
        user.verify_password(password)
    }

    pub fn password_attempts_exceeded(&self) -> bool {
        self.password_attempts >= MAX_PASSWORD_ATTEMPTS
    }

    /// Runs login admission and, on success, enters `LoggedIn`.
    pub async fn login(&mut self) -> Result<(), CommandError> {
        let user = self.require_user()?;
        let config = self.config();

        let replace = if self.kick_login {
            self.tasks.login_kick_user(user.uid).await.kicked
        } else {
            false
        };

        match Counter::login().start(
            user.uid,
            user.num_logins,
            replace,
            user.has_flag(Flag::Exempt),
            config.server.max_users,
        ) {
            CounterResult::Okay => {}
            CounterResult::PersonalFail => {
                return Err(CommandError::failed(
                    ReplyCode::NOT_LOGGED_IN,
                    format!("You've reached your maximum of {} login(s).", user.num_logins),
                ))
            }
            CounterResult::GlobalFail => {
                return Err(CommandError::failed(
                    ReplyCode::NOT_LOGGED_IN,
                    "The server has reached its maximum number of logged in users.",
                ))
            }
        }

        let idle_secs = if user.idle_time < 0 {
            config.server.idle_timeout
        } else {
            user.idle_time as u64
        };
        self.idle_timeout = Duration::from_secs(idle_secs);
        self.accounted_uid = Some(user.uid);
        self.shared.set_logged_in();
        self.shared.reset_idle(if idle_secs == 0 {
            None
        } else {
            Some(self.idle_timeout)
        });

        core_log::event(
            "LOGIN",
            &[
                (
                    "ident_address",
                    format!("{}@{}", self.shared.ident(), self.shared.hostname()).as_str(),
                ),
                ("ip", format!("({})", self.shared.ip()).as_str()),
                ("user", user.name.as_str()),
                ("group", user.group.as_str()),
                ("tagline", user.tagline.as_str()),
            ],
        );
        Ok(())
    }

    /// Post-authentication address gate against the user's ident@host masks.
    pub fn post_check_address(&self, user: &User) -> bool {
        let ident = self.shared.ident();
        let ip = self.shared.ip();
        let hostname = self.shared.hostname();
        self.user_store
            .is_ident_ip_allowed(user.uid, &format!("{}@{}", ident, ip))
            || (ip != hostname
                && self
                    .user_store
                    .is_ident_ip_allowed(user.uid, &format!("{}@{}", ident, hostname)))
    }

    // ---- two-step confirmation ------------------------------------------

    /// First issue arms the token and returns false; an identical second
    /// issue consumes it. Any different command line re-arms.
    pub fn confirm_command(&mut self, arg_str: &str) -> bool {
        let command = compress_whitespace(arg_str);
        if self.confirm_command.as_deref() != Some(&command) {
            self.confirm_command = Some(command);
            return false;
        }
        self.confirm_command = None;
        true
    }

    // ---- data channel helpers -------------------------------------------

    pub fn take_rest_offset(&mut self) -> u64 {
        std::mem::take(&mut self.rest_offset)
    }

    /// Opens the configured data endpoint; failures become a 425.
    pub async fn open_data(&mut self) -> Result<(), CommandError> {
        if !self.data.is_configured() {
            return Err(CommandError::failed(
                ReplyCode::CANT_OPEN_DATA,
                "Use PORT or PASV first.",
            ));
        }
        let expected = Some(self.peer_ip());
        let tls = self.tls.clone();
        match self.data.open(tls.as_deref(), expected).await {
            Ok(()) => Ok(()),
            Err(NetworkError::Interrupted) => Err(NetworkError::Interrupted.into()),
            Err(e) => {
                self.data.close().await;
                debug!("Failed to open data connection: {}", e);
                Err(CommandError::failed(
                    ReplyCode::CANT_OPEN_DATA,
                    "Can't open data connection.",
                ))
            }
        }
    }

    /// Pumps `source` out on the data channel while listening for ABOR on
    /// the control channel. Pump failures, an external kick included, come
    /// back as a `Failed` outcome so the 426/226 pair still goes out; only
    /// a control-channel failure mid-transfer is fatal.
    pub async fn pump_send(
        &mut self,
        source: &mut (impl AsyncRead + Unpin),
        speed: &mut SpeedControl,
        buffer_size: usize,
    ) -> Result<TransferOutcome, NetworkError> {
        let data = &mut self.data;
        let control = &mut self.control;
        tokio::select! {
            biased;
            result = data.send(source, speed, buffer_size) => match result {
                Ok(bytes) => Ok(TransferOutcome::Complete(bytes)),
                Err(e) => Ok(TransferOutcome::Failed(e)),
            },
            result = control.wait_for_abor() => match result {
                Ok(()) => Ok(TransferOutcome::Aborted),
                Err(e) => Err(e),
            },
        }
    }

    pub async fn pump_recv(
        &mut self,
        sink: &mut (impl AsyncWrite + Unpin),
        speed: &mut SpeedControl,
        buffer_size: usize,
    ) -> Result<TransferOutcome, NetworkError> {
        let data = &mut self.data;
        let control = &mut self.control;
        tokio::select! {
            biased;
            result = data.recv(sink, speed, buffer_size) => match result {
                Ok(bytes) => Ok(TransferOutcome::Complete(bytes)),
                Err(e) => Ok(TransferOutcome::Failed(e)),
            },
            result = control.wait_for_abor() => match result {
                Ok(()) => Ok(TransferOutcome::Aborted),
                Err(e) => Err(e),
            },
        }
    }

    /// Closes the channel and sends the terminal replies: `226` on success,
    /// `426` then `226` on abort or failure. Returns the byte count on
    /// success so the handler can log the transfer.
    pub async fn end_transfer(
        &mut self,
        outcome: TransferOutcome,
    ) -> Result<Option<u64>, CommandError> {
        self.data.close().await;
        match outcome {
            TransferOutcome::Complete(bytes) => {
                self.reply(ReplyCode::TRANSFER_COMPLETE, "Transfer complete.")
                    .await?;
                Ok(Some(bytes))
            }
            TransferOutcome::Aborted => {
                self.reply(
                    ReplyCode::TRANSFER_ABORTED,
                    "Connection closed; transfer aborted.",
                )
                .await?;
                self.reply(ReplyCode::TRANSFER_COMPLETE, "ABOR command successful.")
                    .await?;
                Ok(None)
            }
            TransferOutcome::Failed(e) => {
                let detail = match &e {
                    TransferError::MinimumSpeed(e) => e.to_string(),
                    _ => "Connection closed; transfer aborted.".to_string(),
                };
                debug!("Transfer failed: {}", e);
                self.reply(ReplyCode::TRANSFER_ABORTED, &detail).await?;
                self.reply(ReplyCode::TRANSFER_COMPLETE, "Transfer aborted.")
                    .await?;
                Ok(None)
            }
        }
    }

    // ---- command envelope -----------------------------------------------

    async fn check_state(&mut self, required: RequiredState) -> Result<bool, NetworkError> {
        let state = self.state();
        let satisfied = match required {
            RequiredState::AnyState => true,
            RequiredState::NotBeforeAuth => {
                if self.control.is_tls() {
                    true
                } else {
                    self.reply(
                        ReplyCode::BAD_COMMAND_SEQUENCE,
                        "AUTH command must be issued first.",
                    )
                    .await?;
                    return Ok(false);
                }
            }
            RequiredState::LoggedOut => state == ClientState::LoggedOut,
            RequiredState::WaitingPassword => state == ClientState::WaitingPassword,
            RequiredState::LoggedIn => state == ClientState::LoggedIn,
        };
        if satisfied {
            return Ok(true);
        }
        match state {
            ClientState::LoggedIn => {
                self.reply(ReplyCode::NOT_LOGGED_IN, "Already logged in.")
                    .await?
            }
            ClientState::WaitingPassword => {
                self.reply(ReplyCode::BAD_COMMAND_SEQUENCE, "Expecting PASS command.")
                    .await?
            }
            ClientState::LoggedOut if required == RequiredState::WaitingPassword => {
                self.reply(
                    ReplyCode::BAD_COMMAND_SEQUENCE,
                    "Expecting USER command first.",
                )
                .await?
            }
            ClientState::LoggedOut => {
                self.reply(ReplyCode::NOT_LOGGED_IN, "Not logged in.").await?
            }
            ClientState::Finished => {}
        }
        Ok(false)
    }

    fn idle_reset(&self, command_line: &str) {
        let config = self.config();
        for mask in &config.server.idle_exempt {
            if wildcard_match(mask, command_line, true) {
                return;
            }
        }
        if self.state() == ClientState::LoggedIn && !self.idle_timeout.is_zero() {
            self.shared.reset_idle(Some(self.idle_timeout));
        } else {
            self.shared.reset_idle(None);
        }
    }

    /// The common handler envelope: arg bounds, state check, PRE hooks,
    /// handler, POST hooks, idle reset. The command being executed is
    /// recorded before dispatch and always cleared after.
    pub async fn execute_command(&mut self, command_line: &str) -> Result<(), NetworkError> {
        let command_line = command_line.trim_start();
        let mut parts = command_line.split_whitespace();
        let verb = match parts.next() {
            Some(verb) => verb.to_uppercase(),
            None => {
                return Err(NetworkError::Protocol("empty command".to_string()));
            }
        };
        let operands: Vec<String> = parts.map(|s| s.to_string()).collect();
        let arg_str = command_line[command_line.find(' ').map(|i| i + 1).unwrap_or(command_line.len())..]
            .trim()
            .to_string();
        let current = if arg_str.is_empty() {
            verb.clone()
        } else {
            format!("{} {}", verb, arg_str)
        };

        self.shared.set_current_command(Some(current.clone()));
        let result = self.dispatch(&verb, arg_str, operands, &current).await;
        self.shared.set_current_command(None);
        result?;
        self.idle_reset(command_line);
        Ok(())
    }

    async fn dispatch(
        &mut self,
        verb: &str,
        arg_str: String,
        operands: Vec<String>,
        current: &str,
    ) -> Result<(), NetworkError> {
        let def: &'static CommandDef = match core_ftpcommand::lookup(verb) {
            Some(def) => def,
            None => {
                return self
                    .reply(ReplyCode::COMMAND_UNRECOGNISED, "Command not understood")
                    .await;
            }
        };

        if !def.check_args(operands.len()) {
            return self
                .reply(ReplyCode::SYNTAX_ERROR, &format!("Syntax: {}", def.syntax))
                .await;
        }

        if !self.check_state(def.required_state).await? {
            return Ok(());
        }

        if self.state() == ClientState::LoggedIn {
            let config = self.config();
            let user_name = self.shared.user().map(|u| u.name).unwrap_or_default();
            let interrupter = self.shared.interrupter().clone();
            if let HookOutcome::Vetoed = core_exec::run_cscripts(
                &config,
                CscriptType::Pre,
                verb,
                &user_name,
                current,
                &interrupter,
            )
            .await
            {
                return self
                    .reply(def.fail_code, &format!("{}: command denied.", verb))
                    .await;
            }
        }

        let result = (def.handler)(self, arg_str, operands).await;

        match result {
            Ok(()) => {
                if self.state() == ClientState::LoggedIn {
                    let config = self.config();
                    let user_name = self.shared.user().map(|u| u.name).unwrap_or_default();
                    let interrupter = self.shared.interrupter().clone();
                    core_exec::run_cscripts(
                        &config,
                        CscriptType::Post,
                        verb,
                        &user_name,
                        current,
                        &interrupter,
                    )
                    .await;
                }
            }
            Err(CommandError::Syntax) => {
                self.reply(ReplyCode::SYNTAX_ERROR, &format!("Syntax: {}", def.syntax))
                    .await?;
            }
            Err(CommandError::NoPostScript) => {}
            Err(CommandError::Failed(code, message)) => {
                self.reply(code, &message).await?;
            }
            Err(CommandError::Network(e)) => return Err(e),
        }
        Ok(())
    }

    // ---- user reload ----------------------------------------------------

    /// Reload after a UserUpdate task. A missing or deleted record ends the
    /// session.
    fn reload_user(&mut self) -> bool {
        let uid = match self.shared.uid() {
            Some(uid) => uid,
            None => return true,
        };
        if let Err(e) = self.user_store.refresh() {
            core_log::failure(&format!("Failed to reload user store: {}", e));
        }
        let user = match self.user_store.load(uid) {
            Some(user) => user,
            None => {
                core_log::failure(&format!("Failed to reload user record for uid {}", uid));
                self.shared.set_state(ClientState::Finished);
                return false;
            }
        };
        if user.has_flag(Flag::Deleted) {
            self.shared.set_state(ClientState::Finished);
            return false;
        }
        debug!("Reloaded user profile for {}", user.name);
        self.shared.replace_user(user);
        true
    }

    // ---- connection preamble --------------------------------------------

    async fn hostname_lookup(&mut self) {
        if !self.shared.hostname().is_empty() {
            return;
        }
        let ip = self.peer_ip();
        let hostname = resolver::reverse_resolve(ip).await;
        self.shared.set_hostname(hostname);
    }

    fn pre_check_address(&self) -> bool {
        let ip = self.shared.ip();
        let hostname = self.shared.hostname();
        if !self.user_store.is_ip_allowed(&ip)
            && (ip == hostname || !self.user_store.is_ip_allowed(&hostname))
        {
            core_log::security(
                "BADADDRESS",
                &format!(
                    "Refused connection from unknown address: {}",
                    self.shared.hostname_and_ip()
                ),
            );
            return false;
        }
        true
    }

    async fn lookup_ident(&mut self) {
        if self.shared.ident() != "*" {
            return;
        }
        let local = self.control.local_addr();
        let remote = self.control.peer_addr();
        match ident::lookup(local, remote, self.shared.interrupter().clone()).await {
            Ok(identity) => self.shared.set_ident(identity),
            Err(e) => debug!("Unable to lookup ident for connection from {}: {}", remote, e),
        }
    }

    /// Parses a bouncer's `IDNT ident@ip:hostname` preamble.
    pub fn idnt_parse(&mut self, command: &str) -> bool {
        let mut parts = command.split_whitespace();
        if parts.next().map(|v| v.to_uppercase()) != Some("IDNT".to_string()) {
            return false;
        }
        let triple = match (parts.next(), parts.next()) {
            (Some(triple), None) => triple,
            _ => return false,
        };
        let at = match triple.find('@') {
            Some(at) => at,
            None => return false,
        };
        let colon = match triple.rfind(':') {
            Some(colon) if colon > at => colon,
            _ => return false,
        };
        let ident = &triple[..at];
        let ip = &triple[at + 1..colon];
        let hostname = &triple[colon + 1..];
        if ident.is_empty() || ip.is_empty() || hostname.is_empty() {
            return false;
        }
        let ip = match ip.parse::<IpAddr>() {
            Ok(parsed) => unmapped_ip(parsed).to_string(),
            Err(_) => return false,
        };
        self.shared
            .idnt_update(ident.to_string(), ip, hostname.to_string());
        true
    }

    async fn display_banner(&mut self) -> Result<(), NetworkError> {
        let config = self.config();
        if let Some(banner_path) = &config.server.banner {
            if let Ok(banner) = crate::helpers::load_file(banner_path) {
                return self
                    .reply(ReplyCode::SERVICE_READY, banner.trim_end())
                    .await;
            }
        }
        self.reply(ReplyCode::SERVICE_READY, &config.server.login_prompt)
            .await
    }

    // ---- main loop ------------------------------------------------------

    async fn handle(&mut self) -> Result<(), NetworkError> {
        while self.state() != ClientState::Finished {
            let deadline = if self.state() == ClientState::LoggedIn && !self.idle_timeout.is_zero()
            {
                self.shared.idle_expires()
            } else {
                None
            };
            let command = self.control.next_command(deadline).await?;
            if self.shared.take_user_updated() && !self.reload_user() {
                break;
            }
            if command.trim().is_empty() {
                continue;
            }
            self.execute_command(&command).await?;
        }
        Ok(())
    }

    async fn inner_run(&mut self) -> Result<(), NetworkError> {
        let config = self.config();
        let ip = self.shared.ip();

        if !config.is_bouncer(&ip) {
            if config.server.bouncer_only && !self.peer_ip().is_loopback() {
                core_log::security(
                    "NONBOUNCER",
                    &format!(
                        "Refused connection not from a bouncer address: {}",
                        self.shared.hostname_and_ip()
                    ),
                );
                return Ok(());
            }
        } else {
            let command = self
                .control
                .wait_for_idnt(Duration::from_secs(IDNT_WAIT_SECS))
                .await?;
            if command.is_empty() {
                if config.server.bouncer_only {
                    core_log::security(
                        "IDNTTIMEOUT",
                        &format!(
                            "Timeout while waiting for IDNT command from bouncer: {}",
                            self.shared.hostname_and_ip()
                        ),
                    );
                    return Ok(());
                }
            } else if !self.idnt_parse(&command) {
                core_log::security(
                    "BADIDNT",
                    &format!(
                        "Malformed IDNT command from bouncer: {}",
                        self.shared.hostname_and_ip()
                    ),
                );
                return Ok(());
            }
        }

        self.hostname_lookup().await;
        if !self.pre_check_address() {
            return Ok(());
        }
        self.lookup_ident().await;

        debug!(
            "Servicing client connected from {}@{}",
            self.shared.ident(),
            self.shared.hostname_and_ip()
        );

        self.display_banner().await?;
        self.handle().await
    }

    fn log_traffic(&self) {
        let sent_kb = (self.control.bytes_written() + self.data.bytes_written()) / 1024;
        let received_kb = (self.control.bytes_read() + self.data.bytes_read()) / 1024;
        let uid = self.shared.uid().or(self.accounted_uid);
        core_stats::protocol_update(uid, sent_kb, received_kb);
    }

    /// Runs the session to completion. Teardown always executes: the state
    /// goes to `Finished`, traffic totals are flushed, and the supervisor
    /// gets a `ClientFinished` whatever path ended the loop.
    pub async fn run(mut self) {
        let result = self.inner_run().await;

        match result {
            Ok(()) => {}
            Err(NetworkError::Timeout) => {
                let _ = self
                    .control
                    .reply(
                        ReplyCode::SERVICE_UNAVAILABLE,
                        "Idle timeout exceeded, closing connection.",
                    )
                    .await;
                debug!(
                    "Client from {} connection timed out",
                    self.shared.hostname_and_ip()
                );
            }
            Err(e) if e.is_silent() => {
                debug!("Client from {} lost connection", self.shared.hostname_and_ip());
            }
            Err(e) => {
                debug!(
                    "Client from {} lost connection: {}",
                    self.shared.hostname_and_ip(),
                    e
                );
            }
        }

        // Traffic is attributed before Finished clears the user binding.
        self.log_traffic();
        self.shared.set_state(ClientState::Finished);
        self.data.close().await;
        self.control.shutdown().await;
        self.tasks.push(Task::ClientFinished {
            id: self.shared.id(),
        });
    }
}
