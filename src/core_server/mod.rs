//! The server supervisor: accepts connections, owns the session registry,
//! and drains the task queue serially on its own loop.

use crate::config::{self, Config};
use crate::core_acl::store::UserStore;
use crate::core_network::tls::TlsContext;
use crate::core_session::client::Client;
use crate::core_session::session::{ClientState, SessionId, SessionShared};
use crate::core_task::{LoginKickResult, ReloadResult, Task, TaskSender, WhoUser};
use anyhow::{Context, Result};
use log::{debug, error, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

struct SessionHandle {
    shared: Arc<SessionShared>,
    join: JoinHandle<()>,
}

pub struct Server {
    listener: TcpListener,
    tasks: TaskSender,
    task_rx: UnboundedReceiver<Task>,
    sessions: HashMap<SessionId, SessionHandle>,
    next_id: SessionId,
    user_store: Arc<UserStore>,
    tls: Option<Arc<TlsContext>>,
    accepting: bool,
}

impl Server {
    pub async fn bind(
        config: &Config,
        user_store: Arc<UserStore>,
        tls: Option<Arc<TlsContext>>,
        tasks: TaskSender,
        task_rx: UnboundedReceiver<Task>,
    ) -> Result<Self> {
        let address = format!(
            "{}:{}",
            config.server.listen_address, config.server.listen_port
        );
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;
        info!("Server listening on {}", address);
        Ok(Self {
            listener,
            tasks,
            task_rx,
            sessions: HashMap::new(),
            next_id: 1,
            user_store,
            tls,
            accepting: true,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until an `Exit` task has been executed and the last session has
    /// been joined.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept(), if self.accepting => match accepted {
                    Ok((stream, addr)) => self.spawn_session(stream, addr),
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                task = self.task_rx.recv() => match task {
                    Some(task) => {
                        if self.execute_task(task).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        info!("Server stopped");
        Ok(())
    }

    fn spawn_session(&mut self, stream: TcpStream, addr: SocketAddr) {
        let id = self.next_id;
        self.next_id += 1;
        match Client::new(
            stream,
            id,
            Arc::clone(&self.user_store),
            self.tls.clone(),
            self.tasks.clone(),
        ) {
            Ok((client, shared)) => {
                debug!("New connection from {:?} as session {}", addr, id);
                let join = tokio::spawn(client.run());
                self.sessions.insert(id, SessionHandle { shared, join });
            }
            Err(e) => error!("Error while accepting new client: {}", e),
        }
    }

    /// Returns true once the server should stop: Exit was seen and the
    /// session set has drained.
    async fn execute_task(&mut self, task: Task) -> bool {
        match task {
            Task::KickUser { uid, one_only, reply } => {
                let _ = reply.send(self.kick_user(uid, one_only));
            }
            Task::LoginKickUser { uid, reply } => {
                let _ = reply.send(self.login_kick_user(uid));
            }
            Task::GetOnlineUsers { reply } => {
                let users: Vec<WhoUser> = self
                    .sessions
                    .values()
                    .filter_map(|handle| handle.shared.who_snapshot())
                    .collect();
                let _ = reply.send(users);
            }
            Task::ReloadConfig { reply } => {
                let result = self.reload_config();
                // User records may have changed with the config; every
                // session re-reads its record at the next command boundary.
                if result.0 == ReloadResult::Okay {
                    for handle in self.sessions.values() {
                        handle.shared.mark_user_updated();
                    }
                }
                let _ = reply.send(result);
            }
            Task::UserUpdate { uid } => {
                for handle in self.sessions.values() {
                    if handle.shared.uid() == Some(uid) {
                        handle.shared.mark_user_updated();
                    }
                }
            }
            Task::ClientFinished { id } => {
                if let Some(handle) = self.sessions.remove(&id) {
                    if let Err(e) = handle.join.await {
                        error!("Unhandled error on client task {}: {}", id, e);
                    }
                    debug!("Session {} joined, {} remain", id, self.sessions.len());
                }
                return !self.accepting && self.sessions.is_empty();
            }
            Task::Exit => {
                info!("Exit requested, interrupting {} session(s)", self.sessions.len());
                self.accepting = false;
                for handle in self.sessions.values() {
                    handle.shared.interrupt();
                }
                return self.sessions.is_empty();
            }
        }
        false
    }

    fn live_sessions_of(&self, uid: u32) -> Vec<&SessionHandle> {
        self.sessions
            .values()
            .filter(|handle| {
                handle.shared.uid() == Some(uid)
                    && handle.shared.state() != ClientState::Finished
            })
            .collect()
    }

    fn kick_user(&self, uid: u32, one_only: bool) -> usize {
        let matching = self.live_sessions_of(uid);
        if matching.is_empty() {
            return 0;
        }
        if one_only {
            if let Some(oldest) = matching
                .iter()
                .max_by_key(|handle| handle.shared.idle_duration())
            {
                oldest.shared.interrupt();
                return 1;
            }
            return 0;
        }
        for handle in &matching {
            handle.shared.interrupt();
        }
        matching.len()
    }

    fn login_kick_user(&self, uid: u32) -> LoginKickResult {
        let matching = self.live_sessions_of(uid);
        let logins = matching.len();
        match matching
            .iter()
            .max_by_key(|handle| handle.shared.idle_duration())
        {
            Some(oldest) => {
                let idle = oldest.shared.idle_duration();
                oldest.shared.interrupt();
                LoginKickResult {
                    kicked: true,
                    idle,
                    logins,
                }
            }
            None => LoginKickResult {
                kicked: false,
                idle: std::time::Duration::ZERO,
                logins,
            },
        }
    }

    /// Re-parses the config file and publishes the new snapshot. Address or
    /// port changes cannot apply in place and are reported as StopStart.
    fn reload_config(&self) -> (ReloadResult, ReloadResult) {
        let path = match config::path() {
            Some(path) => path,
            None => return (ReloadResult::Fail, ReloadResult::Fail),
        };
        let new_config = match Config::load_from_file(&path) {
            Ok(new_config) => new_config,
            Err(e) => {
                error!("Config reload failed: {}", e);
                return (ReloadResult::Fail, ReloadResult::Fail);
            }
        };

        let current = config::get();
        let stop_start = if new_config.server.listen_address != current.server.listen_address
            || new_config.server.listen_port != current.server.listen_port
        {
            ReloadResult::StopStart
        } else {
            ReloadResult::Okay
        };

        config::replace(new_config);
        if let Err(e) = self.user_store.refresh() {
            error!("User store reload failed: {}", e);
        }
        info!("Configuration reloaded from {}", path);
        (ReloadResult::Okay, stop_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_task;
    use once_cell::sync::Lazy;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    // The config handle is process-wide; wire-level tests take turns.
    static SERVER_GUARD: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

    struct Fixture {
        addr: SocketAddr,
        tasks: TaskSender,
        server: tokio::task::JoinHandle<()>,
        _root: tempfile::TempDir,
        _users: tempfile::NamedTempFile,
    }

    async fn start_server(idle_time: i64) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("hello.txt"), b"hello").unwrap();

        let hash = bcrypt::hash("secret", 4).unwrap();
        let users = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            users.path(),
            format!(
                r#"
                [[user]]
                uid = 1
                name = "alice"
                password_hash = "{}"
                group = "staff"
                idle_time = {}
                "#,
                hash, idle_time
            ),
        )
        .unwrap();

        let mut config = crate::config::test_config(root.path().to_str().unwrap());
        config.server.listen_address = "127.0.0.1".to_string();
        config.server.listen_port = 0;
        config.server.users_file = users.path().to_str().unwrap().to_string();
        config.server.pasv_port_min = 30000;
        config.server.pasv_port_max = 60000;
        crate::config::init(config.clone(), "test.conf");

        let store = Arc::new(UserStore::load_from_file(users.path()).unwrap());
        let (tasks, task_rx) = core_task::channel();
        let mut server = Server::bind(&config, store, None, tasks.clone(), task_rx)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let server = tokio::spawn(async move {
            server.run().await.unwrap();
        });
        Fixture {
            addr,
            tasks,
            server,
            _root: root,
            _users: users,
        }
    }

    async fn read_reply(reader: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line.trim_end().to_string()
    }

    /// Reads through a possibly multi-line reply, returning its final line.
    async fn read_full_reply(reader: &mut BufReader<TcpStream>, code: &str) -> String {
        loop {
            let line = read_reply(reader).await;
            if line.starts_with(code) && !line.starts_with(&format!("{}-", code)) {
                return line;
            }
        }
    }

    async fn send(reader: &mut BufReader<TcpStream>, command: &str) {
        reader
            .get_mut()
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .unwrap();
    }

    fn parse_pasv_port(reply: &str) -> u16 {
        let inner = reply.split('(').nth(1).unwrap().split(')').next().unwrap();
        let parts: Vec<u16> = inner.split(',').map(|p| p.parse().unwrap()).collect();
        parts[4] * 256 + parts[5]
    }

    #[tokio::test]
    async fn full_session_login_list_store_retrieve() {
        let _guard = SERVER_GUARD.lock().await;
        let fixture = start_server(-1).await;

        let stream = TcpStream::connect(fixture.addr).await.unwrap();
        let mut control = BufReader::new(stream);

        assert!(read_reply(&mut control).await.starts_with("220 "));

        send(&mut control, "PASS early").await;
        assert!(read_reply(&mut control).await.starts_with("503 "));

        send(&mut control, "USER alice").await;
        assert!(read_reply(&mut control).await.starts_with("331 "));
        send(&mut control, "PASS secret").await;
        assert!(read_reply(&mut control).await.starts_with("230 "));

        // State requirement: a second USER is refused once logged in.
        send(&mut control, "USER alice").await;
        assert!(read_reply(&mut control).await.starts_with("530 Already logged in."));

        send(&mut control, "PWD").await;
        assert!(read_reply(&mut control)
            .await
            .starts_with("257 \"/\" is current directory."));

        send(&mut control, "SYST").await;
        assert_eq!(read_reply(&mut control).await, "215 UNIX Type: L8");

        // FEAT is a multi-line reply closed by a bare-code line.
        send(&mut control, "FEAT").await;
        assert_eq!(read_full_reply(&mut control, "211").await, "211 End.");

        // Listing over a passive data connection.
        send(&mut control, "PASV").await;
        let pasv = read_reply(&mut control).await;
        assert!(pasv.starts_with("227 "));
        let port = parse_pasv_port(&pasv);
        let mut data = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        send(&mut control, "LIST").await;
        assert!(read_reply(&mut control).await.starts_with("150 "));
        let mut listing = Vec::new();
        data.read_to_end(&mut listing).await.unwrap();
        let listing = String::from_utf8(listing).unwrap();
        assert!(listing.starts_with("total "));
        assert!(listing.contains("hello.txt"));
        assert!(read_reply(&mut control).await.starts_with("226 "));

        // Binary upload, then read it back.
        send(&mut control, "TYPE I").await;
        assert!(read_reply(&mut control).await.starts_with("200 "));

        let body = b"\x00\x01binary payload\xff";
        send(&mut control, "PASV").await;
        let port = parse_pasv_port(&read_reply(&mut control).await);
        let mut data = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        send(&mut control, "STOR up.bin").await;
        assert!(read_reply(&mut control).await.starts_with("150 "));
        data.write_all(body).await.unwrap();
        data.shutdown().await.unwrap();
        drop(data);
        assert!(read_reply(&mut control).await.starts_with("226 "));

        send(&mut control, "SIZE up.bin").await;
        assert_eq!(
            read_reply(&mut control).await,
            format!("213 {}", body.len())
        );

        send(&mut control, "PASV").await;
        let port = parse_pasv_port(&read_reply(&mut control).await);
        let mut data = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        send(&mut control, "RETR up.bin").await;
        assert!(read_reply(&mut control).await.starts_with("150 "));
        let mut returned = Vec::new();
        data.read_to_end(&mut returned).await.unwrap();
        assert_eq!(returned, body);
        assert!(read_reply(&mut control).await.starts_with("226 "));

        // Unknown verbs and bad arity.
        send(&mut control, "BOGUS").await;
        assert!(read_reply(&mut control).await.starts_with("500 "));
        send(&mut control, "TYPE").await;
        assert!(read_reply(&mut control).await.starts_with("501 Syntax:"));

        send(&mut control, "QUIT").await;
        assert!(read_reply(&mut control).await.starts_with("221 "));

        fixture.tasks.push(Task::Exit);
        fixture.server.await.unwrap();
    }

    #[tokio::test]
    async fn idle_timeout_closes_with_421() {
        let _guard = SERVER_GUARD.lock().await;
        let fixture = start_server(1).await;

        let stream = TcpStream::connect(fixture.addr).await.unwrap();
        let mut control = BufReader::new(stream);
        assert!(read_reply(&mut control).await.starts_with("220 "));
        send(&mut control, "USER alice").await;
        assert!(read_reply(&mut control).await.starts_with("331 "));
        send(&mut control, "PASS secret").await;
        assert!(read_reply(&mut control).await.starts_with("230 "));

        // No commands for over the 1-second idle budget.
        let line = read_reply(&mut control).await;
        assert_eq!(line, "421 Idle timeout exceeded, closing connection.");
        let mut rest = String::new();
        control.read_line(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        fixture.tasks.push(Task::Exit);
        fixture.server.await.unwrap();
    }

    #[tokio::test]
    async fn kick_task_interrupts_session() {
        let _guard = SERVER_GUARD.lock().await;
        let fixture = start_server(-1).await;

        let stream = TcpStream::connect(fixture.addr).await.unwrap();
        let mut control = BufReader::new(stream);
        assert!(read_reply(&mut control).await.starts_with("220 "));
        send(&mut control, "USER alice").await;
        read_reply(&mut control).await;
        send(&mut control, "PASS secret").await;
        assert!(read_reply(&mut control).await.starts_with("230 "));

        let online = fixture.tasks.get_online_users().await;
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].name, "alice");

        let kicked = fixture.tasks.kick_user(1, false).await;
        assert_eq!(kicked, 1);

        // The connection drops without a reply.
        let mut rest = String::new();
        control.read_line(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        // Kicking again finds nothing.
        assert_eq!(fixture.tasks.kick_user(1, false).await, 0);

        fixture.tasks.push(Task::Exit);
        fixture.server.await.unwrap();
    }

    #[tokio::test]
    async fn wrong_password_repeatedly_ends_the_session() {
        let _guard = SERVER_GUARD.lock().await;
        let fixture = start_server(-1).await;

        let stream = TcpStream::connect(fixture.addr).await.unwrap();
        let mut control = BufReader::new(stream);
        assert!(read_reply(&mut control).await.starts_with("220 "));
        send(&mut control, "USER alice").await;
        assert!(read_reply(&mut control).await.starts_with("331 "));

        for _ in 0..crate::constants::MAX_PASSWORD_ATTEMPTS {
            send(&mut control, "PASS wrong").await;
            assert!(read_reply(&mut control).await.starts_with("530 "));
        }
        // The attempt cap terminated the session.
        let mut rest = String::new();
        control.read_line(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        fixture.tasks.push(Task::Exit);
        fixture.server.await.unwrap();
    }
}
