//! Shared per-session state observable from the supervisor.

use crate::core_acl::user::{User, UserId};
use crate::core_counter::Counter;
use crate::core_log;
use crate::core_network::interrupt::Interrupter;
use crate::core_task::WhoUser;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

pub type SessionId = u64;

/// Per-client protocol state. `Finished` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    LoggedOut = 0,
    WaitingPassword = 1,
    LoggedIn = 2,
    Finished = 3,
}

impl ClientState {
    fn from_u8(value: u8) -> ClientState {
        match value {
            0 => ClientState::LoggedOut,
            1 => ClientState::WaitingPassword,
            2 => ClientState::LoggedIn,
            _ => ClientState::Finished,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ClientState::LoggedOut => "logged out",
            ClientState::WaitingPassword => "waiting password",
            ClientState::LoggedIn => "logged in",
            ClientState::Finished => "finished",
        }
    }
}

/// State a command requires before its handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredState {
    LoggedOut,
    WaitingPassword,
    LoggedIn,
    AnyState,
    /// Any state, but only once the control channel is TLS-wrapped.
    NotBeforeAuth,
}

#[derive(Debug)]
pub struct SessionInfo {
    pub user: Option<User>,
    pub ip: String,
    pub hostname: String,
    pub ident: String,
    pub idle_since: Instant,
    pub idle_expires: Option<Instant>,
    pub current_command: Option<String>,
    pub logged_in_at: Option<DateTime<Local>>,
}

/// The fields of a session other tasks may observe or poke.
///
/// Mutable fields sit behind one session-level mutex; the state and
/// dirty-user bits are atomics so the hot path reads them lock-free.
pub struct SessionShared {
    id: SessionId,
    state: AtomicU8,
    user_updated: AtomicBool,
    interrupter: Interrupter,
    info: Mutex<SessionInfo>,
}

impl SessionShared {
    pub fn new(id: SessionId, ip: String) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: AtomicU8::new(ClientState::LoggedOut as u8),
            user_updated: AtomicBool::new(false),
            interrupter: Interrupter::new(),
            info: Mutex::new(SessionInfo {
                user: None,
                hostname: String::new(),
                ip,
                ident: "*".to_string(),
                idle_since: Instant::now(),
                idle_expires: None,
                current_command: None,
                logged_in_at: None,
            }),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn interrupter(&self) -> &Interrupter {
        &self.interrupter
    }

    fn info(&self) -> MutexGuard<'_, SessionInfo> {
        self.info.lock().expect("session lock poisoned")
    }

    /// Transition to `LoggedOut` or `Finished`. The authenticated states
    /// have their own setters. Leaving `LoggedIn` releases the login slot
    /// and emits the LOGOUT event exactly once; `Finished` is absorbing.
    pub fn set_state(&self, new: ClientState) {
        debug_assert!(matches!(
            new,
            ClientState::LoggedOut | ClientState::Finished
        ));
        let logout;
        {
            let mut info = self.info();
            let previous = self.state();
            if previous == ClientState::Finished {
                return;
            }
            self.state.store(new as u8, Ordering::SeqCst);
            logout = if previous == ClientState::LoggedIn {
                info.user.take().map(|user| {
                    (
                        user.uid,
                        user.name.clone(),
                        user.group.clone(),
                        user.tagline.clone(),
                        format!("{}@{}", info.ident, info.hostname),
                        info.ip.clone(),
                    )
                })
            } else {
                info.user = None;
                None
            };
        }
        if let Some((uid, name, group, tagline, ident_address, ip)) = logout {
            Counter::login().stop(uid);
            core_log::event(
                "LOGOUT",
                &[
                    ("ident_address", ident_address.as_str()),
                    ("ip", ip.as_str()),
                    ("user", name.as_str()),
                    ("group", group.as_str()),
                    ("tagline", tagline.as_str()),
                ],
            );
        }
    }

    /// USER accepted: bind the record and await PASS. Takes ownership of
    /// the record; reloads replace it wholesale.
    pub fn set_waiting_password(&self, user: User) {
        let mut info = self.info();
        if self.state() == ClientState::Finished {
            return;
        }
        self.state
            .store(ClientState::WaitingPassword as u8, Ordering::SeqCst);
        info.user = Some(user);
    }

    /// PASS accepted and the login counter said yes.
    pub fn set_logged_in(&self) {
        let mut info = self.info();
        if self.state() == ClientState::Finished {
            return;
        }
        self.state
            .store(ClientState::LoggedIn as u8, Ordering::SeqCst);
        info.logged_in_at = Some(Local::now());
    }

    /// External cancellation: flip to `Finished` and unblock every pending
    /// socket operation. One-shot and idempotent.
    pub fn interrupt(&self) {
        self.set_state(ClientState::Finished);
        self.interrupter.interrupt();
    }

    pub fn uid(&self) -> Option<UserId> {
        self.info().user.as_ref().map(|u| u.uid)
    }

    pub fn user(&self) -> Option<User> {
        self.info().user.clone()
    }

    pub fn replace_user(&self, user: User) {
        self.info().user = Some(user);
    }

    pub fn mark_user_updated(&self) {
        self.user_updated.store(true, Ordering::SeqCst);
    }

    pub fn take_user_updated(&self) -> bool {
        self.user_updated.swap(false, Ordering::SeqCst)
    }

    pub fn ip(&self) -> String {
        self.info().ip.clone()
    }

    pub fn hostname(&self) -> String {
        self.info().hostname.clone()
    }

    pub fn set_hostname(&self, hostname: String) {
        self.info().hostname = hostname;
    }

    pub fn ident(&self) -> String {
        self.info().ident.clone()
    }

    pub fn set_ident(&self, ident: String) {
        self.info().ident = ident;
    }

    /// Applies a bouncer's IDNT triple. When the bouncer saw no hostname it
    /// repeats the IP; keep the reverse-resolved name in that case.
    pub fn idnt_update(&self, ident: String, ip: String, hostname: String) {
        let mut info = self.info();
        info.ident = ident;
        if ip != hostname {
            info.hostname = hostname;
        }
        info.ip = ip;
    }

    /// `hostname(ip)`, or just the hostname when both are equal.
    pub fn hostname_and_ip(&self) -> String {
        let info = self.info();
        if info.hostname.is_empty() || info.hostname == info.ip {
            info.ip.clone()
        } else {
            format!("{}({})", info.hostname, info.ip)
        }
    }

    pub fn logged_in_at(&self) -> Option<DateTime<Local>> {
        self.info().logged_in_at
    }

    pub fn set_current_command(&self, command: Option<String>) {
        self.info().current_command = command;
    }

    pub fn idle_duration(&self) -> Duration {
        self.info().idle_since.elapsed()
    }

    pub fn idle_expires(&self) -> Option<Instant> {
        self.info().idle_expires
    }

    pub fn reset_idle(&self, timeout: Option<Duration>) {
        let mut info = self.info();
        let now = Instant::now();
        info.idle_since = now;
        info.idle_expires = timeout.map(|t| now + t);
    }

    pub fn who_snapshot(&self) -> Option<WhoUser> {
        let info = self.info();
        info.user.as_ref().map(|user| WhoUser {
            uid: user.uid,
            name: user.name.clone(),
            ident: info.ident.clone(),
            hostname: if info.hostname.is_empty() {
                info.ip.clone()
            } else {
                info.hostname.clone()
            },
            state: self.state().name(),
            current_command: info.current_command.clone(),
            idle: info.idle_since.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_acl::user::test_user;

    #[test]
    fn finished_is_absorbing() {
        let shared = SessionShared::new(1, "127.0.0.1".to_string());
        shared.set_state(ClientState::Finished);
        shared.set_waiting_password(test_user(1, "alice", "pw"));
        assert_eq!(shared.state(), ClientState::Finished);
        shared.set_logged_in();
        assert_eq!(shared.state(), ClientState::Finished);
        shared.set_state(ClientState::LoggedOut);
        assert_eq!(shared.state(), ClientState::Finished);
    }

    #[test]
    fn authenticated_states_bind_a_user() {
        let shared = SessionShared::new(1, "127.0.0.1".to_string());
        assert!(shared.uid().is_none());
        shared.set_waiting_password(test_user(7, "alice", "pw"));
        assert_eq!(shared.state(), ClientState::WaitingPassword);
        assert_eq!(shared.uid(), Some(7));
        shared.set_state(ClientState::LoggedOut);
        assert!(shared.uid().is_none());
    }

    #[test]
    fn finishing_a_login_releases_the_counter_once() {
        let shared = SessionShared::new(1, "127.0.0.1".to_string());
        shared.set_waiting_password(test_user(91, "alice", "pw"));
        assert_eq!(
            Counter::login().start(91, 0, false, false, 0),
            crate::core_counter::CounterResult::Okay
        );
        shared.set_logged_in();
        let before = Counter::login().logins_for(91);
        shared.set_state(ClientState::Finished);
        assert_eq!(Counter::login().logins_for(91), before - 1);
        // Absorbing: a second transition must not release again.
        shared.set_state(ClientState::Finished);
        assert_eq!(Counter::login().logins_for(91), before - 1);
        assert!(shared.uid().is_none());
    }

    #[test]
    fn idnt_update_keeps_resolved_hostname_when_bouncer_repeats_ip() {
        let shared = SessionShared::new(1, "10.0.0.1".to_string());
        shared.set_hostname("resolved.example".to_string());
        shared.idnt_update(
            "joe".to_string(),
            "10.9.9.9".to_string(),
            "10.9.9.9".to_string(),
        );
        assert_eq!(shared.ident(), "joe");
        assert_eq!(shared.ip(), "10.9.9.9");
        assert_eq!(shared.hostname(), "resolved.example");
        assert_eq!(shared.hostname_and_ip(), "resolved.example(10.9.9.9)");
    }

    #[test]
    fn interrupt_is_idempotent_and_terminal() {
        let shared = SessionShared::new(1, "127.0.0.1".to_string());
        shared.interrupt();
        shared.interrupt();
        assert_eq!(shared.state(), ClientState::Finished);
        assert!(shared.interrupter().is_interrupted());
    }
}
