//! Cross-session messages delivered to the server's main loop.
//!
//! Tasks are enqueued from any task context and drained serially by the
//! supervisor. A task that produces a value carries a one-shot reply channel
//! its sender awaits; enqueueing itself never blocks.

use crate::core_acl::user::UserId;
use crate::core_session::session::SessionId;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Snapshot of one online session, produced by `GetOnlineUsers`.
#[derive(Debug, Clone)]
pub struct WhoUser {
    pub uid: UserId,
    pub name: String,
    pub ident: String,
    pub hostname: String,
    pub state: &'static str,
    pub current_command: Option<String>,
    pub idle: Duration,
}

/// Result of the login counter's replace-oldest path.
#[derive(Debug, Clone, Default)]
pub struct LoginKickResult {
    pub kicked: bool,
    pub idle: Duration,
    pub logins: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadResult {
    Okay,
    Fail,
    /// The new config cannot apply in place; a full stop/start is required.
    StopStart,
}

pub enum Task {
    /// Interrupts all sessions of `uid`, or only the longest-idle one.
    /// Replies with the number of sessions kicked.
    KickUser {
        uid: UserId,
        one_only: bool,
        reply: oneshot::Sender<usize>,
    },
    /// Kick variant used by login admission: evicts the oldest session and
    /// reports its idle time plus the live login count.
    LoginKickUser {
        uid: UserId,
        reply: oneshot::Sender<LoginKickResult>,
    },
    GetOnlineUsers {
        reply: oneshot::Sender<Vec<WhoUser>>,
    },
    /// Re-parses the config file. Replies with the in-place reload status
    /// and whether a stop/start is required.
    ReloadConfig {
        reply: oneshot::Sender<(ReloadResult, ReloadResult)>,
    },
    /// Marks every session of `uid` dirty; each reloads its user record at
    /// its next command boundary.
    UserUpdate { uid: UserId },
    /// A session finished; the supervisor joins and drops it.
    ClientFinished { id: SessionId },
    /// Stop accepting and interrupt every session.
    Exit,
}

#[derive(Clone)]
pub struct TaskSender {
    tx: mpsc::UnboundedSender<Task>,
}

pub fn channel() -> (TaskSender, mpsc::UnboundedReceiver<Task>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskSender { tx }, rx)
}

impl TaskSender {
    /// Enqueues without waiting. A send after server shutdown is discarded.
    pub fn push(&self, task: Task) {
        let _ = self.tx.send(task);
    }

    pub async fn kick_user(&self, uid: UserId, one_only: bool) -> usize {
        let (reply, rx) = oneshot::channel();
        self.push(Task::KickUser { uid, one_only, reply });
        rx.await.unwrap_or(0)
    }

    pub async fn login_kick_user(&self, uid: UserId) -> LoginKickResult {
        let (reply, rx) = oneshot::channel();
        self.push(Task::LoginKickUser { uid, reply });
        rx.await.unwrap_or_default()
    }

    pub async fn get_online_users(&self) -> Vec<WhoUser> {
        let (reply, rx) = oneshot::channel();
        self.push(Task::GetOnlineUsers { reply });
        rx.await.unwrap_or_default()
    }

    pub async fn reload_config(&self) -> (ReloadResult, ReloadResult) {
        let (reply, rx) = oneshot::channel();
        self.push(Task::ReloadConfig { reply });
        rx.await.unwrap_or((ReloadResult::Fail, ReloadResult::Fail))
    }
}
