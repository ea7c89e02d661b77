//! DevTools session lifecycle over a shared connection.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tabwire_protocol::{CdpError, Command, Event, SessionId, TargetId, TargetInfo};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::versions::Domains;

/// Default deadline for commands sent through a session.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a [`DevTools`] session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Detached,
    Attaching,
    Attached {
        session_id: SessionId,
        target_id: TargetId,
    },
}

/// One attachment to a page target on a [`Connection`].
///
/// The session can be created, detached and created again any number of
/// times; the connection outlives it.
pub struct DevTools {
    connection: Arc<Connection>,
    domains: Arc<dyn Domains>,
    state: Mutex<SessionState>,
    command_timeout: Duration,
}

impl DevTools {
    pub fn new(connection: Arc<Connection>, domains: Arc<dyn Domains>) -> Self {
        Self {
            connection,
            domains,
            state: Mutex::new(SessionState::Detached),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn domains(&self) -> &Arc<dyn Domains> {
        &self.domains
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match &*self.state.lock() {
            SessionState::Attached { session_id, .. } => Some(session_id.clone()),
            _ => None,
        }
    }

    pub fn target_id(&self) -> Option<TargetId> {
        match &*self.state.lock() {
            SessionState::Attached { target_id, .. } => Some(target_id.clone()),
            _ => None,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(*self.state.lock(), SessionState::Attached { .. })
    }

    /// Attach to a page target and prepare the new session.
    ///
    /// A page whose id appears in `target_hint` is preferred; otherwise the
    /// first page wins. Returns the new session id.
    pub async fn create_session(&self, target_hint: Option<&str>) -> Result<SessionId, CdpError> {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Detached {
                return Err(CdpError::AlreadyAttached);
            }
            *state = SessionState::Attaching;
        }

        let (session_id, target_id) = match self.attach(target_hint).await {
            Ok(attached) => attached,
            Err(e) => {
                *self.state.lock() = SessionState::Detached;
                return Err(e);
            }
        };

        *self.state.lock() = SessionState::Attached {
            session_id: session_id.clone(),
            target_id: target_id.clone(),
        };
        info!("Attached session {} to target {}", session_id, target_id);

        self.prepare(&session_id).await?;
        Ok(session_id)
    }

    async fn attach(&self, target_hint: Option<&str>) -> Result<(SessionId, TargetId), CdpError> {
        if self.connection.is_closed() {
            debug!("Reopening closed connection to {}", self.connection.url());
            self.connection.reopen().await?;
        }

        let target = self.domains.target();
        let targets = self
            .connection
            .send_and_wait(None, &target.get_targets(), self.command_timeout)
            .await?;
        let target_id = select_target(&targets, target_hint)
            .ok_or(CdpError::NoTargetFound)?
            .target_id
            .clone();

        // attached as a child of the root session only
        let session_id = self
            .connection
            .send_and_wait(None, &target.attach_to_target(&target_id), self.command_timeout)
            .await?;
        Ok((session_id, target_id))
    }

    async fn prepare(&self, session_id: &SessionId) -> Result<(), CdpError> {
        let auto_attach = self.domains.target().set_auto_attach();
        let clear_log = self.domains.log().clear();

        let (auto_attach, clear_log) = tokio::join!(
            self.connection
                .send_and_wait(Some(session_id), &auto_attach, self.command_timeout),
            self.connection
                .send_and_wait(Some(session_id), &clear_log, self.command_timeout),
        );

        if let Err(e) = clear_log {
            warn!("Log.clear failed on session {}: {}", session_id, e);
        }
        auto_attach
    }

    /// Send a command on the attached session with the default deadline.
    pub async fn send<T: Send + 'static>(&self, command: &Command<T>) -> Result<T, CdpError> {
        self.send_with_timeout(command, self.command_timeout).await
    }

    /// Send a command on the attached session.
    ///
    /// Browser-scoped commands may be sent without a session.
    pub async fn send_with_timeout<T: Send + 'static>(
        &self,
        command: &Command<T>,
        timeout: Duration,
    ) -> Result<T, CdpError> {
        let session_id = self.session_id();
        if session_id.is_none() && command.is_target_scoped() {
            return Err(CdpError::NotAttached);
        }
        self.connection
            .send_and_wait(session_id.as_ref(), command, timeout)
            .await
    }

    pub fn add_listener<T, F>(&self, event: &Event<T>, callback: F)
    where
        T: 'static,
        F: Fn(u64, T) + Send + Sync + 'static,
    {
        self.connection.add_listener(event, callback);
    }

    pub fn listen<T: Send + 'static>(&self, event: &Event<T>) -> mpsc::UnboundedReceiver<(u64, T)> {
        self.connection.listen(event)
    }

    /// Drop every listener and mark all domains disabled.
    pub fn clear_listeners(&self) {
        self.connection.clear_listeners();
        self.domains.disable_all();
    }

    /// Detach from the current target.
    ///
    /// Only an attached session is detached. While an attach is in flight the
    /// state is left alone and the caller should wait for `create_session`.
    pub async fn disconnect_session(&self) {
        let session_id = {
            let mut state = self.state.lock();
            let session_id = match &*state {
                SessionState::Attached { session_id, .. } => session_id.clone(),
                SessionState::Attaching => {
                    debug!("Attach in progress, nothing to detach yet");
                    return;
                }
                SessionState::Detached => return,
            };
            *state = SessionState::Detached;
            session_id
        };

        let detach = self.domains.target().detach_from_target(&session_id);
        match self
            .connection
            .send_and_wait(None, &detach, self.command_timeout)
            .await
        {
            Ok(()) => info!("Detached session {}", session_id),
            Err(e) => warn!("Failed to detach session {}: {}", session_id, e),
        }
    }

    pub async fn close(&self) {
        self.disconnect_session().await;
        self.connection.close().await;
    }
}

/// Page named by `hint`, else the first page.
///
/// A page whose id is the hint, or its last path segment, wins over one whose
/// id merely appears somewhere in it.
pub(crate) fn select_target<'a>(targets: &'a [TargetInfo], hint: Option<&str>) -> Option<&'a TargetInfo> {
    let mut pages = targets
        .iter()
        .filter(|target| target.is_page() && !target.target_id.as_str().is_empty());

    let hinted = hint.and_then(|hint| {
        let segment = hint.rsplit('/').next().unwrap_or(hint);
        pages
            .clone()
            .find(|target| target.target_id.as_str() == segment)
            .or_else(|| pages.find(|target| hint.contains(target.target_id.as_str())))
    });
    hinted.or_else(|| targets.iter().find(|target| target.is_page()))
}
