//! Protocol domains the session layer depends on.
//!
//! Each schema generation supplies its own [`Domains`]. Only the handful of
//! Target and Log calls needed to attach, detach and prepare a session are
//! modelled here.

use serde_json::{json, Value};
use tabwire_protocol::{CdpError, Command, Event, SessionId, TargetId, TargetInfo};
use tracing::trace;

/// Target domain: discovery and attachment.
pub trait TargetDomain: Send + Sync {
    fn get_targets(&self) -> Command<Vec<TargetInfo>>;

    /// Attach as a child of the root session and return the new session id.
    fn attach_to_target(&self, target_id: &TargetId) -> Command<SessionId>;

    fn detach_from_target(&self, session_id: &SessionId) -> Command<()>;

    fn set_auto_attach(&self) -> Command<()>;

    fn detached_from_target(&self) -> Event<SessionId>;
}

/// Log domain.
pub trait LogDomain: Send + Sync {
    fn clear(&self) -> Command<()>;
}

/// Protocol surface of one schema generation.
pub trait Domains: Send + Sync {
    fn target(&self) -> &dyn TargetDomain;

    fn log(&self) -> &dyn LogDomain;

    /// Forget which domains were enabled; called when listeners are cleared.
    fn disable_all(&self);
}

fn session_id_field(method: &'static str) -> impl Fn(Value) -> Result<SessionId, CdpError> {
    move |value: Value| {
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(SessionId::new)
            .ok_or_else(|| CdpError::InvalidResponse(format!("{}: missing sessionId", method)))
    }
}

/// Target and Log commands whose shape has been stable across every shipped
/// schema generation.
#[derive(Debug, Clone, Copy)]
pub struct StableDomains {
    major_version: u32,
}

impl StableDomains {
    pub fn new(major_version: u32) -> Self {
        Self { major_version }
    }

    pub fn major_version(&self) -> u32 {
        self.major_version
    }
}

impl TargetDomain for StableDomains {
    fn get_targets(&self) -> Command<Vec<TargetInfo>> {
        Command::with_decoder("Target.getTargets", json!({}), |value: Value| {
            let infos = value
                .get("targetInfos")
                .cloned()
                .ok_or_else(|| CdpError::InvalidResponse("Target.getTargets: missing targetInfos".to_string()))?;
            Ok(serde_json::from_value(infos)?)
        })
        .browser_scoped()
    }

    fn attach_to_target(&self, target_id: &TargetId) -> Command<SessionId> {
        Command::with_decoder(
            "Target.attachToTarget",
            json!({"targetId": target_id, "flatten": true}),
            session_id_field("Target.attachToTarget"),
        )
        .browser_scoped()
    }

    fn detach_from_target(&self, session_id: &SessionId) -> Command<()> {
        Command::void("Target.detachFromTarget", json!({"sessionId": session_id})).browser_scoped()
    }

    fn set_auto_attach(&self) -> Command<()> {
        Command::void(
            "Target.setAutoAttach",
            json!({"autoAttach": true, "waitForDebuggerOnStart": false, "flatten": true}),
        )
    }

    fn detached_from_target(&self) -> Event<SessionId> {
        Event::with_decoder(
            "Target.detachedFromTarget",
            session_id_field("Target.detachedFromTarget"),
        )
    }
}

impl LogDomain for StableDomains {
    fn clear(&self) -> Command<()> {
        Command::void("Log.clear", json!({}))
    }
}

impl Domains for StableDomains {
    fn target(&self) -> &dyn TargetDomain {
        self
    }

    fn log(&self) -> &dyn LogDomain {
        self
    }

    fn disable_all(&self) {
        // nothing is enabled at this level; typed domain layers track their own state
        trace!("Domains for v{} marked disabled", self.major_version);
    }
}
