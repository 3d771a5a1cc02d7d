//! Per-session state
//!
//! Element handles carry the [`SessionId`] of the session that located them.
//! Everything the engine needs to know about that session (DPR at start,
//! automation context, calibrated device rectangles) is looked up here
//! rather than by walking from the element to its owner.
//!
//! The registry is shared between tasks capturing different sessions. The
//! lock is only ever held for a map operation, never across an await.

use std::{collections::HashMap, future::Future};

use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{CaptureError, CaptureResult},
    model::{DeviceRectangles, ElementHandle, SessionId},
    options::PlatformFlags,
};

/// Where automation commands are sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutomationContext {
    /// The native UI tree of the app
    NativeApp,
    /// A web view or browser tab
    #[default]
    Webview,
}

/// What the engine remembers about one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Device pixel ratio reported when the session started
    pub initial_dpr:       f64,
    pub context:           AutomationContext,
    /// Cached chrome rectangles for the current context
    pub device_rectangles: Option<DeviceRectangles>,
}

impl SessionState {
    pub fn new(initial_dpr: f64, context: AutomationContext) -> Self {
        Self {
            initial_dpr,
            context,
            device_rectangles: None,
        }
    }

    /// Marks `platform` as native or web view according to the session context
    pub fn platform_flags(&self, mut platform: PlatformFlags) -> PlatformFlags {
        platform.is_native_context = self.context == AutomationContext::NativeApp;
        platform
    }
}

/// Session id -> state arena
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionState>>,
}

fn unknown_session(id: &SessionId) -> CaptureError {
    CaptureError::InvalidParameter {
        parameter: "session".to_string(),
        reason:    format!("session '{id}' is not registered"),
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, replacing any previous state under the same id
    pub fn register(&self, id: SessionId, state: SessionState) {
        info!(session = %id, context = ?state.context, "Registered session");
        self.sessions.write().insert(id, state);
    }

    pub fn remove(&self, id: &SessionId) -> Option<SessionState> {
        self.sessions.write().remove(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionState> {
        self.sessions.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Looks up the session that owns an element
    pub fn session_for(&self, element: &ElementHandle) -> CaptureResult<SessionState> {
        self.get(&element.session)
            .ok_or_else(|| unknown_session(&element.session))
    }

    pub fn initial_dpr(&self, id: &SessionId) -> CaptureResult<f64> {
        self.sessions
            .read()
            .get(id)
            .map(|state| state.initial_dpr)
            .ok_or_else(|| unknown_session(id))
    }

    /// Switches the automation context
    ///
    /// Cached device rectangles describe one context only, so they are
    /// dropped when the context actually changes. Returns whether it did.
    pub fn switch_context(&self, id: &SessionId, context: AutomationContext) -> CaptureResult<bool> {
        let mut sessions = self.sessions.write();
        let state = sessions.get_mut(id).ok_or_else(|| unknown_session(id))?;
        if state.context == context {
            return Ok(false);
        }

        debug!(session = %id, from = ?state.context, to = ?context, "Switching context");
        state.context = context;
        state.device_rectangles = None;
        Ok(true)
    }

    pub fn cached_device_rectangles(&self, id: &SessionId) -> Option<DeviceRectangles> {
        self.sessions
            .read()
            .get(id)
            .and_then(|state| state.device_rectangles)
    }

    pub fn store_device_rectangles(&self, id: &SessionId, rectangles: DeviceRectangles) -> CaptureResult<()> {
        let mut sessions = self.sessions.write();
        let state = sessions.get_mut(id).ok_or_else(|| unknown_session(id))?;
        state.device_rectangles = Some(rectangles);
        Ok(())
    }

    /// Returns the cached device rectangles, computing them on a miss
    ///
    /// `compute` runs without the lock held. Its result is only cached when
    /// the context did not change while it ran.
    pub async fn device_rectangles<F, Fut>(&self, id: &SessionId, compute: F) -> CaptureResult<DeviceRectangles>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CaptureResult<DeviceRectangles>>,
    {
        let context = {
            let sessions = self.sessions.read();
            let state = sessions.get(id).ok_or_else(|| unknown_session(id))?;
            if let Some(rectangles) = state.device_rectangles {
                return Ok(rectangles);
            }
            state.context
        };

        let rectangles = compute().await?;

        let mut sessions = self.sessions.write();
        if let Some(state) = sessions.get_mut(id) {
            if state.context == context {
                state.device_rectangles = Some(rectangles);
            }
        }
        Ok(rectangles)
    }
}
