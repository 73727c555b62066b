//! Browser driver seam
//!
//! Everything the harness knows about the application under test goes
//! through [`Driver`]. The harness only ever reads [`PageSnapshot`]s and
//! asks the driver to act on a [`NodeId`] taken from one of them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::action::Action;
use crate::dom::{Document, NodeId, Viewport};
use crate::error::HarnessResult;

/// Document readiness, as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    Loading,
    Complete,
}

/// Point-in-time view of the session used for selector resolution
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: Option<Url>,
    pub ready: ReadyState,
    pub document: Document,
    pub focused: Option<NodeId>,
    pub viewport: Viewport,
}

impl PageSnapshot {
    /// Blank page before any navigation
    pub fn blank(viewport: Viewport) -> Self {
        Self {
            url: None,
            ready: ReadyState::Complete,
            document: Document::new(),
            focused: None,
            viewport,
        }
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.document.is_visible(id, &self.viewport)
    }

    pub fn has_focus(&self, id: NodeId) -> bool {
        self.focused == Some(id) && self.document.is_attached(id)
    }
}

/// One isolated browsing session
#[async_trait]
pub trait Driver: Send {
    /// Start loading `url`, resetting focus and all per-page state.
    /// Returns once the request was accepted, not when the page is ready.
    async fn navigate(&mut self, url: &Url) -> HarnessResult<()>;

    async fn set_viewport(&mut self, viewport: Viewport) -> HarnessResult<()>;

    async fn snapshot(&mut self) -> HarnessResult<PageSnapshot>;

    /// Perform `action` on `target`. Fails if the node is no longer attached.
    async fn perform(&mut self, target: NodeId, action: &Action) -> HarnessResult<()>;
}

/// Opens fresh, independent sessions
pub trait DriverFactory: Send + Sync {
    type Session: Driver;

    fn open(&self, viewport: Viewport) -> HarnessResult<Self::Session>;
}
