//! Session state around layout passes.
//!
//! Layout runs are asynchronous from the caller's point of view: a new
//! pass can start while an old one is still computing. The session
//! hands out a token per pass and ignores completions whose token is
//! no longer current, so a slow early pass can never overwrite the
//! result of a later one.

use crate::attach::DiagramView;
use crate::error::{LayoutError, Result};

/// Token identifying one layout pass. Only the most recently issued
/// token can commit a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutPass(u64);

/// What the canvas should currently show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagramState {
    pub view: DiagramView,
    pub is_loading: bool,
    pub error: Option<LayoutError>,
}

/// Owns the current view and serializes pass completions against it.
#[derive(Debug, Default)]
pub struct DiagramSession {
    generation: u64,
    pub state: DiagramState,
}

impl DiagramSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new pass: flags the session as loading and invalidates
    /// every token issued before.
    pub fn begin_pass(&mut self) -> LayoutPass {
        self.generation += 1;
        self.state.is_loading = true;
        LayoutPass(self.generation)
    }

    /// Commit the outcome of a pass. Stale tokens are discarded and
    /// leave the state untouched; the caller learns via the return
    /// value whether the commit happened.
    ///
    /// A failed pass clears the view rather than keeping the previous
    /// one next to an error banner.
    pub fn complete_pass(&mut self, pass: LayoutPass, outcome: Result<DiagramView>) -> bool {
        if pass.0 != self.generation {
            return false;
        }
        self.state.is_loading = false;
        match outcome {
            Ok(view) => {
                self.state.view = view;
                self.state.error = None;
            }
            Err(err) => {
                self.state.view = DiagramView::default();
                self.state.error = Some(err);
            }
        }
        true
    }

    /// Rename an edge label in place. Whitespace-only text clears the
    /// label. Returns whether the edge exists in the current view.
    pub fn set_edge_label(&mut self, edge_id: &str, text: &str) -> bool {
        let Some(edge) = self.state.view.edges.iter_mut().find(|e| e.id == edge_id) else {
            return false;
        };
        let trimmed = text.trim();
        edge.label = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        true
    }
}
