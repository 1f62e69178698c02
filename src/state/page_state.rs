/// Page state definitions for tracking mirror progress
///
/// This module defines all possible states a page can be in during a run.
use std::fmt;

/// Represents the current state of a page in the mirror run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// Page is queued and waiting to be rendered
    Scheduled,

    /// Page is being loaded in the browser
    Rendering,

    /// Rendered DOM is being cleaned and localized
    Rewriting,

    // ===== Terminal States =====
    /// Page was written to its local path
    Exported,

    /// Page could not be rendered or written
    Failed,

    /// Link pointed outside the mirrored site; never entered into the
    /// processed set
    SkippedOutOfDomain,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exported | Self::Failed | Self::SkippedOutOfDomain)
    }

    /// Returns true if this is an active state (page may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exported)
    }

    /// Returns true if the state may follow `self`
    ///
    /// Allowed transitions:
    /// - `Scheduled -> Rendering`
    /// - `Rendering -> Rewriting`
    /// - `Rewriting -> Exported`
    /// - any active state `-> Failed`
    pub fn can_transition_to(&self, next: PageState) -> bool {
        match (self, next) {
            (Self::Scheduled, Self::Rendering) => true,
            (Self::Rendering, Self::Rewriting) => true,
            (Self::Rewriting, Self::Exported) => true,
            (from, Self::Failed) => from.is_active(),
            _ => false,
        }
    }

    /// Short lowercase label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Rendering => "rendering",
            Self::Rewriting => "rewriting",
            Self::Exported => "exported",
            Self::Failed => "failed",
            Self::SkippedOutOfDomain => "skipped_out_of_domain",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
