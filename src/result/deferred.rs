//! Deferred, target-SDK gated errors
//!
//! Some manifest problems were historically tolerated. They are recorded while
//! walking the document and resolved once the package's own target SDK is known.

use super::{ErrorCode, ParseError, ParseResult};
use tracing::debug;

/// Conditions whose fatality depends on the declared target SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredKind {
    /// Neither `<application>` nor `<instrumentation>` present
    MissingAppTag,
    /// An intent filter action or category with an empty name
    EmptyIntentActionCategory,
    /// Base resource table stored compressed or unaligned
    ResourcesArscCompressed,
    /// Component with intent filters but no explicit `exported`
    MissingExportedFlag,
}

impl DeferredKind {
    /// Highest target SDK for which the condition is still tolerated
    pub fn threshold(self) -> i32 {
        match self {
            DeferredKind::MissingAppTag => 29,
            DeferredKind::EmptyIntentActionCategory => 29,
            DeferredKind::ResourcesArscCompressed => 29,
            DeferredKind::MissingExportedFlag => 30,
        }
    }

    pub fn code(self) -> ErrorCode {
        match self {
            DeferredKind::ResourcesArscCompressed => ErrorCode::ResourcesArscCompressed,
            _ => ErrorCode::ManifestMalformed,
        }
    }

    fn is_fatal_for(self, target_sdk: i32) -> bool {
        target_sdk > self.threshold()
    }
}

#[derive(Debug)]
struct Pending {
    kind: DeferredKind,
    message: Option<String>,
}

/// Per-invocation diagnostics channel
///
/// One instance belongs to exactly one parse call; it is never shared between
/// concurrent parses.
#[derive(Debug, Default)]
pub struct ParseInput {
    target_sdk: Option<i32>,
    pending: Vec<Pending>,
}

impl ParseInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target SDK the deferred errors were resolved against, once known
    pub fn target_sdk(&self) -> Option<i32> {
        self.target_sdk
    }

    /// Record a deferred condition, failing right away if the target SDK is
    /// already known and makes it fatal
    pub fn defer_error(&mut self, kind: DeferredKind, message: impl Into<String>) -> ParseResult<()> {
        if let Some(pending) = self.pending.iter().find(|p| p.kind == kind) {
            if self.target_sdk.is_some() || pending.message.is_some() {
                // Already accepted, or first occurrence already recorded
                return Ok(());
            }
        }

        match self.target_sdk {
            Some(target) if kind.is_fatal_for(target) => {
                Err(ParseError::new(kind.code(), message))
            }
            Some(target) => {
                debug!("Tolerating {:?} for target SDK {}", kind, target);
                self.pending.push(Pending { kind, message: None });
                Ok(())
            }
            None => {
                self.pending.push(Pending {
                    kind,
                    message: Some(message.into()),
                });
                Ok(())
            }
        }
    }

    /// Fix the target SDK and resolve everything recorded so far
    pub fn enable_deferred_errors(&mut self, target_sdk: i32) -> ParseResult<()> {
        self.target_sdk = Some(target_sdk);
        for pending in &mut self.pending {
            if let Some(message) = pending.message.take() {
                if pending.kind.is_fatal_for(target_sdk) {
                    return Err(ParseError::new(pending.kind.code(), message));
                }
                debug!("Tolerating {:?} for target SDK {}", pending.kind, target_sdk);
            }
        }
        Ok(())
    }

    /// Resolve outstanding conditions with the default target SDK when the
    /// manifest never declared one
    pub fn finish(&mut self, default_target_sdk: i32) -> ParseResult<()> {
        match self.target_sdk {
            Some(_) => Ok(()),
            None => self.enable_deferred_errors(default_target_sdk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_then_fatal_above_threshold() {
        let mut input = ParseInput::new();
        input
            .defer_error(DeferredKind::MissingAppTag, "no application")
            .unwrap();
        let err = input.enable_deferred_errors(10000).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ManifestMalformed);
        assert_eq!(err.message(), "no application");
    }

    #[test]
    fn test_recorded_then_tolerated_below_threshold() {
        let mut input = ParseInput::new();
        input
            .defer_error(DeferredKind::MissingAppTag, "no application")
            .unwrap();
        assert!(input.enable_deferred_errors(5).is_ok());
        // Once accepted it stays accepted
        assert!(input.defer_error(DeferredKind::MissingAppTag, "again").is_ok());
    }

    #[test]
    fn test_immediate_when_target_known() {
        let mut input = ParseInput::new();
        input.enable_deferred_errors(30).unwrap();
        let err = input
            .defer_error(DeferredKind::ResourcesArscCompressed, "compressed")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ResourcesArscCompressed);
    }

    #[test]
    fn test_finish_uses_default_only_when_unset() {
        let mut input = ParseInput::new();
        input
            .defer_error(DeferredKind::EmptyIntentActionCategory, "empty action")
            .unwrap();
        assert!(input.finish(0).is_ok());
        assert_eq!(input.target_sdk(), Some(0));

        let mut input = ParseInput::new();
        input.enable_deferred_errors(5).unwrap();
        assert!(input.finish(10000).is_ok());
        assert_eq!(input.target_sdk(), Some(5));
    }

    #[test]
    fn test_first_message_wins() {
        let mut input = ParseInput::new();
        input.defer_error(DeferredKind::MissingAppTag, "first").unwrap();
        input.defer_error(DeferredKind::MissingAppTag, "second").unwrap();
        let err = input.enable_deferred_errors(31).unwrap_err();
        assert_eq!(err.message(), "first");
    }
}
