//! Depth-bounded tag dispatch
//!
//! Every element with children is parsed the same way: advance through the
//! subtree, hand each direct child to a dispatcher, and stop at the
//! element's own end tag. Deeper descendants belong to the child's handler.

use crate::document::{Token, XmlCursor};
use crate::result::{skipped, ErrorCode, ParseError, ParseResult, Parsed, Step};
use tracing::{debug, warn};

/// What to do with a direct child no handler claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownTagPolicy {
    /// Fail with `BadManifest`
    Strict,
    /// Log and skip the whole subtree
    #[default]
    Lenient,
}

/// Dispatch each direct child of the element at the cursor
///
/// `dispatch` returns `None` for tags it does not handle; those go through
/// the unknown-tag policy with `parent` named in the diagnostic. A skipped
/// child never stops its siblings from being processed.
pub fn walk_children<'d, F>(
    cursor: &mut XmlCursor<'d>,
    parent: &str,
    policy: UnknownTagPolicy,
    mut dispatch: F,
) -> ParseResult<()>
where
    F: FnMut(&'d str, &mut XmlCursor<'d>) -> Option<Step>,
{
    let outer = cursor.depth();
    loop {
        match cursor.next() {
            Token::EndDocument => return Ok(()),
            Token::EndTag if cursor.depth() <= outer => return Ok(()),
            Token::StartTag if cursor.depth() == outer + 1 => {
                let tag = cursor.name();
                let step = match dispatch(tag, cursor) {
                    Some(step) => step,
                    None => unknown_tag(parent, tag, cursor, policy),
                };
                if let Parsed::Skipped(reason) = step? {
                    debug!("Skipped <{}> under {}: {}", tag, parent, reason);
                }
            }
            _ => {}
        }
    }
}

/// Apply the unknown-tag policy to the element at the cursor
pub fn unknown_tag(parent: &str, tag: &str, cursor: &mut XmlCursor<'_>, policy: UnknownTagPolicy) -> Step {
    match policy {
        UnknownTagPolicy::Strict => Err(ParseError::new(
            ErrorCode::BadManifest,
            format!("Bad element under {}: {}", parent, tag),
        )),
        UnknownTagPolicy::Lenient => {
            warn!(
                "Unknown element under {}: {} at {}",
                parent,
                tag,
                cursor.position_description()
            );
            cursor.skip_subtree();
            skipped(format!("unknown element {}", tag))
        }
    }
}

/// Consume the element at the cursor without looking at it
pub fn ignore(cursor: &mut XmlCursor<'_>) -> Option<Step> {
    cursor.skip_subtree();
    Some(Ok(Parsed::Value(())))
}
