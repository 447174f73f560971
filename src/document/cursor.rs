use super::{Attribute, Node, XmlDocument};

/// Kind of node the cursor moved onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    StartTag,
    EndTag,
    Text,
    EndDocument,
}

/// Pull-style cursor over an [`XmlDocument`]
///
/// Depth follows pull-parser conventions: 0 before the root, 1 on the root
/// start tag, and an end tag reports the same depth as its start tag.
#[derive(Debug, Clone)]
pub struct XmlCursor<'d> {
    doc: &'d XmlDocument,
    index: Option<usize>,
    depth: usize,
}

impl<'d> XmlCursor<'d> {
    pub(crate) fn new(doc: &'d XmlDocument) -> Self {
        Self {
            doc,
            index: None,
            depth: 0,
        }
    }

    fn current(&self) -> Option<&'d Node> {
        self.index.and_then(|i| self.doc.nodes().get(i))
    }

    /// Advance to the next node
    pub fn next(&mut self) -> Token {
        if let Some(Node::End { .. }) = self.current() {
            self.depth = self.depth.saturating_sub(1);
        }

        let next = self.index.map_or(0, |i| i + 1);
        let len = self.doc.nodes().len();
        self.index = Some(next.min(len));

        match self.doc.nodes().get(next) {
            Some(Node::Start { .. }) => {
                self.depth += 1;
                Token::StartTag
            }
            Some(Node::End { .. }) => Token::EndTag,
            Some(Node::Text { .. }) => Token::Text,
            None => Token::EndDocument,
        }
    }

    /// Advance to the first start tag of the document
    pub fn next_start_tag(&mut self) -> Token {
        loop {
            match self.next() {
                Token::StartTag => return Token::StartTag,
                Token::EndDocument => return Token::EndDocument,
                _ => continue,
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Name of the current start or end tag, empty otherwise
    pub fn name(&self) -> &'d str {
        match self.current() {
            Some(Node::Start { name, .. }) | Some(Node::End { name, .. }) => name,
            _ => "",
        }
    }

    /// Attributes of the current start tag
    pub fn attributes(&self) -> &'d [Attribute] {
        match self.current() {
            Some(Node::Start { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    /// Text of the current text node
    pub fn text(&self) -> Option<&'d str> {
        match self.current() {
            Some(Node::Text { text, .. }) => Some(text),
            _ => None,
        }
    }

    pub fn line(&self) -> usize {
        match self.current() {
            Some(Node::Start { line, .. })
            | Some(Node::End { line, .. })
            | Some(Node::Text { line, .. }) => *line,
            None => 0,
        }
    }

    /// Human readable position used in diagnostics
    pub fn position_description(&self) -> String {
        format!("line #{}", self.line())
    }

    /// Consume the rest of the current element, stopping on its end tag
    pub fn skip_subtree(&mut self) {
        if !matches!(self.current(), Some(Node::Start { .. })) {
            return;
        }
        let depth = self.depth;
        loop {
            match self.next() {
                Token::EndDocument => return,
                Token::EndTag if self.depth == depth => return,
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(xml: &str) -> XmlDocument {
        XmlDocument::parse(xml).unwrap()
    }

    #[test]
    fn test_depth_follows_pull_parser_rules() {
        let d = doc("<a><b><c/></b>hi</a>");
        let mut cursor = d.cursor();
        assert_eq!(cursor.depth(), 0);

        let mut seen = Vec::new();
        loop {
            let token = cursor.next();
            if token == Token::EndDocument {
                break;
            }
            seen.push((token, cursor.name().to_string(), cursor.depth()));
        }

        assert_eq!(
            seen,
            vec![
                (Token::StartTag, "a".to_string(), 1),
                (Token::StartTag, "b".to_string(), 2),
                (Token::StartTag, "c".to_string(), 3),
                (Token::EndTag, "c".to_string(), 3),
                (Token::EndTag, "b".to_string(), 2),
                (Token::Text, "".to_string(), 1),
                (Token::EndTag, "a".to_string(), 1),
            ]
        );
        assert_eq!(cursor.depth(), 0);
        // Stays at the end
        assert_eq!(cursor.next(), Token::EndDocument);
    }

    #[test]
    fn test_skip_subtree_stops_on_own_end_tag() {
        let d = doc("<a><b><c><d/></c></b><e/></a>");
        let mut cursor = d.cursor();
        cursor.next_start_tag();
        cursor.next();
        assert_eq!(cursor.name(), "b");
        cursor.skip_subtree();
        assert_eq!(cursor.name(), "b");
        assert_eq!(cursor.next(), Token::StartTag);
        assert_eq!(cursor.name(), "e");
        assert_eq!(cursor.depth(), 2);
    }

    #[test]
    fn test_text_access() {
        let d = doc("<resources><string name=\"a\">Hello &amp; bye</string></resources>");
        let mut cursor = d.cursor();
        cursor.next_start_tag();
        cursor.next();
        assert_eq!(cursor.attributes()[0].value, "a");
        cursor.next();
        assert_eq!(cursor.text(), Some("Hello & bye"));
    }
}
