//! Forward-only pull cursor over a parsed document.

use roxmltree::{Document, Node};

use crate::diagnostics::Location;

/// One pull event.
#[derive(Debug, Clone, Copy)]
pub enum Event<'i> {
    /// Positioned on an element's start tag.
    Start(Node<'i, 'i>),
    /// Positioned on an element's end tag.
    End(Node<'i, 'i>),
    /// The document (or replayed subtree) is exhausted.
    Eof,
}

/// Pull cursor over the element events of a document or subtree.
///
/// Handlers are invoked with the cursor on the start event of "their"
/// element and must leave it on the matching end event. Attribute and text
/// access never moves the cursor; only [`Cursor::advance`] and
/// [`Cursor::skip_subtree`] do.
pub struct Cursor<'i> {
    doc: &'i Document<'i>,
    events: Vec<Event<'i>>,
    pos: usize,
}

impl<'i> Cursor<'i> {
    /// Create a cursor over the whole document, positioned on the start
    /// event of the document element.
    #[must_use]
    pub fn new(doc: &'i Document<'i>) -> Self {
        Self::over(doc, doc.root_element())
    }

    /// Create a replay cursor over one element's subtree.
    ///
    /// Used for deferred branch bodies and per-id nested imports: the
    /// element has already been consumed from the main stream, and the
    /// replay walks a recording of it.
    #[must_use]
    pub fn subtree(node: Node<'i, 'i>) -> Self {
        Self::over(node.document(), node)
    }

    fn over(doc: &'i Document<'i>, top: Node<'i, 'i>) -> Self {
        let mut events = Vec::new();
        collect_events(top, &mut events);
        events.push(Event::Eof);
        Self {
            doc,
            events,
            pos: 0,
        }
    }

    /// The current event.
    #[must_use]
    pub fn current(&self) -> Event<'i> {
        self.events[self.pos]
    }

    /// Move to the next event. Saturates at end of document.
    pub fn advance(&mut self) {
        if self.pos + 1 < self.events.len() {
            self.pos += 1;
        }
    }

    /// Opaque position, used to detect whether a handler consumed anything.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Whether the cursor has reached the end of the stream.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self.current(), Event::Eof)
    }

    /// The element node of the current start or end event.
    #[must_use]
    pub fn current_node(&self) -> Option<Node<'i, 'i>> {
        match self.current() {
            Event::Start(node) | Event::End(node) => Some(node),
            Event::Eof => None,
        }
    }

    /// Tag name of the current element, without namespace prefix.
    #[must_use]
    pub fn tag_name(&self) -> Option<&'i str> {
        self.current_node().map(|n| n.tag_name().name())
    }

    /// Attribute value on the current element.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&'i str> {
        self.current_node().and_then(|n| n.attribute(name))
    }

    /// Concatenated text content of the current element and its
    /// descendants, trimmed. Does not move the cursor.
    #[must_use]
    pub fn element_text(&self) -> String {
        self.current_node().map(collect_text).unwrap_or_default()
    }

    /// The raw source slice of the current element's subtree.
    #[must_use]
    pub fn raw_subtree(&self) -> Option<&'i str> {
        let node = self.current_node()?;
        self.doc.input_text().get(node.range())
    }

    /// Whether the current event is the end event of `node`.
    #[must_use]
    pub fn at_end_of(&self, node: Node<'i, 'i>) -> bool {
        matches!(self.current(), Event::End(n) if n.id() == node.id())
    }

    /// From a start event, consume the whole subtree and stop on the
    /// matching end event. On any other event this does nothing.
    pub fn skip_subtree(&mut self) {
        let Event::Start(node) = self.current() else {
            return;
        };
        while !self.at_end_of(node) && !self.is_eof() {
            self.advance();
        }
    }

    /// Source location of the current event.
    #[must_use]
    pub fn location(&self, resource: &str) -> Location {
        let offset = match self.current_node() {
            Some(node) => node.range().start,
            None => self.doc.input_text().len(),
        };
        let pos = self.doc.text_pos_at(offset);
        Location::new(resource, pos.row, pos.col)
    }
}

fn collect_events<'i>(node: Node<'i, 'i>, events: &mut Vec<Event<'i>>) {
    events.push(Event::Start(node));
    for child in node.children().filter(Node::is_element) {
        collect_events(child, events);
    }
    events.push(Event::End(node));
}

/// Concatenated, trimmed text content of a node and its descendants.
#[must_use]
pub fn collect_text(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    for descendant in node.descendants() {
        if descendant.is_text() {
            out.push_str(descendant.text().unwrap_or(""));
        }
    }
    out.trim().to_string()
}
