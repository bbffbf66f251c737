pub mod ast;
pub mod resolved;

pub type SourceId = usize;
pub type Span = std::ops::Range<usize>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Loc {
    pub source: SourceId,
    pub span: Span,
}

impl Loc {
    pub fn new(source: SourceId, span: Span) -> Self {
        Loc { source, span }
    }

    pub fn merge(self, other: Loc) -> Loc {
        Loc {
            source: self.source,
            span: self.span.start..other.span.end,
        }
    }

    /// Location for nodes that have no source text (predefined bindings).
    pub fn generated() -> Self {
        Loc {
            source: 0,
            span: 0..0,
        }
    }
}

impl ariadne::Span for Loc {
    type SourceId = SourceId;

    fn source(&self) -> &Self::SourceId {
        &self.source
    }

    fn start(&self) -> usize {
        self.span.start
    }

    fn end(&self) -> usize {
        self.span.end
    }
}

/// The interpretations a parse site admits. Never empty: a site always has a
/// first reading, and further readings are kept alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ambiguous<T> {
    first: T,
    rest: Vec<T>,
}

impl<T> Ambiguous<T> {
    pub fn new(first: T) -> Self {
        Ambiguous {
            first,
            rest: Vec::new(),
        }
    }

    /// Add one more reading of the same site.
    pub fn or(mut self, alternative: T) -> Self {
        self.rest.push(alternative);
        self
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> &T {
        &self.first
    }

    /// The sole reading, if the site is unambiguous.
    pub fn only(&self) -> Option<&T> {
        if self.rest.is_empty() {
            Some(&self.first)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }
}

/// A positioned parse site as the parser delivers it: every grammatically
/// valid reading, still undecided.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub loc: Loc,
    pub alternatives: Ambiguous<T>,
}

impl<T> Node<T> {
    pub fn new(loc: Loc, alternatives: Ambiguous<T>) -> Self {
        Node { loc, alternatives }
    }

    /// A site with exactly one reading.
    pub fn single(loc: Loc, node: T) -> Self {
        Node {
            loc,
            alternatives: Ambiguous::new(node),
        }
    }
}

/// A positioned node with exactly one interpretation; what the resolver
/// produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Placed<T> {
    pub loc: Loc,
    pub node: T,
}

impl<T> Placed<T> {
    pub fn new(loc: Loc, node: T) -> Self {
        Placed { loc, node }
    }
}
