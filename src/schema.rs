//! Store-facing graph schema
//!
//! Label, key and relationship-type names are read by other tools that
//! traverse the loaded graph, so they are fixed here and nowhere else.

use std::fmt;

pub const DOCUMENT_LABEL: &str = "doi";
pub const DOCUMENT_KEY: &str = "name";
pub const AUTHOR_LABEL: &str = "author";
pub const AUTHOR_KEY: &str = "id_hash";
pub const REFERENCE_TYPE: &str = "reference";
pub const AUTHORSHIP_TYPE: &str = "author";

/// Node categories produced by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Document,
    Author,
}

impl NodeKind {
    pub const ALL: [NodeKind; 2] = [NodeKind::Document, NodeKind::Author];

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Document => DOCUMENT_LABEL,
            NodeKind::Author => AUTHOR_LABEL,
        }
    }

    /// Property that identifies a node of this kind under merge
    pub fn match_key(&self) -> &'static str {
        match self {
            NodeKind::Document => DOCUMENT_KEY,
            NodeKind::Author => AUTHOR_KEY,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            label: self.label(),
            key: self.match_key(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Document => write!(f, "document"),
            NodeKind::Author => write!(f, "author"),
        }
    }
}

/// Relationship categories produced by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    Reference,
    Authorship,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 2] = [EdgeKind::Reference, EdgeKind::Authorship];

    pub fn spec(&self) -> EdgeSpec {
        match self {
            EdgeKind::Reference => EdgeSpec {
                edge_type: REFERENCE_TYPE,
                source: NodeKind::Document.endpoint(),
                target: NodeKind::Document.endpoint(),
                bidirectional: false,
            },
            EdgeKind::Authorship => EdgeSpec {
                edge_type: AUTHORSHIP_TYPE,
                source: NodeKind::Author.endpoint(),
                target: NodeKind::Document.endpoint(),
                bidirectional: true,
            },
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Reference => write!(f, "reference"),
            EdgeKind::Authorship => write!(f, "authorship"),
        }
    }
}

/// How one side of a relationship is matched: `(:label {key: value})`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub label: &'static str,
    pub key: &'static str,
}

/// Everything a gateway needs to merge one relationship kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeSpec {
    pub edge_type: &'static str,
    pub source: Endpoint,
    pub target: Endpoint,
    /// Also merge `(target)-[edge_type]->(source)`
    pub bidirectional: bool,
}

/// Endpoint key values of one relationship, source first
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgePair {
    pub start: String,
    pub end: String,
}

impl EdgePair {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}
