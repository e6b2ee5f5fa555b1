//! Archive entry shape and its projection into graph descriptors

use crate::graph::{PropertyMap, PropertyValue};
use crate::hashing::fingerprint_fields;
use crate::schema::{EdgeKind, EdgePair, NodeKind, AUTHOR_KEY, DOCUMENT_KEY};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One bibliographic item as stored in the archive. Everything except the
/// identifier block is optional and copied through only when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: RecordIds,
    pub title: Option<Value>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<Value>,
    pub issued_at: Option<Value>,
    pub languages: Option<Value>,
    pub tags: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<Value>,
    pub updated_at: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: RecordMetadata,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: RecordLinks,
    /// Only the presence of the full text matters here
    #[serde(rename = "content", default, deserialize_with = "present")]
    pub has_content: bool,
    #[serde(default, deserialize_with = "non_null_items")]
    pub references: Vec<ReferenceRecord>,
    #[serde(default, deserialize_with = "non_null_items")]
    pub authors: Vec<AuthorRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordIds {
    pub dois: Option<Vec<String>>,
    pub internal_iso: Option<Value>,
    pub libgen_ids: Option<Value>,
    pub zlibrary_ids: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordMetadata {
    pub container_title: Option<Value>,
    pub iso_id: Option<Value>,
    pub isbns: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordLinks {
    pub cid: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceRecord {
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorRecord {
    pub family: Option<Value>,
    pub given: Option<Value>,
    pub orcid: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    serde::de::IgnoredAny::deserialize(deserializer).map(|_| true)
}

/// An explicit `null` reads the same as a missing block
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// List that may itself be `null` or hold `null` items; both are dropped
fn non_null_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items: Option<Vec<Option<T>>> = Option::deserialize(deserializer)?;
    Ok(items.into_iter().flatten().flatten().collect())
}

/// A node to merge: its kind decides label and match key
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub kind: NodeKind,
    pub properties: PropertyMap,
}

impl NodeDescriptor {
    /// Value of the match key. Always present for decoder output.
    pub fn key(&self) -> Option<&str> {
        self.properties
            .get(self.kind.match_key())
            .and_then(PropertyValue::as_string)
    }

    fn stand_in(id: &str) -> Self {
        let mut properties = PropertyMap::new();
        properties.insert(DOCUMENT_KEY.to_string(), id.into());
        Self {
            kind: NodeKind::Document,
            properties,
        }
    }
}

/// A relationship to merge, addressed by endpoint key values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDescriptor {
    pub kind: EdgeKind,
    pub pair: EdgePair,
}

impl AuthorRecord {
    fn fields(&self) -> [(&'static str, Option<&Value>); 3] {
        [
            ("family", self.family.as_ref()),
            ("given", self.given.as_ref()),
            ("orcid", self.orcid.as_ref()),
        ]
    }

    /// Identity of the author: fingerprint of the name fields that are set.
    /// Matching is exact; no case or accent folding.
    pub fn identity_hash(&self) -> String {
        fingerprint_fields(self.fields())
    }

    pub fn node(&self) -> NodeDescriptor {
        let mut properties = PropertyMap::new();
        properties.insert(AUTHOR_KEY.to_string(), self.identity_hash().into());
        for (name, value) in self.fields() {
            insert_present(&mut properties, name, value);
        }
        NodeDescriptor {
            kind: NodeKind::Author,
            properties,
        }
    }
}

impl DocumentRecord {
    /// First DOI; an empty string counts as absent
    pub fn primary_id(&self) -> Option<&str> {
        self.id
            .dois
            .as_ref()?
            .first()
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Cited identifiers, in archive order. References without a DOI are
    /// ignored.
    pub fn reference_targets(&self) -> impl Iterator<Item = &str> {
        self.references
            .iter()
            .filter_map(|r| r.doi.as_deref())
            .filter(|doi| !doi.is_empty())
    }

    /// Full document node (sparse attributes)
    pub fn document_node(&self) -> Option<NodeDescriptor> {
        let id = self.primary_id()?;
        let mut properties = PropertyMap::new();
        properties.insert(DOCUMENT_KEY.to_string(), id.into());

        let attributes = [
            ("abstract", self.abstract_text.as_ref()),
            ("title", self.title.as_ref()),
            ("issued_at", self.issued_at.as_ref()),
            ("languages", self.languages.as_ref()),
            ("tags", self.tags.as_ref()),
            ("container_title", self.metadata.container_title.as_ref()),
            ("iso_id", self.metadata.iso_id.as_ref()),
            ("isbns", self.metadata.isbns.as_ref()),
            ("cid", self.links.cid.as_ref()),
            ("type", self.kind.as_ref()),
            ("updated_at", self.updated_at.as_ref()),
            ("internal_iso", self.id.internal_iso.as_ref()),
            ("libgen_ids", self.id.libgen_ids.as_ref()),
            ("zlibrary_ids", self.id.zlibrary_ids.as_ref()),
        ];
        for (name, value) in attributes {
            insert_present(&mut properties, name, value);
        }
        properties.insert("is_content_present".to_string(), self.has_content.into());

        Some(NodeDescriptor {
            kind: NodeKind::Document,
            properties,
        })
    }

    /// Pass-1 projection: the document node, a stand-in for every cited
    /// identifier and one node per listed author. Records without a
    /// primary id contribute nothing.
    pub fn nodes(&self) -> Vec<NodeDescriptor> {
        let Some(document) = self.document_node() else {
            return Vec::new();
        };
        let mut nodes = Vec::with_capacity(1 + self.references.len() + self.authors.len());
        nodes.push(document);
        nodes.extend(self.reference_targets().map(NodeDescriptor::stand_in));
        nodes.extend(self.authors.iter().map(AuthorRecord::node));
        nodes
    }

    /// Pass-2 projection: citations from this document and authorships of
    /// it. Authorship is emitted author -> document; the reverse direction
    /// is the gateway's job.
    pub fn edges(&self) -> Vec<EdgeDescriptor> {
        let Some(id) = self.primary_id() else {
            return Vec::new();
        };
        let references = self.reference_targets().map(|target| EdgeDescriptor {
            kind: EdgeKind::Reference,
            pair: EdgePair::new(id, target),
        });
        let authorships = self.authors.iter().map(|author| EdgeDescriptor {
            kind: EdgeKind::Authorship,
            pair: EdgePair::new(author.identity_hash(), id),
        });
        references.chain(authorships).collect()
    }
}

fn insert_present(properties: &mut PropertyMap, name: &str, value: Option<&Value>) {
    if let Some(value) = value.filter(|v| !v.is_null()) {
        properties.insert(name.to_string(), PropertyValue::from_json(value));
    }
}
