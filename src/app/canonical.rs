//! Canonical naming for mirrored archives
//!
//! Pure functions deriving the local directory name of an archive and the
//! stable document identifier stored in its metadata member. Nothing here
//! touches shared state; the only I/O is reading the metadata file.

use std::fmt;
use std::path::Path;

use roxmltree::{Document, Node, ParsingOptions};

use crate::constants::{archive, metadata};
use crate::errors::{ArchiveError, ArchiveResult};

/// Sanitized directory name derived from an archive name
///
/// Only ever contains `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalDirectoryKey(String);

impl CanonicalDirectoryKey {
    /// Accept an existing directory name if it is already a valid key
    pub fn parse(name: &str) -> Option<Self> {
        let valid = !name.is_empty() && name.chars().all(is_key_char);
        valid.then(|| Self(name.to_string()))
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalDirectoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for CanonicalDirectoryKey {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

/// Identifier read from the metadata document, used to name both members
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentIdentifier(String);

impl DocumentIdentifier {
    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name `<identifier>.<extension>`
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

impl fmt::Display for DocumentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the canonical directory key of an archive
///
/// Drops the two trailing dotted segments (`.tar.gz`) and replaces every
/// character outside `[A-Za-z0-9_-]` with `_`. Names with fewer than two
/// dots have nothing left after stripping and map to the empty key.
pub fn canonical_directory_key(archive_base_name: &str) -> CanonicalDirectoryKey {
    let core = archive_base_name.rsplitn(3, '.').nth(2).unwrap_or("");
    CanonicalDirectoryKey(sanitize(core))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if is_key_char(c) { c } else { archive::SANITIZED_CHAR })
        .collect()
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Whether a remote entry name is an archive candidate
pub fn is_archive_candidate(name: &str) -> bool {
    name.ends_with(archive::ARCHIVE_SUFFIX)
}

/// Whether an archive member is the primary document
pub fn is_document_member(member: &str) -> bool {
    has_extension(member, archive::DOCUMENT_EXTENSION)
}

/// Whether an archive member is the metadata document
pub fn is_metadata_member(member: &str) -> bool {
    has_extension(member, archive::METADATA_EXTENSION)
}

fn has_extension(member: &str, extension: &str) -> bool {
    member
        .strip_suffix(extension)
        .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
}

/// Read the document identifier from a metadata file
///
/// Evaluates `/article/front/article-meta/article-id[@pub-id-type='pmc']`
/// and returns the text of the first match.
///
/// # Errors
///
/// Returns [`ArchiveError::MalformedMetadata`] if the file cannot be read or
/// parsed, the query matches nothing, or the matched identifier is unusable
/// as a file name.
pub fn extract_document_identifier(metadata_path: &Path) -> ArchiveResult<DocumentIdentifier> {
    let malformed = |reason: String| ArchiveError::MalformedMetadata {
        path: metadata_path.to_path_buf(),
        reason,
    };

    let text = std::fs::read_to_string(metadata_path).map_err(|e| malformed(e.to_string()))?;
    let identifier = identifier_from_xml(&text).map_err(malformed)?;

    tracing::debug!(
        "Read identifier {} from {}",
        identifier,
        metadata_path.display()
    );
    Ok(identifier)
}

fn identifier_from_xml(text: &str) -> Result<DocumentIdentifier, String> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(text, options).map_err(|e| e.to_string())?;

    let (root_name, path) = metadata::IDENTIFIER_PATH
        .split_first()
        .ok_or_else(|| "empty identifier query".to_string())?;

    let root = document.root_element();
    if root.tag_name().name() != *root_name {
        return Err(format!(
            "root element is <{}>, expected <{}>",
            root.tag_name().name(),
            root_name
        ));
    }

    let mut current: Vec<Node> = vec![root];
    for step in path {
        current = current
            .iter()
            .flat_map(|node| node.children())
            .filter(|child| child.is_element() && child.tag_name().name() == *step)
            .collect();
    }

    let node = current
        .into_iter()
        .find(|node| {
            node.attribute(metadata::IDENTIFIER_TYPE_ATTRIBUTE) == Some(metadata::IDENTIFIER_TYPE)
        })
        .ok_or_else(|| "no pmc article-id element".to_string())?;

    let content: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let content = content.trim();

    if content.is_empty() {
        return Err("empty pmc article-id".to_string());
    }
    if content.contains(['/', '\\']) || content == "." || content == ".." {
        return Err(format!("identifier {:?} is not a usable file name", content));
    }

    Ok(DocumentIdentifier(content.to_string()))
}
