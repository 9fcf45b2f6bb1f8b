use std::fmt::{Display, Formatter};
use std::ops::Deref;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::firestore::error::{invalid_argument, FirestoreResult};

/// Characters escaped in a single path segment. Everything except
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, the URI component unreserved set.
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const PROJECTS_PREFIX: &str = "projects/";
const DEFAULT_DOCUMENTS_MARKER: &str = "/databases/(default)/documents/";

/// Slash separated path to a collection or document, relative to the database root.
///
/// Segments alternate between collection ids (even indexes) and document ids (odd indexes).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments.into_iter().map(Into::into).collect();
        Self::new(segments)
    }

    /// Parses and validates `path`. Leading, trailing and repeated slashes are insignificant.
    pub fn from_string(path: &str) -> FirestoreResult<Self> {
        let segments: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        for (index, segment) in segments.iter().enumerate() {
            validate_segment(segment, index)?;
        }
        Ok(Self::new(segments))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// A path with an even, non-zero number of segments names a document.
    pub fn is_document(&self) -> bool {
        !self.segments.is_empty() && self.segments.len() % 2 == 0
    }

    pub fn child<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut new_segments = self.segments.clone();
        new_segments.extend(segments.into_iter().map(Into::into));
        Self::new(new_segments)
    }

    pub fn without_last(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self::new(segments)
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    pub fn canonical_string(&self) -> String {
        self.segments.join("/")
    }

    /// Canonical form with every segment percent-encoded, ready to be placed in a URL.
    pub fn encoded_string(&self) -> String {
        self.segments
            .iter()
            .map(|segment| encode_segment(segment))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Display for ResourcePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_string())
    }
}

impl Deref for ResourcePath {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.segments
    }
}

/// Rejects collection and document names the server reserves.
///
/// `index` is the zero based position of `name` in its path and only selects the wording
/// of the error.
pub fn validate_segment(name: &str, index: usize) -> FirestoreResult<&str> {
    let kind = if index % 2 == 0 { "Collection" } else { "Document" };
    if name == "." || name == ".." {
        return Err(invalid_argument(format!(
            "{kind} name cannot solely consist of a single period (.) or double periods (..)"
        )));
    }
    if name.starts_with("__") && name.ends_with("__") {
        return Err(invalid_argument(format!(
            "{kind} name cannot be a dunder name (begin and end with double underscores)"
        )));
    }
    Ok(name)
}

pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

pub fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Validates every segment of `path` and percent-encodes each one individually.
pub fn clean_path(path: &str) -> FirestoreResult<String> {
    Ok(ResourcePath::from_string(path)?.encoded_string())
}

/// Exact inverse of [`clean_path`] on its output.
pub fn decode_path(path: &str) -> String {
    path.split('/')
        .map(decode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits `path` into `(collection_path, item_name)`.
///
/// The last segment is peeled off as `item_name` when the path has an odd number of segments
/// and a collection item is wanted, or an even number and a document is wanted. Otherwise
/// `item_name` is empty and the whole path is returned as the first element.
pub fn split_col_doc(path: &str, want_document: bool) -> FirestoreResult<(String, String)> {
    let resource = ResourcePath::from_string(path)?;
    let odd = resource.len() % 2 == 1;
    if !resource.is_empty() && odd != want_document {
        let item = resource.last_segment().unwrap_or_default().to_string();
        Ok((resource.without_last().canonical_string(), item))
    } else {
        Ok((resource.canonical_string(), String::new()))
    }
}

/// `(parent_path, collection_id)` for a path naming a collection.
pub fn collection_from_path(path: &str) -> FirestoreResult<(String, String)> {
    split_col_doc(path, false)
}

/// `(collection_path, document_id)` for a path naming a document.
pub fn document_from_path(path: &str) -> FirestoreResult<(String, String)> {
    split_col_doc(path, true)
}

/// Extracts the relative path from an absolute document reference in the default database:
/// `projects/{p}/databases/(default)/documents/{collection}/{rest}`.
///
/// Returns `None` unless the whole string has that shape, the relative part containing at
/// least one inner slash.
pub fn relative_path_from_reference(name: &str) -> Option<&str> {
    if name.chars().any(is_line_terminator) {
        return None;
    }
    let rest = name.strip_prefix(PROJECTS_PREFIX)?;
    // The project id must be non-empty, so the marker is searched from the second byte on.
    let first = rest.char_indices().nth(1).map(|(index, _)| index)?;
    let marker = rest[first..].find(DEFAULT_DOCUMENTS_MARKER)? + first;
    let relative = &rest[marker + DEFAULT_DOCUMENTS_MARKER.len()..];
    has_inner_slash(relative).then_some(relative)
}

/// Returns `true` when `value` is an absolute document reference in the default database.
pub fn is_reference_path(value: &str) -> bool {
    relative_path_from_reference(value).is_some()
}

/// Strips `root` from an absolute document `name`, e.g. the `documents_root` of a database.
pub fn relative_path_from_name<'a>(name: &'a str, root: &str) -> Option<&'a str> {
    name.strip_prefix(root).filter(|relative| !relative.is_empty())
}

/// Relative document path of an absolute resource name in any database:
/// `projects/{p}/databases/{d}/documents/{relative}`.
pub fn relative_path_from_document_name(name: &str) -> Option<&str> {
    let mut parts = name.splitn(6, '/');
    let shape = [
        parts.next()? == "projects",
        !parts.next()?.is_empty(),
        parts.next()? == "databases",
        !parts.next()?.is_empty(),
        parts.next()? == "documents",
    ];
    let relative = parts.next()?;
    (shape.iter().all(|ok| *ok) && !relative.is_empty()).then_some(relative)
}

fn has_inner_slash(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() >= 3 && bytes[1..bytes.len() - 1].contains(&b'/')
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}
