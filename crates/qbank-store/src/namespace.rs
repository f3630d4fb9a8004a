//! Fixed storage categories and the key shapes derived from them.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Prefix used for local storage keys unless configured otherwise.
pub const DEFAULT_APP_PREFIX: &str = "tutorme.qbank";

/// A category of persisted study state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Mastery level per question, `"<section>,<question>"` sub-keys.
    Mastery,
    /// Free-form notes, `"q,<section>,<question>"` sub-keys.
    Notes,
    /// Color theme, a bare string.
    Color,
    /// Highlights, `"<context>,<section>,<question>"` sub-keys.
    Hilites,
    /// Saved test lists.
    #[serde(rename = "testlist")]
    TestList,
    /// Expansion state of the section tree.
    Expanded,
}

impl Namespace {
    /// Every namespace.
    pub const ALL: [Namespace; 6] = [
        Namespace::Mastery,
        Namespace::Notes,
        Namespace::Color,
        Namespace::Hilites,
        Namespace::TestList,
        Namespace::Expanded,
    ];

    /// Namespaces whose source of truth is the remote endpoint when mirrored.
    pub const SYNCED: [Namespace; 4] = [
        Namespace::Mastery,
        Namespace::Notes,
        Namespace::Hilites,
        Namespace::TestList,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mastery => "mastery",
            Self::Notes => "notes",
            Self::Color => "color",
            Self::Hilites => "hilites",
            Self::TestList => "testlist",
            Self::Expanded => "expanded",
        }
    }

    /// `true` for namespaces stored as a bare string rather than a mapping.
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Color)
    }

    /// `true` for namespaces that always live in local storage.
    pub fn is_local_only(self) -> bool {
        matches!(self, Self::Color | Self::Expanded)
    }

    /// Local storage key: `"{prefix}.{namespace}"`.
    pub fn storage_key(self, prefix: &str) -> String {
        format!("{prefix}.{}", self.as_str())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| StoreError::UnknownNamespace(s.to_string()))
    }
}

/// Sub-key under which the notes for question `current` are kept.
pub fn notes_key(current: &str) -> String {
    format!("q,{current}")
}

/// Sub-key under which highlights for `current` in context `prefix` are kept.
pub fn hilites_key(prefix: &str, current: &str) -> String {
    format!("{prefix},{current}")
}

/// Characters left as-is in a path segment; everything else is
/// percent-encoded, so the URL parser has nothing left to normalize.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b',');

/// `true` when `key` can be sent as its own path segment.
///
/// Empty keys and the dot segments `.` and `..` are rewritten or dropped by
/// URL normalization, so they cannot address a sub-key resource.
pub fn is_path_segment(key: &str) -> bool {
    !matches!(key, "" | "." | "..")
}

/// Remote resource path: `{base_path}/{user}/{namespace}[/{sub_key}]`.
///
/// `user` and `sub_key` are percent-encoded so each maps to exactly one path
/// segment; `sub_key` must pass [`is_path_segment`].
pub fn resource_path(base_path: &str, user: &str, ns: Namespace, sub_key: Option<&str>) -> String {
    let mut path = format!(
        "{}/{}/{}",
        base_path.trim_end_matches('/'),
        encode_segment(user),
        ns
    );
    if let Some(key) = sub_key {
        path.push('/');
        path.push_str(&encode_segment(key));
    }
    path
}

/// Resource path of a user's full snapshot: `{base_path}/{user}`.
pub fn snapshot_path(base_path: &str, user: &str) -> String {
    format!("{}/{}", base_path.trim_end_matches('/'), encode_segment(user))
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}
