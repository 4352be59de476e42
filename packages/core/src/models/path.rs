//! Materialized Path Codec
//!
//! Every node stores its full ancestor chain as a delimiter-bounded string
//! (`,root,subject,lesson,`), so subtree, ancestry and sibling queries never
//! need recursive fetches.
//!
//! # Encoding Rules
//!
//! - Root nodes have no path (stored as `NULL`)
//! - A child's path is its parent's path followed by the parent id, bounded
//!   by the delimiter on both ends
//! - Ids never contain the delimiter, so the bounded token `,<id>,` can only
//!   ever match a whole id (searching for `node-1` never matches `node-12`)
//!
//! Human-readable paths follow the same rule with ancestor *values* and `/`,
//! and the root's human-readable path is `/`.
//!
//! # Examples
//!
//! ```rust
//! use coursetree_core::models::MaterializedPath;
//!
//! let root = MaterializedPath::root();
//! let subject = root.child("root-1").unwrap();
//! let lesson = subject.child("subject-1").unwrap();
//!
//! assert_eq!(lesson.encode().as_deref(), Some(",root-1,subject-1,"));
//! assert_eq!(lesson.parent_id(), Some("subject-1"));
//! assert!(lesson.contains("root-1"));
//! assert!(!lesson.contains("root"));
//! ```

use crate::models::ValidationError;
use std::fmt;

/// Delimiter bounding every id token in a materialized path
pub const PATH_DELIMITER: char = ',';

/// Delimiter bounding every value in a human-readable path
pub const HUMAN_PATH_DELIMITER: char = '/';

/// Human-readable path of an owner's root node
pub const ROOT_HUMAN_READABLE_PATH: &str = "/";

/// Decoded ancestor chain of a node, ordered root-to-parent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaterializedPath {
    ancestors: Vec<String>,
}

impl MaterializedPath {
    /// Path of a root node (no ancestors)
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from an explicit ancestor list
    pub fn from_ancestors(ancestors: Vec<String>) -> Result<Self, ValidationError> {
        for id in &ancestors {
            validate_id(id)?;
        }
        Ok(Self { ancestors })
    }

    /// Decode a stored path
    ///
    /// `None` and the empty string both decode to the root path. Anything else
    /// must be bounded by the delimiter on both ends and contain no empty tokens.
    pub fn parse(encoded: Option<&str>) -> Result<Self, ValidationError> {
        let encoded = match encoded {
            None | Some("") => return Ok(Self::root()),
            Some(s) => s,
        };

        let inner = encoded
            .strip_prefix(PATH_DELIMITER)
            .and_then(|s| s.strip_suffix(PATH_DELIMITER))
            .ok_or_else(|| ValidationError::InvalidPath(encoded.to_string()))?;

        if inner.is_empty() {
            return Err(ValidationError::InvalidPath(encoded.to_string()));
        }

        let ancestors = inner
            .split(PATH_DELIMITER)
            .map(|token| {
                if token.is_empty() {
                    Err(ValidationError::InvalidPath(encoded.to_string()))
                } else {
                    Ok(token.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { ancestors })
    }

    /// Encode for storage; `None` for the root path
    pub fn encode(&self) -> Option<String> {
        if self.ancestors.is_empty() {
            return None;
        }

        let mut encoded = String::with_capacity(
            self.ancestors.iter().map(|id| id.len() + 1).sum::<usize>() + 1,
        );
        encoded.push(PATH_DELIMITER);
        for id in &self.ancestors {
            encoded.push_str(id);
            encoded.push(PATH_DELIMITER);
        }
        Some(encoded)
    }

    /// Ancestor ids, root first
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Number of ancestors (0 for a root)
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn is_root(&self) -> bool {
        self.ancestors.is_empty()
    }

    /// Immediate parent: the last id token
    pub fn parent_id(&self) -> Option<&str> {
        self.ancestors.last().map(String::as_str)
    }

    /// Whether `id` appears as a whole token in this path
    pub fn contains(&self, id: &str) -> bool {
        self.ancestors.iter().any(|ancestor| ancestor == id)
    }

    /// Path of a child of the node identified by `parent_id` whose own path is `self`
    pub fn child(&self, parent_id: &str) -> Result<Self, ValidationError> {
        validate_id(parent_id)?;
        let mut ancestors = Vec::with_capacity(self.ancestors.len() + 1);
        ancestors.extend(self.ancestors.iter().cloned());
        ancestors.push(parent_id.to_string());
        Ok(Self { ancestors })
    }

    /// Token-wise prefix test
    pub fn starts_with(&self, prefix: &MaterializedPath) -> bool {
        self.ancestors.len() >= prefix.ancestors.len()
            && self.ancestors[..prefix.ancestors.len()] == prefix.ancestors[..]
    }

    /// Replace the leading `old_prefix` tokens with `new_prefix`
    ///
    /// Returns `None` when this path does not start with `old_prefix`.
    pub fn rebase(&self, old_prefix: &MaterializedPath, new_prefix: &MaterializedPath) -> Option<Self> {
        if !self.starts_with(old_prefix) {
            return None;
        }

        let mut ancestors = Vec::with_capacity(
            new_prefix.ancestors.len() + self.ancestors.len() - old_prefix.ancestors.len(),
        );
        ancestors.extend(new_prefix.ancestors.iter().cloned());
        ancestors.extend(self.ancestors[old_prefix.ancestors.len()..].iter().cloned());
        Some(Self { ancestors })
    }
}

impl fmt::Display for MaterializedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Some(encoded) => f.write_str(&encoded),
            None => Ok(()),
        }
    }
}

/// Reject ids that would break token boundaries
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.contains(PATH_DELIMITER) {
        return Err(ValidationError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Bounded token selecting the descendants of `id` (`,<id>,`)
pub fn descendant_token(id: &str) -> String {
    format!("{PATH_DELIMITER}{id}{PATH_DELIMITER}")
}

/// Whether a stored path marks its node as a descendant of `id`
///
/// Unparseable paths never match.
pub fn is_descendant_path(path: Option<&str>, id: &str) -> bool {
    MaterializedPath::parse(path)
        .map(|p| p.contains(id))
        .unwrap_or(false)
}

/// Human-readable path for a child of a node with the given path and value
pub fn child_human_readable_path(parent_human_path: &str, parent_value: &str) -> String {
    let base = if parent_human_path.is_empty() {
        ROOT_HUMAN_READABLE_PATH
    } else {
        parent_human_path
    };
    format!("{base}{parent_value}{HUMAN_PATH_DELIMITER}")
}

/// Replace the `old_prefix` of a human-readable path with `new_prefix`
pub fn rebase_human_readable_path(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    path.strip_prefix(old_prefix)
        .map(|rest| format!("{new_prefix}{rest}"))
}
