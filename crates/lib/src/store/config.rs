//! Store configuration.

use serde::{Deserialize, Serialize};

use crate::doc::{ANNOTATION_ON, BRANCH_OF, BRANCHES, CLONE_OF, CONTEXT};

/// Settings shared by every operation running against a [`Store`](super::Store).
///
/// ```
/// use docbranch::StoreConfig;
///
/// let config = StoreConfig {
///     current_user: Some("ada".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(config.default_layout_key, "data");
/// assert_eq!(config.annotations_suffix, "-annotations");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Collection key used when a document has no `layoutKey` field.
    pub default_layout_key: String,
    /// Suffix of the per-document annotation collection.
    pub annotations_suffix: String,
    /// Keys never copied when cloning a document.
    pub clone_exclusions: Vec<String>,
    /// Author recorded on documents created through the store.
    pub current_user: Option<String>,
}

impl StoreConfig {
    pub fn is_excluded_from_clone(&self, key: &str) -> bool {
        self.clone_exclusions.iter().any(|k| k == key)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_layout_key: "data".to_string(),
            annotations_suffix: "-annotations".to_string(),
            clone_exclusions: [CONTEXT, ANNOTATION_ON, CLONE_OF, BRANCH_OF, BRANCHES]
                .into_iter()
                .map(String::from)
                .collect(),
            current_user: None,
        }
    }
}
