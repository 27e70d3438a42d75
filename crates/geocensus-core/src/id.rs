//! Strongly-typed identifiers used across the workspace.
//!
//! Downstream crates should *not* pass raw strings around for table ids, column
//! ids, resolutions, or states. All ids are case-sensitive and compared verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(v: impl Into<String>) -> Self {
                Self(v.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(v: &str) -> Self {
                Self(v.to_string())
            }
        }

        impl From<String> for $name {
            fn from(v: String) -> Self {
                Self(v)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

new_id!(
    /// Statistical table id, e.g. `B02` or the part-table `B41A`.
    TableId
);
new_id!(
    /// Column id as it appears in the metadata feed, e.g. `Median_age_persons`.
    ColumnId
);
new_id!(
    /// Tag id from the tag registry (unit, subsection, section, source, license).
    TagId
);

impl TableId {
    /// Leading character of the id (`B` for `B02`).
    pub fn prefix_char(&self) -> Option<char> {
        self.0.chars().next()
    }
}

impl ColumnId {
    /// Canonical lower-cased name used for output columns.
    pub fn canonical(&self) -> String {
        self.0.to_lowercase()
    }
}
