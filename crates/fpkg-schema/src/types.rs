//! Newtype wrappers for the string-typed values stored in a package manifest.
//!
//! All newtypes serialize/deserialize as plain strings, which is what `pkg(8)`
//! expects to find in `+MANIFEST`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Octal permission string without prefix, e.g. `755` or `4755`.
    Perm
);

string_newtype!(
    /// Lowercase hex SHA-256 digest of a packaged file.
    Checksum
);

/// Highest mode accepted in a permission string (setuid, setgid, sticky and rwx bits).
pub const MAX_MODE: u32 = 0o7777;

impl Perm {
    /// Format permission bits the way `pkg(8)` expects them: octal, no leading zero.
    pub fn from_mode(mode: u32) -> Self {
        Self(format!("{:o}", mode & MAX_MODE))
    }

    /// Parse the string back into permission bits.
    ///
    /// Returns `None` if the string is not octal or exceeds [`MAX_MODE`].
    pub fn to_mode(&self) -> Option<u32> {
        parse_octal_mode(&self.0)
    }
}

pub(crate) fn parse_octal_mode(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    u32::from_str_radix(s, 8).ok().filter(|m| *m <= MAX_MODE)
}
