//! Single-column encoding of a restricted record's audience.
//!
//! A set of user ids is stored as `:id1:id2:...:`. Every id is bounded by the
//! delimiter on both sides, so "is member" is the unanchored substring test
//! for `:id:` and can never match a prefix or suffix of a longer id (`4` does
//! not match inside `:42:`). Ids are written in ascending order so that equal
//! sets always encode to equal strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::ids::UserId;

/// Separator and boundary character of the encoding.
pub const DELIMITER: char = ':';

/// Encoded, non-empty set of permitted users.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AllowList(String);

impl AllowList {
    /// Encodes a set of users. Returns `None` when the set is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use rowguard_core::{AllowList, UserId};
    ///
    /// let list = AllowList::encode([42, 3, 7].map(UserId::new)).unwrap();
    /// assert_eq!(list.as_str(), ":3:7:42:");
    /// assert!(list.contains(UserId::new(7)));
    /// assert!(!list.contains(UserId::new(4)));
    /// assert!(AllowList::encode(Vec::<UserId>::new()).is_none());
    /// ```
    pub fn encode<I>(users: I) -> Option<Self>
    where
        I: IntoIterator<Item = UserId>,
    {
        let users: BTreeSet<UserId> = users.into_iter().collect();
        if users.is_empty() {
            return None;
        }
        let mut encoded = String::from(DELIMITER);
        for user in users {
            encoded.push_str(&user.to_string());
            encoded.push(DELIMITER);
        }
        Some(Self(encoded))
    }

    /// Parses a stored value, validating its shape.
    ///
    /// The result is in canonical form: ids out of order or repeated are
    /// re-encoded, so equal sets always compare equal.
    ///
    /// ```
    /// use rowguard_core::AllowList;
    ///
    /// assert_eq!(AllowList::parse(":9:1:1:").unwrap().as_str(), ":1:9:");
    /// ```
    pub fn parse(encoded: &str) -> Result<Self> {
        let invalid = || Error::InvalidAllowList(encoded.to_string());
        let inner = encoded
            .strip_prefix(DELIMITER)
            .and_then(|rest| rest.strip_suffix(DELIMITER))
            .filter(|inner| !inner.is_empty())
            .ok_or_else(invalid)?;
        let users = inner
            .split(DELIMITER)
            .map(|part| part.parse::<UserId>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        Self::encode(users).ok_or_else(invalid)
    }

    /// The substring a member's id appears as.
    pub fn needle(user: UserId) -> String {
        format!("{DELIMITER}{user}{DELIMITER}")
    }

    /// Exact-id membership test.
    pub fn contains(&self, user: UserId) -> bool {
        self.0.contains(&Self::needle(user))
    }

    /// Decodes the member ids.
    pub fn users(&self) -> BTreeSet<UserId> {
        self.0
            .split(DELIMITER)
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.parse().ok())
            .collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.users().len()
    }

    /// Always `false`; an empty audience is encoded as no list at all.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The stored string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AllowList {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AllowList> for String {
    fn from(list: AllowList) -> Self {
        list.0
    }
}
