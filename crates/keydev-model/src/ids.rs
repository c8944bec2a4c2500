//! Identifiers
//!
//! System ids are ULIDs (sortable by creation time). Users, departments and
//! teams come from outside this core and are carried as opaque strings.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a new id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(
    /// System id of a KeyDev
    KeyDevId
);
ulid_id!(
    /// System id of a question
    QuestionId
);
ulid_id!(
    /// System id of an answer
    AnswerId
);
ulid_id!(
    /// System id of a question template
    TemplateId
);
ulid_id!(
    /// Id of a label from the (external) label taxonomy
    LabelId
);

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw id
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Authenticated user id
    UserId
);
string_id!(
    /// Department key
    DeptId
);
string_id!(
    /// Team key
    TeamId
);

/// Human-readable sequential id, rendered as `KD-001`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HumanId(u32);

impl HumanId {
    /// Prefix of every rendered human id
    pub const PREFIX: &'static str = "KD-";

    /// Id for a given sequence number
    #[inline]
    #[must_use]
    pub const fn from_seq(seq: u32) -> Self {
        Self(seq)
    }

    /// Sequence number
    #[inline]
    #[must_use]
    pub const fn seq(self) -> u32 {
        self.0
    }

    /// Id following the highest existing one (`KD-001` when none exist)
    #[must_use]
    pub fn next_after(highest: Option<HumanId>) -> Self {
        Self(highest.map_or(1, |h| h.0.saturating_add(1)))
    }
}

impl fmt::Display for HumanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", Self::PREFIX, self.0)
    }
}

impl FromStr for HumanId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(Self::PREFIX)
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(Self)
            .ok_or_else(|| ModelError::InvalidHumanId(s.to_string()))
    }
}

impl TryFrom<String> for HumanId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HumanId> for String {
    fn from(value: HumanId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_id_format() {
        assert_eq!(HumanId::from_seq(7).to_string(), "KD-007");
        assert_eq!(HumanId::from_seq(1234).to_string(), "KD-1234");
    }

    #[test]
    fn human_id_parse() {
        assert_eq!("KD-042".parse::<HumanId>().unwrap(), HumanId::from_seq(42));
        assert!("KD-".parse::<HumanId>().is_err());
        assert!("XX-001".parse::<HumanId>().is_err());
    }

    #[test]
    fn human_id_next() {
        assert_eq!(HumanId::next_after(None), HumanId::from_seq(1));
        assert_eq!(
            HumanId::next_after(Some(HumanId::from_seq(9))),
            HumanId::from_seq(10)
        );
    }

    #[test]
    fn ids_serialize_transparently() {
        let user = UserId::from("u1");
        assert_eq!(serde_json::to_string(&user).unwrap(), "\"u1\"");

        let human = HumanId::from_seq(3);
        assert_eq!(serde_json::to_string(&human).unwrap(), "\"KD-003\"");
    }
}
