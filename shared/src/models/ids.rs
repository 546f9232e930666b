use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Servers emit ids both as JSON strings and as integers. Either form lands
/// in the same string-backed newtype.
macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
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
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<u64> for $name {
            fn from(n: u64) -> Self {
                Self(n.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer)?
                    .into_string()
                    .map(Self)
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl RawId {
    fn into_string(self) -> Result<String, &'static str> {
        let s = match self {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Unsigned(n) => n.to_string(),
            RawId::Signed(n) => n.to_string(),
        };
        if s.is_empty() {
            return Err("id cannot be empty");
        }
        Ok(s)
    }
}

typed_id!(UserId);
typed_id!(GroupId);
typed_id!(PlanId);
typed_id!(ActivityId);
typed_id!(FriendRequestId);
typed_id!(ConversationId);
typed_id!(MessageId);
typed_id!(LocationId);
