use std::{fmt, ops::Deref, str::FromStr};

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// A document ID, stored as a BSON `ObjectId`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(ObjectId);

/// A path parameter that may not have parsed as an [`Id`].
/// Routes take this so that malformed IDs become 404s rather than forwards.
pub type IdParam = Result<Id, mongodb::bson::oid::Error>;

impl Id {
    /// Generate a fresh, unique ID.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// A filter document matching this ID.
    pub fn as_doc(&self) -> Document {
        doc! { "_id": self.0 }
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Id {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = mongodb::bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<ObjectId>()?))
    }
}

impl From<ObjectId> for Id {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl From<Id> for Bson {
    fn from(id: Id) -> Self {
        Bson::ObjectId(id.0)
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = mongodb::bson::oid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<Id>()
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] Id);

/// (De)serialize an [`Id`] as a plain hex string, for JSON APIs.
/// Use as `#[serde(with = "hex_id")]`, or `hex_id::option` for `Option<Id>`.
pub mod hex_id {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Id;

    pub fn serialize<S: Serializer>(id: &Id, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Id, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(D::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(id: &Option<Id>, serializer: S) -> Result<S::Ok, S::Error> {
            match id {
                Some(id) => serializer.serialize_some(&id.to_hex()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Id>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|hex| hex.parse().map_err(D::Error::custom))
                .transpose()
        }
    }
}
