use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{Entity, Id};

/// Opaque store-assigned version. The empty version marks a document that
/// has never been saved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, Hash)]
pub struct Version(String);

#[derive(Serialize, Deserialize)]
#[serde(bound = "T: Entity")]
pub struct DocMeta<T> {
    #[serde(rename = "_id")]
    pub id: Id<T>,
    #[serde(rename = "_version", default)]
    pub version: Version,
}

pub trait HasMeta: Sized {
    fn meta(&self) -> &DocMeta<Self>;
    fn meta_mut(&mut self) -> &mut DocMeta<Self>;
}

impl Version {
    pub fn is_new(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Version {
    fn from(version: String) -> Self {
        Version(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

impl<T> DocMeta<T> {
    pub fn new_with_id(id: Id<T>) -> Self {
        DocMeta {
            id,
            version: Version::default(),
        }
    }
}

impl<T> Default for DocMeta<T> {
    fn default() -> Self {
        DocMeta::new_with_id(Id::default())
    }
}

impl<T> Clone for DocMeta<T> {
    fn clone(&self) -> Self {
        DocMeta {
            id: self.id,
            version: self.version.clone(),
        }
    }
}

impl<T> PartialEq for DocMeta<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version
    }
}

impl<T> Eq for DocMeta<T> {}

impl<T> fmt::Debug for DocMeta<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DocMeta")
            .field("id", &self.id)
            .field("version", &self.version)
            .finish()
    }
}
