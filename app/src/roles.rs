use std::fmt;
use std::str::FromStr;

use err_derive::Error;
use serde::{Deserialize, Serialize};

use infra::documents::{DocMeta, HasMeta};
use infra::ids::{Entity, Id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Owner,
    Admin,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(display = "Unknown role: {:?}", _0)]
pub struct UnknownRole(pub String);

/// Persisted form of a `Role`, looked up by its normalized name.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    #[serde(flatten)]
    pub(crate) meta: DocMeta<RoleRecord>,
    pub name: String,
    pub normalized_name: String,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Owner, Role::Admin];

    pub fn name(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Owner => "Owner",
            Role::Admin => "Admin",
        }
    }

    pub fn normalized_name(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let normalized = src.trim().to_uppercase();
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.normalized_name() == normalized)
            .ok_or_else(|| UnknownRole(src.to_string()))
    }
}

impl RoleRecord {
    pub fn id_for(role: Role) -> Id<RoleRecord> {
        Id::hashed(role.normalized_name())
    }
}

impl From<Role> for RoleRecord {
    fn from(role: Role) -> Self {
        RoleRecord {
            meta: DocMeta::new_with_id(RoleRecord::id_for(role)),
            name: role.name().to_string(),
            normalized_name: role.normalized_name().to_string(),
        }
    }
}

impl Entity for RoleRecord {
    const PREFIX: &'static str = "role";
}

impl HasMeta for RoleRecord {
    fn meta(&self) -> &DocMeta<Self> {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut DocMeta<Self> {
        &mut self.meta
    }
}
