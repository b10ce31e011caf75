use std::collections::BTreeSet;
use std::hash::Hasher;

use anyhow::Result;
use err_derive::Error;
use log::*;
use r2d2::{ManageConnection, Pool};
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher24;

use infra::documents::{DocMeta, HasMeta};
use infra::ids::{Entity, Id};
use infra::persistence::Storage;

use crate::errors::NotFound;
use crate::roles::{Role, RoleRecord};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct User {
    #[serde(flatten)]
    pub(crate) meta: DocMeta<User>,
    pub email: String,
    #[serde(default)]
    pub roles: BTreeSet<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credential: Option<Credential>,
}

/// Salted fingerprint of the initial credential. Not a password hash.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
struct Credential {
    salt: u64,
    fingerprint: String,
}

/// The principal a command runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Id<User>,
    pub email: String,
    pub roles: BTreeSet<Role>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error(display = "A user with email {} already exists", _0)]
    DuplicateEmail(String),
    #[error(display = "Credential rejected: {}", _0)]
    WeakCredential(&'static str),
}

pub trait IdentityStore {
    fn create_principal(&self, user: User, credential: &str) -> Result<Id<User>>;
    fn find_user(&self, email: &str) -> Result<Option<User>>;
    fn user_exists(&self, email: &str) -> Result<bool> {
        Ok(self.find_user(email)?.is_some())
    }
    fn any_roles(&self) -> Result<bool>;
    fn add_roles(&self, roles: &[Role]) -> Result<()>;
    fn assign_role(&self, user: &Id<User>, role: Role) -> Result<()>;
}

/// Stands in for a missing identity store; it has no values.
#[derive(Debug)]
pub enum NoIdentity {}

#[derive(Debug)]
pub struct DocumentIdentity<M: ManageConnection> {
    db: Pool<M>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_uppercase()
}

pub fn check_credential_policy(credential: &str) -> Result<(), IdentityError> {
    if credential.chars().count() < 6 {
        return Err(IdentityError::WeakCredential("must be at least 6 characters"));
    }
    if !credential.chars().any(|c| c.is_ascii_digit()) {
        return Err(IdentityError::WeakCredential("must contain a digit"));
    }
    if !credential.chars().any(char::is_uppercase) {
        return Err(IdentityError::WeakCredential(
            "must contain an upper case letter",
        ));
    }
    if !credential.chars().any(char::is_lowercase) {
        return Err(IdentityError::WeakCredential(
            "must contain a lower case letter",
        ));
    }
    if credential.chars().all(char::is_alphanumeric) {
        return Err(IdentityError::WeakCredential(
            "must contain a non-alphanumeric character",
        ));
    }
    Ok(())
}

impl User {
    pub fn new(email: &str) -> Self {
        User {
            meta: DocMeta::new_with_id(User::id_for(email)),
            email: email.trim().to_string(),
            roles: BTreeSet::new(),
            credential: None,
        }
    }

    pub fn id_for(email: &str) -> Id<User> {
        Id::hashed(&normalize_email(email))
    }

    pub fn id(&self) -> Id<User> {
        self.meta.id
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn credential_matches(&self, candidate: &str) -> bool {
        match &self.credential {
            Some(credential) => {
                credential.fingerprint == Credential::fingerprint(credential.salt, candidate)
            }
            None => false,
        }
    }
}

impl Credential {
    fn derive(credential: &str) -> Self {
        let salt = rand::random();
        let fingerprint = Credential::fingerprint(salt, credential);
        Credential { salt, fingerprint }
    }

    fn fingerprint(salt: u64, credential: &str) -> String {
        let mut h = SipHasher24::new_with_keys(salt, 0);
        h.write(credential.as_bytes());
        format!("{:016x}", h.finish())
    }
}

impl Entity for User {
    const PREFIX: &'static str = "user";
}

impl HasMeta for User {
    fn meta(&self) -> &DocMeta<User> {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut DocMeta<User> {
        &mut self.meta
    }
}

impl CurrentUser {
    pub fn new(id: Id<User>, email: &str, roles: BTreeSet<Role>) -> Self {
        CurrentUser {
            id,
            email: email.to_string(),
            roles,
        }
    }

    pub fn is_in_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        CurrentUser::new(user.id(), &user.email, user.roles.clone())
    }
}

impl IdentityStore for NoIdentity {
    fn create_principal(&self, _: User, _: &str) -> Result<Id<User>> {
        match *self {}
    }
    fn find_user(&self, _: &str) -> Result<Option<User>> {
        match *self {}
    }
    fn any_roles(&self) -> Result<bool> {
        match *self {}
    }
    fn add_roles(&self, _: &[Role]) -> Result<()> {
        match *self {}
    }
    fn assign_role(&self, _: &Id<User>, _: Role) -> Result<()> {
        match *self {}
    }
}

impl<M: ManageConnection> DocumentIdentity<M> {
    pub fn new(db: Pool<M>) -> Self {
        DocumentIdentity { db }
    }
}

impl<M: ManageConnection> Clone for DocumentIdentity<M> {
    fn clone(&self) -> Self {
        let db = self.db.clone();
        DocumentIdentity { db }
    }
}

impl<M: ManageConnection<Connection = D>, D: Storage + Send + 'static> IdentityStore
    for DocumentIdentity<M>
{
    fn create_principal(&self, user: User, credential: &str) -> Result<Id<User>> {
        check_credential_policy(credential)?;
        let docs = self.db.get()?;
        if docs.load::<User>(&user.id())?.is_some() {
            return Err(IdentityError::DuplicateEmail(user.email).into());
        }

        let mut user = user;
        user.credential = Some(Credential::derive(credential));
        docs.save(&mut user)?;
        info!("Created principal {} as {}", user.email, user.id());
        Ok(user.id())
    }

    fn find_user(&self, email: &str) -> Result<Option<User>> {
        let docs = self.db.get()?;
        docs.load(&User::id_for(email))
    }

    fn any_roles(&self) -> Result<bool> {
        self.db.get()?.any::<RoleRecord>()
    }

    fn add_roles(&self, roles: &[Role]) -> Result<()> {
        let docs = self.db.get()?;
        for role in roles {
            if docs.load(&RoleRecord::id_for(*role))?.is_some() {
                debug!("Role {} already present", role);
                continue;
            }
            let mut record = RoleRecord::from(*role);
            docs.save(&mut record)?;
            debug!("Added role {:?}", record);
        }
        Ok(())
    }

    fn assign_role(&self, user_id: &Id<User>, role: Role) -> Result<()> {
        let docs = self.db.get()?;
        let mut user: User = docs
            .load(user_id)?
            .ok_or_else(|| NotFound::new("User", user_id))?;
        if user.roles.insert(role) {
            docs.save(&mut user)?;
            info!("Assigned role {} to {}", role, user.email);
        }
        Ok(())
    }
}
