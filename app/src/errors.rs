use std::fmt;

use err_derive::Error;
use infra::persistence::{ConcurrencyError, StoreUnavailable};

use crate::dishes::InvalidDish;
use crate::users::IdentityError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(display = "{} with id: {} doesn't exist", entity, id)]
pub struct NotFound {
    pub entity: &'static str,
    pub id: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(display = "Forbidden")]
pub struct Forbidden;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(display = "Operation cancelled")]
pub struct Cancelled;

/// How a failure should be surfaced to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Invalid,
    Conflict,
    Cancelled,
    StoreUnavailable,
    Internal,
}

impl NotFound {
    pub fn new<I: fmt::Display>(entity: &'static str, id: &I) -> Self {
        NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl ErrorKind {
    pub fn of(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<NotFound>().is_some() {
            ErrorKind::NotFound
        } else if err.downcast_ref::<Forbidden>().is_some() {
            ErrorKind::Forbidden
        } else if err.downcast_ref::<InvalidDish>().is_some()
            || err.downcast_ref::<IdentityError>().is_some()
        {
            ErrorKind::Invalid
        } else if err.downcast_ref::<ConcurrencyError>().is_some() {
            ErrorKind::Conflict
        } else if err.downcast_ref::<Cancelled>().is_some() {
            ErrorKind::Cancelled
        } else if err.downcast_ref::<StoreUnavailable>().is_some()
            || err.downcast_ref::<r2d2::Error>().is_some()
        {
            ErrorKind::StoreUnavailable
        } else {
            ErrorKind::Internal
        }
    }

    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Forbidden => 403,
            ErrorKind::Invalid => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Cancelled => 499,
            ErrorKind::StoreUnavailable => 503,
            ErrorKind::Internal => 500,
        }
    }
}
