use std::sync::Arc;

use anyhow::Result;
use log::*;
use r2d2::{ManageConnection, Pool};

use infra::ids::IdGen;
use infra::persistence::{Migrations, Storage};

pub mod authorization;
pub mod config;
pub mod dishes;
pub mod errors;
pub mod restaurants;
pub mod roles;
pub mod seeder;
pub mod services;
pub mod users;

#[cfg(test)]
mod test;

use crate::authorization::RestaurantAuthorizationService;
use crate::config::SeedConfig;
use crate::dishes::DishService;
use crate::restaurants::{DocumentRestaurants, RestaurantService, UpdateRestaurantMapper};
use crate::seeder::Seeder;
use crate::users::{CurrentUser, DocumentIdentity, IdentityStore};

pub type Restaurants<M> = RestaurantService<
    DocumentRestaurants<M>,
    RestaurantAuthorizationService,
    UpdateRestaurantMapper,
>;
pub type Dishes<M> = DishService<DocumentRestaurants<M>, RestaurantAuthorizationService>;

/// Wires the document-backed services to a shared pool. Services are cheap
/// to build, one per acting principal.
#[derive(Debug)]
pub struct RestaurantsApp<M: ManageConnection> {
    db: Pool<M>,
    idgen: Arc<IdGen>,
}

impl<M: ManageConnection> Clone for RestaurantsApp<M> {
    fn clone(&self) -> Self {
        RestaurantsApp {
            db: self.db.clone(),
            idgen: self.idgen.clone(),
        }
    }
}

impl<M: ManageConnection> RestaurantsApp<M> {
    pub fn new(db: Pool<M>) -> Self {
        let idgen = Arc::new(IdGen::new());
        RestaurantsApp { db, idgen }
    }

    pub fn pool(&self) -> &Pool<M> {
        &self.db
    }

    pub fn identity(&self) -> DocumentIdentity<M> {
        DocumentIdentity::new(self.db.clone())
    }

    pub fn restaurants_for(&self, user: Option<CurrentUser>) -> Restaurants<M> {
        RestaurantService::new(
            DocumentRestaurants::new(self.db.clone()),
            RestaurantAuthorizationService::new(user),
            UpdateRestaurantMapper,
        )
        .with_idgen(self.idgen.clone())
    }

    pub fn dishes_for(&self, user: Option<CurrentUser>) -> Dishes<M> {
        DishService::new(
            DocumentRestaurants::new(self.db.clone()),
            RestaurantAuthorizationService::new(user),
        )
        .with_idgen(self.idgen.clone())
    }
}

impl<M, D> RestaurantsApp<M>
where
    M: ManageConnection<Connection = D>,
    D: Storage + Migrations + Send + 'static,
{
    pub fn seed(&self, config: &SeedConfig) -> Result<()> {
        if config.identity {
            Seeder::with_identity(self.db.clone(), self.identity(), config.clone())
                .with_idgen(self.idgen.clone())
                .seed()
        } else {
            Seeder::without_identity(self.db.clone(), config.clone())
                .with_idgen(self.idgen.clone())
                .seed()
        }
    }

    /// Resolves the principal registered under `email`, if any.
    pub fn login(&self, email: &str) -> Result<Option<CurrentUser>> {
        let user = self.identity().find_user(email)?;
        debug!("Login as {}: {:?}", email, user.as_ref().map(|u| u.id()));
        Ok(user.as_ref().map(CurrentUser::from))
    }
}
