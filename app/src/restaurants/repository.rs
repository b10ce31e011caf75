use anyhow::Result;
use log::*;
use r2d2::{ManageConnection, Pool};

use infra::ids::Id;
use infra::persistence::Storage;

use super::models::Restaurant;

pub trait RestaurantsRepository {
    fn get_by_id(&self, id: &Id<Restaurant>) -> Result<Option<Restaurant>>;
    fn get_all(&self) -> Result<Vec<Restaurant>>;
    fn create(&self, restaurant: &mut Restaurant) -> Result<Id<Restaurant>>;
    /// Persists changes made to a previously loaded restaurant.
    fn save(&self, restaurant: &mut Restaurant) -> Result<()>;
    fn delete(&self, restaurant: &Restaurant) -> Result<()>;
}

/// Repository over pooled document storage. Each call checks out its own
/// connection and returns it when done.
#[derive(Debug)]
pub struct DocumentRestaurants<M: ManageConnection> {
    db: Pool<M>,
}

impl<M: ManageConnection> DocumentRestaurants<M> {
    pub fn new(db: Pool<M>) -> Self {
        DocumentRestaurants { db }
    }
}

impl<M: ManageConnection> Clone for DocumentRestaurants<M> {
    fn clone(&self) -> Self {
        let db = self.db.clone();
        DocumentRestaurants { db }
    }
}

impl<M: ManageConnection<Connection = D>, D: Storage + Send + 'static> RestaurantsRepository
    for DocumentRestaurants<M>
{
    fn get_by_id(&self, id: &Id<Restaurant>) -> Result<Option<Restaurant>> {
        let res = self.db.get()?.load(id)?;
        trace!("Load {} -> {:?}", id, res);
        Ok(res)
    }

    fn get_all(&self) -> Result<Vec<Restaurant>> {
        self.db.get()?.list()
    }

    fn create(&self, restaurant: &mut Restaurant) -> Result<Id<Restaurant>> {
        self.db.get()?.save(restaurant)?;
        debug!("Created {:?}", restaurant);
        Ok(restaurant.id())
    }

    fn save(&self, restaurant: &mut Restaurant) -> Result<()> {
        self.db.get()?.save(restaurant)
    }

    fn delete(&self, restaurant: &Restaurant) -> Result<()> {
        self.db.get()?.delete(restaurant)
    }
}
