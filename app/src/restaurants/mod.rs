use std::sync::Arc;

use infra::ids::IdGen;

mod commands;
mod models;
mod queries;
mod repository;

pub use self::commands::{
    CreateRestaurant, DeleteRestaurant, Mapper, UpdateRestaurant, UpdateRestaurantMapper,
};
pub use self::models::{Address, Dish, Restaurant};
pub use self::queries::{GetAllRestaurants, GetRestaurantById, PagedResult, SortBy, SortDirection};
pub use self::repository::{DocumentRestaurants, RestaurantsRepository};

/// Restaurant commands and queries, run against a repository on behalf of
/// whichever principal the authorization service was built for.
#[derive(Debug)]
pub struct RestaurantService<R, A, M = UpdateRestaurantMapper> {
    repository: R,
    authorization: A,
    mapper: M,
    idgen: Arc<IdGen>,
}

impl<R, A, M> RestaurantService<R, A, M> {
    pub fn new(repository: R, authorization: A, mapper: M) -> Self {
        let idgen = Arc::new(IdGen::new());
        RestaurantService {
            repository,
            authorization,
            mapper,
            idgen,
        }
    }

    pub fn with_idgen(self, idgen: Arc<IdGen>) -> Self {
        RestaurantService { idgen, ..self }
    }
}
