use std::sync::Arc;

use anyhow::Result;
use err_derive::Error;
use log::*;
use rust_decimal::Decimal;

use infra::ids::{Id, IdGen};

use crate::authorization::{ResourceOperation, RestaurantAuthorization};
use crate::errors::{Forbidden, NotFound};
use crate::restaurants::{Dish, Restaurant, RestaurantsRepository};
use crate::services::{Commandable, Queryable, Request};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidDish {
    #[error(display = "Price must be a non-negative number, got {}", _0)]
    NegativePrice(Decimal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateDish {
    pub restaurant_id: Id<Restaurant>,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub kilo_calories: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDishesForRestaurant {
    pub restaurant_id: Id<Restaurant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDishById {
    pub restaurant_id: Id<Restaurant>,
    pub dish_id: Id<Dish>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteDishes {
    pub restaurant_id: Id<Restaurant>,
}

/// Dishes live inside their restaurant's document, so every operation here
/// is a load, authorize and save of the owning restaurant.
#[derive(Debug)]
pub struct DishService<R, A> {
    repository: R,
    authorization: A,
    idgen: Arc<IdGen>,
}

impl Request for CreateDish {
    type Resp = Id<Dish>;
}

impl Request for GetDishesForRestaurant {
    type Resp = Vec<Dish>;
}

impl Request for GetDishById {
    type Resp = Dish;
}

impl Request for DeleteDishes {
    type Resp = ();
}

impl<R, A> DishService<R, A> {
    pub fn new(repository: R, authorization: A) -> Self {
        let idgen = Arc::new(IdGen::new());
        DishService {
            repository,
            authorization,
            idgen,
        }
    }

    pub fn with_idgen(self, idgen: Arc<IdGen>) -> Self {
        DishService { idgen, ..self }
    }
}

impl<R: RestaurantsRepository, A: RestaurantAuthorization> DishService<R, A> {
    fn restaurant(&self, id: &Id<Restaurant>, operation: ResourceOperation) -> Result<Restaurant> {
        let restaurant = self
            .repository
            .get_by_id(id)?
            .ok_or_else(|| NotFound::new("Restaurant", id))?;
        if !self.authorization.authorize(&restaurant, operation) {
            return Err(Forbidden.into());
        }
        Ok(restaurant)
    }
}

impl<R: RestaurantsRepository, A: RestaurantAuthorization> Commandable<CreateDish>
    for DishService<R, A>
{
    fn execute(&self, command: CreateDish) -> Result<Id<Dish>> {
        info!("Creating dish {:?} for {}", command.name, command.restaurant_id);
        let mut restaurant = self.restaurant(&command.restaurant_id, ResourceOperation::Update)?;

        let mut dish = Dish::new(
            self.idgen.generate(),
            &command.name,
            &command.description,
            command.price,
        )?;
        dish.kilo_calories = command.kilo_calories;
        let id = dish.id();
        restaurant.dishes.push(dish);

        self.repository.save(&mut restaurant)?;
        Ok(id)
    }
}

impl<R: RestaurantsRepository, A: RestaurantAuthorization> Commandable<DeleteDishes>
    for DishService<R, A>
{
    fn execute(&self, command: DeleteDishes) -> Result<()> {
        info!("Removing all dishes from {}", command.restaurant_id);
        let mut restaurant = self.restaurant(&command.restaurant_id, ResourceOperation::Delete)?;
        if restaurant.dishes.is_empty() {
            return Ok(());
        }
        restaurant.dishes.clear();
        self.repository.save(&mut restaurant)
    }
}

impl<R: RestaurantsRepository, A: RestaurantAuthorization> Queryable<GetDishesForRestaurant>
    for DishService<R, A>
{
    fn query(&self, req: GetDishesForRestaurant) -> Result<Vec<Dish>> {
        let restaurant = self.restaurant(&req.restaurant_id, ResourceOperation::Read)?;
        Ok(restaurant.dishes)
    }
}

impl<R: RestaurantsRepository, A: RestaurantAuthorization> Queryable<GetDishById>
    for DishService<R, A>
{
    fn query(&self, req: GetDishById) -> Result<Dish> {
        let restaurant = self.restaurant(&req.restaurant_id, ResourceOperation::Read)?;
        let dish = restaurant
            .dish(&req.dish_id)
            .cloned()
            .ok_or_else(|| NotFound::new("Dish", &req.dish_id))?;
        Ok(dish)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::fakes::{Call, CallLog, FakeRepository, StubAuthorization};
    use rand::random;

    fn service(
        restaurants: Vec<Restaurant>,
        allow: bool,
    ) -> (DishService<FakeRepository, StubAuthorization>, FakeRepository, CallLog) {
        let log = CallLog::default();
        let repository = FakeRepository::with(restaurants, log.clone());
        let authorization = StubAuthorization::new(allow, log.clone());
        let service = DishService::new(repository.clone(), authorization);
        (service, repository, log)
    }

    fn soup(restaurant_id: Id<Restaurant>, price: Decimal) -> CreateDish {
        CreateDish {
            restaurant_id,
            name: "Żurek".to_string(),
            description: "Sour rye soup".to_string(),
            price,
            kilo_calories: Some(320),
        }
    }

    #[test]
    fn creates_dish_inside_restaurant() {
        let restaurant = Restaurant::with_id(random());
        let (service, repository, log) = service(vec![restaurant.clone()], true);

        let dish_id = service
            .execute(soup(restaurant.id(), Decimal::new(1250, 2)))
            .expect("create");

        let stored = repository.stored(&restaurant.id()).expect("stored");
        let dish = stored.dish(&dish_id).expect("dish");
        assert_eq!(dish.price(), Decimal::new(1250, 2));
        assert_eq!(dish.kilo_calories, Some(320));
        assert!(log
            .calls()
            .contains(&Call::Authorize(ResourceOperation::Update)));
    }

    #[test]
    fn rejects_negative_price() {
        let restaurant = Restaurant::with_id(random());
        let (service, repository, _) = service(vec![restaurant.clone()], true);

        let err = service
            .execute(soup(restaurant.id(), Decimal::new(-100, 2)))
            .expect_err("negative");

        assert!(err.downcast_ref::<InvalidDish>().is_some());
        assert_eq!(repository.saves(), 0);
    }

    #[test]
    fn creating_dish_for_someone_elses_restaurant_is_forbidden() {
        let restaurant = Restaurant::with_id(random());
        let (service, repository, _) = service(vec![restaurant.clone()], false);

        let err = service
            .execute(soup(restaurant.id(), Decimal::new(100, 2)))
            .expect_err("forbidden");

        assert!(err.downcast_ref::<Forbidden>().is_some());
        assert_eq!(repository.saves(), 0);
    }

    #[test]
    fn missing_dish_is_not_found() {
        let restaurant = Restaurant::with_id(random());
        let (service, _, _) = service(vec![restaurant.clone()], true);
        let dish_id = random::<Id<Dish>>();

        let err = service
            .query(GetDishById {
                restaurant_id: restaurant.id(),
                dish_id,
            })
            .expect_err("missing");

        assert_eq!(
            err.to_string(),
            format!("Dish with id: {} doesn't exist", dish_id)
        );
    }

    #[test]
    fn deletes_all_dishes() {
        let restaurant = Restaurant::with_id(random());
        let (service, repository, _) = service(vec![restaurant.clone()], true);
        for price in &[100, 200] {
            service
                .execute(soup(restaurant.id(), Decimal::new(*price, 2)))
                .expect("create");
        }

        service
            .execute(DeleteDishes {
                restaurant_id: restaurant.id(),
            })
            .expect("delete");

        let dishes = service
            .query(GetDishesForRestaurant {
                restaurant_id: restaurant.id(),
            })
            .expect("list");
        assert!(dishes.is_empty());
        assert_eq!(repository.saves(), 3);
    }
}
