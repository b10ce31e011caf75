use anyhow::Result;
use log::*;

use infra::ids::Id;

use super::models::{Address, Restaurant};
use super::repository::RestaurantsRepository;
use super::RestaurantService;
use crate::authorization::{ResourceOperation, RestaurantAuthorization};
use crate::errors::{Forbidden, NotFound};
use crate::services::{Cancellation, Commandable, Request};
use crate::users::User;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateRestaurant {
    pub name: String,
    pub description: String,
    pub category: String,
    pub has_delivery: bool,
    pub contact_email: Option<String>,
    pub contact_number: Option<String>,
    pub city: String,
    pub street: String,
    pub postal_code: String,
    pub owner_id: Id<User>,
}

/// Partial update: fields left as `None` keep their stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateRestaurant {
    pub id: Id<Restaurant>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub has_delivery: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRestaurant {
    pub id: Id<Restaurant>,
}

/// Copies the fields carried by `source` onto `target` in place.
pub trait Mapper<S, T> {
    fn map(&self, source: &S, target: &mut T);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateRestaurantMapper;

impl Mapper<UpdateRestaurant, Restaurant> for UpdateRestaurantMapper {
    fn map(&self, command: &UpdateRestaurant, restaurant: &mut Restaurant) {
        if let Some(name) = &command.name {
            restaurant.name = name.clone();
        }
        if let Some(description) = &command.description {
            restaurant.description = description.clone();
        }
        if let Some(has_delivery) = command.has_delivery {
            restaurant.has_delivery = has_delivery;
        }
    }
}

impl Request for CreateRestaurant {
    type Resp = Id<Restaurant>;
}

impl Request for UpdateRestaurant {
    type Resp = ();
}

impl Request for DeleteRestaurant {
    type Resp = ();
}

impl<R, A, M> RestaurantService<R, A, M>
where
    R: RestaurantsRepository,
    A: RestaurantAuthorization,
    M: Mapper<UpdateRestaurant, Restaurant>,
{
    pub fn update(&self, command: UpdateRestaurant, cancel: &Cancellation) -> Result<()> {
        info!("Updating restaurant {}", command.id);
        let mut restaurant = self
            .repository
            .get_by_id(&command.id)?
            .ok_or_else(|| NotFound::new("Restaurant", &command.id))?;

        if !self
            .authorization
            .authorize(&restaurant, ResourceOperation::Update)
        {
            return Err(Forbidden.into());
        }

        self.mapper.map(&command, &mut restaurant);
        cancel.check()?;
        self.repository.save(&mut restaurant)?;
        debug!("Updated {:?}", restaurant);
        Ok(())
    }
}

impl<R, A, M> Commandable<UpdateRestaurant> for RestaurantService<R, A, M>
where
    R: RestaurantsRepository,
    A: RestaurantAuthorization,
    M: Mapper<UpdateRestaurant, Restaurant>,
{
    fn execute(&self, command: UpdateRestaurant) -> Result<()> {
        self.update(command, &Cancellation::new())
    }
}

impl<R, A, M> Commandable<CreateRestaurant> for RestaurantService<R, A, M>
where
    R: RestaurantsRepository,
    A: RestaurantAuthorization,
{
    fn execute(&self, command: CreateRestaurant) -> Result<Id<Restaurant>> {
        info!("Creating restaurant {:?}", command.name);
        let CreateRestaurant {
            name,
            description,
            category,
            has_delivery,
            contact_email,
            contact_number,
            city,
            street,
            postal_code,
            owner_id,
        } = command;

        let mut restaurant = Restaurant::with_id(self.idgen.generate());
        restaurant.name = name;
        restaurant.description = description;
        restaurant.category = category;
        restaurant.has_delivery = has_delivery;
        restaurant.contact_email = contact_email;
        restaurant.contact_number = contact_number;
        restaurant.address = Address {
            city,
            street,
            postal_code,
        };
        restaurant.owner_id = Some(owner_id);

        if !self
            .authorization
            .authorize(&restaurant, ResourceOperation::Create)
        {
            return Err(Forbidden.into());
        }

        self.repository.create(&mut restaurant)
    }
}

impl<R, A, M> Commandable<DeleteRestaurant> for RestaurantService<R, A, M>
where
    R: RestaurantsRepository,
    A: RestaurantAuthorization,
{
    fn execute(&self, command: DeleteRestaurant) -> Result<()> {
        info!("Deleting restaurant {}", command.id);
        let restaurant = self
            .repository
            .get_by_id(&command.id)?
            .ok_or_else(|| NotFound::new("Restaurant", &command.id))?;

        if !self
            .authorization
            .authorize(&restaurant, ResourceOperation::Delete)
        {
            return Err(Forbidden.into());
        }

        self.repository.delete(&restaurant)
    }
}
