//! Guarded with `#[cfg(test)]` from `lib.rs`

use anyhow::Result;
use rust_decimal::Decimal;

use infra::persistence::Storage;

use crate::config::SeedConfig;
use crate::dishes::{CreateDish, GetDishesForRestaurant};
use crate::errors::{ErrorKind, NotFound};
use crate::restaurants::{
    CreateRestaurant, DeleteRestaurant, GetAllRestaurants, GetRestaurantById, Restaurant,
    UpdateRestaurant,
};
use crate::roles::Role;
use crate::services::{Commandable, Queryable};
use crate::users::{IdentityStore, User};
use crate::RestaurantsApp;

pub(crate) mod fakes;

fn owner_session<M>(app: &RestaurantsApp<M>, email: &str) -> Result<crate::users::CurrentUser>
where
    M: r2d2::ManageConnection<Connection = infra::memory::MemStore>,
{
    let identity = app.identity();
    let id = identity.create_principal(User::new(email), "Owner1!x")?;
    identity.assign_role(&id, Role::Owner)?;
    Ok(app.login(email)?.expect("just created"))
}

#[test]
fn owner_creates_updates_and_deletes_restaurant() -> Result<()> {
    let (store, pool) = junk_drawer::memory_pool();
    let app = RestaurantsApp::new(pool);
    let owner = owner_session(&app, "owner@test.com")?;
    let restaurants = app.restaurants_for(Some(owner.clone()));

    let id = restaurants.execute(CreateRestaurant {
        name: "Pierogarnia".to_string(),
        description: "Dumplings".to_string(),
        category: "Polish".to_string(),
        city: "Kraków".to_string(),
        street: "Floriańska 1".to_string(),
        postal_code: "31-019".to_string(),
        owner_id: owner.id,
        ..Default::default()
    })?;
    app.dishes_for(Some(owner.clone())).execute(CreateDish {
        restaurant_id: id,
        name: "Ruskie".to_string(),
        description: "Potato and cheese".to_string(),
        price: Decimal::new(2400, 2),
        kilo_calories: None,
    })?;

    restaurants.execute(UpdateRestaurant {
        id,
        has_delivery: Some(true),
        ..Default::default()
    })?;
    let stored = restaurants.query(GetRestaurantById { id })?;
    assert_eq!(stored.name, "Pierogarnia");
    assert!(stored.has_delivery);
    assert_eq!(stored.dishes.len(), 1);

    let writes = store.write_count();
    restaurants.execute(DeleteRestaurant { id })?;
    assert_eq!(store.write_count(), writes + 1);

    let err = restaurants
        .query(GetRestaurantById { id })
        .expect_err("deleted");
    assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);
    let err = app
        .dishes_for(Some(owner))
        .query(GetDishesForRestaurant { restaurant_id: id })
        .expect_err("dishes went with it");
    assert!(err.downcast_ref::<NotFound>().is_some());
    Ok(())
}

#[test]
fn strangers_cannot_update_but_admins_can_delete() -> Result<()> {
    let (_, pool) = junk_drawer::memory_pool();
    let app = RestaurantsApp::new(pool);
    app.seed(&SeedConfig::default())?;
    let kfc = app
        .restaurants_for(None)
        .query(GetAllRestaurants {
            search_phrase: Some("kfc".to_string()),
            ..Default::default()
        })?
        .items
        .remove(0);

    let stranger = owner_session(&app, "stranger@test.com")?;
    let err = app
        .restaurants_for(Some(stranger))
        .execute(UpdateRestaurant {
            id: kfc.id(),
            name: Some("Mine now".to_string()),
            ..Default::default()
        })
        .expect_err("forbidden");
    assert_eq!(ErrorKind::of(&err).status_code(), 403);

    let admin = app.login("admin@test.com")?.expect("seeded admin");
    app.restaurants_for(Some(admin))
        .execute(DeleteRestaurant { id: kfc.id() })?;

    let docs = app.pool().get()?;
    assert_eq!(docs.list::<Restaurant>()?.len(), 1);
    Ok(())
}

#[test]
#[ignore]
fn seeds_postgres_once() -> Result<()> {
    let pool = junk_drawer::pool("seeds_postgres_once")?;
    let app = RestaurantsApp::new(pool);

    app.seed(&SeedConfig::default())?;
    app.seed(&SeedConfig::default())?;

    let docs = app.pool().get()?;
    assert_eq!(docs.list::<Restaurant>()?.len(), 2);
    assert!(app.identity().user_exists("admin@test.com")?);
    Ok(())
}
