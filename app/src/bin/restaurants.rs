use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::*;
use r2d2::{ManageConnection, Pool};
use serde::Deserialize;
use structopt::StructOpt;

use infra::ids::Id;
use infra::persistence::{Migrations, Storage};
use restaurants::config::{EnvLogger, StoreConfig};
use restaurants::dishes::GetDishesForRestaurant;
use restaurants::errors::ErrorKind;
use restaurants::restaurants::{
    GetAllRestaurants, GetRestaurantById, Restaurant, SortBy, UpdateRestaurant,
};
use restaurants::services::{Commandable, Queryable};
use restaurants::RestaurantsApp;

#[derive(Debug, StructOpt)]
#[structopt(name = "restaurants", about = "Restaurants CLI")]
struct Opt {
    /// Configuration file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
    #[structopt(subcommand)]
    command: Commands,
}

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "seed", about = "Apply upgrades and seed sample data")]
    Seed,
    #[structopt(name = "list", about = "List restaurants")]
    List {
        #[structopt(long = "search")]
        search: Option<String>,
        #[structopt(long = "page", default_value = "1")]
        page: usize,
        #[structopt(long = "page-size", default_value = "10")]
        page_size: usize,
    },
    #[structopt(name = "show", about = "Show a restaurant and its dishes")]
    Show { id: Id<Restaurant> },
    #[structopt(name = "update", about = "Update a restaurant")]
    Update {
        id: Id<Restaurant>,
        /// Email of the acting user
        #[structopt(long = "as")]
        user: String,
        #[structopt(long = "name")]
        name: Option<String>,
        #[structopt(long = "description")]
        description: Option<String>,
        #[structopt(long = "delivery")]
        has_delivery: Option<bool>,
    },
    #[structopt(name = "pending-upgrades", about = "List unapplied schema upgrades")]
    PendingUpgrades,
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    restaurants: restaurants::config::Config,
    #[serde(default)]
    env_logger: EnvLogger,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let mut config_buf = String::new();
    File::open(&opt.config)
        .and_then(|mut f| f.read_to_string(&mut config_buf))
        .with_context(|| format!("read {:?}", opt.config))?;
    let mut config: Config = toml::from_str(&config_buf)?;
    config.restaurants.apply_env()?;

    config.env_logger.builder().init();
    debug!("Options: {:?}", opt);

    match &config.restaurants.store {
        StoreConfig::Postgres(pg) => run(pg.build()?, &config.restaurants, opt.command),
        StoreConfig::Memory(mem) => run(mem.build(), &config.restaurants, opt.command),
    }
}

fn run<M, D>(pool: Pool<M>, config: &restaurants::config::Config, command: Commands) -> Result<()>
where
    M: ManageConnection<Connection = D>,
    D: Storage + Migrations + Send + 'static,
{
    let app = RestaurantsApp::new(pool);
    let seeding = match &command {
        Commands::Seed => true,
        Commands::PendingUpgrades => false,
        _ => config.seed.on_startup,
    };
    if seeding {
        app.seed(&config.seed)?;
    }

    let res = match command {
        Commands::Seed => Ok(()),
        Commands::List {
            search,
            page,
            page_size,
        } => list(&app, search, page, page_size),
        Commands::Show { id } => show(&app, id),
        Commands::Update {
            id,
            user,
            name,
            description,
            has_delivery,
        } => {
            let user = app
                .login(&user)?
                .with_context(|| format!("no such user: {}", user))?;
            app.restaurants_for(Some(user)).execute(UpdateRestaurant {
                id,
                name,
                description,
                has_delivery,
            })
        }
        Commands::PendingUpgrades => {
            for version in app.pool().get()?.pending_upgrades()? {
                println!("{}", version);
            }
            Ok(())
        }
    };

    if let Err(e) = &res {
        error!("Failed ({}): {}", ErrorKind::of(e).status_code(), e);
    }
    res
}

fn list<M, D>(
    app: &RestaurantsApp<M>,
    search: Option<String>,
    page: usize,
    page_size: usize,
) -> Result<()>
where
    M: ManageConnection<Connection = D>,
    D: Storage + Send + 'static,
{
    let result = app.restaurants_for(None).query(GetAllRestaurants {
        search_phrase: search,
        page_number: page,
        page_size,
        sort_by: Some(SortBy::Name),
        ..Default::default()
    })?;
    for restaurant in &result.items {
        println!(
            "{}: {} ({}, {})",
            restaurant.id(),
            restaurant.name,
            restaurant.category,
            restaurant.address.city
        );
    }
    println!(
        "{}-{} of {} (page {} of {})",
        result.items_from,
        result.items_to.min(result.total_items),
        result.total_items,
        page,
        result.total_pages
    );
    Ok(())
}

fn show<M, D>(app: &RestaurantsApp<M>, id: Id<Restaurant>) -> Result<()>
where
    M: ManageConnection<Connection = D>,
    D: Storage + Send + 'static,
{
    let restaurant = app.restaurants_for(None).query(GetRestaurantById { id })?;
    let created: DateTime<Utc> = id.untyped().timestamp().into();
    println!("{}: {}", restaurant.id(), restaurant.name);
    println!("  created: {}", created.to_rfc3339());
    println!("  category: {}", restaurant.category);
    println!("  delivery: {}", restaurant.has_delivery);
    println!(
        "  address: {}, {} {}",
        restaurant.address.street, restaurant.address.postal_code, restaurant.address.city
    );
    if let Some(email) = &restaurant.contact_email {
        println!("  contact: {}", email);
    }

    let dishes = app
        .dishes_for(None)
        .query(GetDishesForRestaurant { restaurant_id: id })?;
    for dish in dishes {
        println!("  - {} ({}): {}", dish.name, dish.price(), dish.description);
    }
    Ok(())
}
