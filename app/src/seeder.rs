use std::sync::Arc;

use anyhow::Result;
use log::*;
use r2d2::{ManageConnection, Pool};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use infra::documents::{DocMeta, HasMeta};
use infra::ids::{Entity, Id, IdGen};
use infra::persistence::{Migrations, Storage};

use crate::config::SeedConfig;
use crate::restaurants::{Address, Dish, Restaurant};
use crate::roles::Role;
use crate::users::{IdentityStore, NoIdentity, User};

const SAMPLE_NAMES: [&str; 2] = ["KFC", "MCDonald"];
const RESTAURANTS_STEP: &str = "restaurants";

/// Startup provisioning. Each step checks its own precondition, so running
/// it against an already seeded store writes nothing, and rerunning after a
/// failed write fills in whatever is missing.
#[derive(Debug)]
pub struct Seeder<M: ManageConnection, I = NoIdentity> {
    db: Pool<M>,
    identity: Option<I>,
    config: SeedConfig,
    idgen: Arc<IdGen>,
}

/// Written once a seed step has stored everything it owns.
#[derive(Deserialize, Serialize, Debug, Clone)]
struct SeedMarker {
    #[serde(flatten)]
    meta: DocMeta<SeedMarker>,
    step: String,
}

impl Entity for SeedMarker {
    const PREFIX: &'static str = "seed";
}

impl HasMeta for SeedMarker {
    fn meta(&self) -> &DocMeta<Self> {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut DocMeta<Self> {
        &mut self.meta
    }
}

impl SeedMarker {
    fn id_for(step: &str) -> Id<SeedMarker> {
        Id::hashed(step)
    }

    fn new(step: &str) -> Self {
        SeedMarker {
            meta: DocMeta::new_with_id(SeedMarker::id_for(step)),
            step: step.to_string(),
        }
    }
}

fn sample_id(name: &str) -> Id<Restaurant> {
    Id::hashed(name)
}

impl<M: ManageConnection> Seeder<M, NoIdentity> {
    /// Sample restaurants only, with no owner, roles or admin.
    pub fn without_identity(db: Pool<M>, config: SeedConfig) -> Self {
        Seeder {
            db,
            identity: None,
            config,
            idgen: Arc::new(IdGen::new()),
        }
    }
}

impl<M: ManageConnection, I> Seeder<M, I> {
    pub fn with_identity(db: Pool<M>, identity: I, config: SeedConfig) -> Self {
        Seeder {
            db,
            identity: Some(identity),
            config,
            idgen: Arc::new(IdGen::new()),
        }
    }

    pub fn with_idgen(self, idgen: Arc<IdGen>) -> Self {
        Seeder { idgen, ..self }
    }
}

impl<M, D, I> Seeder<M, I>
where
    M: ManageConnection<Connection = D>,
    D: Storage + Migrations + Send + 'static,
    I: IdentityStore,
{
    pub fn seed(&self) -> Result<()> {
        let docs = match self.db.get() {
            Ok(docs) => docs,
            Err(e) => {
                warn!("Store unreachable, skipping seed: {}", e);
                return Ok(());
            }
        };

        let pending = docs.pending_upgrades()?;
        if !pending.is_empty() {
            info!("Applying pending upgrades: {:?}", pending);
            docs.apply_upgrades()?;
        }

        if !docs.can_connect() {
            warn!("Store cannot be reached, skipping seed");
            return Ok(());
        }

        if docs
            .load::<SeedMarker>(&SeedMarker::id_for(RESTAURANTS_STEP))?
            .is_none()
        {
            self.seed_restaurants(&*docs)?;
        }

        if let Some(identity) = &self.identity {
            // Only stores the roles that are missing.
            identity.add_roles(&Role::ALL)?;

            let email = &self.config.admin_email;
            if !identity.user_exists(email)? {
                let mut admin = User::new(email);
                admin.roles.insert(Role::Admin);
                identity.create_principal(admin, &self.config.admin_credential)?;
                info!("Seeded admin {}", email);
            }
        }

        Ok(())
    }

    fn seed_restaurants(&self, docs: &D) -> Result<()> {
        let mut present = 0;
        for name in SAMPLE_NAMES.iter() {
            if docs.load::<Restaurant>(&sample_id(name))?.is_some() {
                present += 1;
            }
        }
        if present == 0 && docs.any::<Restaurant>()? {
            info!("Store already holds restaurants, leaving samples out");
            return Ok(());
        }

        if present < SAMPLE_NAMES.len() {
            let owner = match &self.identity {
                Some(identity) => Some(self.seed_owner(docs, identity)?),
                None => None,
            };
            for mut restaurant in self.sample_restaurants(owner)? {
                if docs.load::<Restaurant>(&restaurant.id())?.is_some() {
                    continue;
                }
                docs.save(&mut restaurant)?;
                info!("Seeded restaurant {} as {}", restaurant.name, restaurant.id());
            }
        }

        docs.save(&mut SeedMarker::new(RESTAURANTS_STEP))
    }

    fn seed_owner(&self, docs: &D, identity: &I) -> Result<Id<User>> {
        let email = &self.config.owner_email;
        if let Some(user) = identity.find_user(email)? {
            return Ok(user.id());
        }
        let mut owner = User::new(email);
        owner.roles.insert(Role::Owner);
        docs.save(&mut owner)?;
        debug!("Seeded restaurant owner {}", email);
        Ok(owner.id())
    }

    fn sample_restaurants(&self, owner: Option<Id<User>>) -> Result<Vec<Restaurant>> {
        let mut kfc = Restaurant::with_id(sample_id("KFC"));
        kfc.name = "KFC".to_string();
        kfc.category = "Fast Food".to_string();
        kfc.description = "KFC (short for Kentucky Fried Chicken)".to_string();
        kfc.contact_email = Some("contack@kfc.com".to_string());
        kfc.has_delivery = true;
        kfc.owner_id = owner;
        kfc.address = Address {
            city: "Kraków".to_string(),
            street: "Długa 5".to_string(),
            postal_code: "30-001".to_string(),
        };
        kfc.dishes = vec![
            Dish::new(
                self.idgen.generate(),
                "Nashville Hot Chicken",
                "Nashville Hot Chicken (10 pcs.)",
                Decimal::new(1030, 2),
            )?,
            Dish::new(
                self.idgen.generate(),
                "Chicken Nuggets",
                "Chicken Nuggets (5pcs)",
                Decimal::new(530, 2),
            )?,
        ];

        let mut mcdonald = Restaurant::with_id(sample_id("MCDonald"));
        mcdonald.name = "MCDonald".to_string();
        mcdonald.category = "Fast Food".to_string();
        mcdonald.description = "MCDonald".to_string();
        mcdonald.contact_email = Some("contack@mc.com".to_string());
        mcdonald.has_delivery = true;
        mcdonald.owner_id = owner;
        mcdonald.address = Address {
            city: "Rzeszów".to_string(),
            street: "Długa 5".to_string(),
            postal_code: "30-001".to_string(),
        };

        Ok(vec![kfc, mcdonald])
    }
}
