use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use infra::documents::{DocMeta, HasMeta};
use infra::ids::{Entity, Id};

use crate::dishes::InvalidDish;
use crate::users::User;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Restaurant {
    #[serde(flatten)]
    pub(crate) meta: DocMeta<Restaurant>,
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    pub has_delivery: bool,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub dishes: Vec<Dish>,
    #[serde(default)]
    pub owner_id: Option<Id<User>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    pub city: String,
    pub street: String,
    pub postal_code: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Dish {
    pub(crate) id: Id<Dish>,
    pub name: String,
    pub description: String,
    price: Decimal,
    #[serde(default)]
    pub kilo_calories: Option<u32>,
}

impl Restaurant {
    pub fn with_id(id: Id<Restaurant>) -> Self {
        Restaurant {
            meta: DocMeta::new_with_id(id),
            ..Default::default()
        }
    }

    pub fn id(&self) -> Id<Restaurant> {
        self.meta.id
    }

    pub fn is_owned_by(&self, user: &Id<User>) -> bool {
        self.owner_id.as_ref() == Some(user)
    }

    pub fn dish(&self, id: &Id<Dish>) -> Option<&Dish> {
        self.dishes.iter().find(|dish| dish.id == *id)
    }
}

impl Dish {
    pub fn new(
        id: Id<Dish>,
        name: &str,
        description: &str,
        price: Decimal,
    ) -> Result<Self, InvalidDish> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(InvalidDish::NegativePrice(price));
        }
        Ok(Dish {
            id,
            name: name.to_string(),
            description: description.to_string(),
            price,
            kilo_calories: None,
        })
    }

    pub fn id(&self) -> Id<Dish> {
        self.id
    }

    pub fn price(&self) -> Decimal {
        self.price
    }
}

impl Entity for Restaurant {
    const PREFIX: &'static str = "restaurant";
}

impl HasMeta for Restaurant {
    fn meta(&self) -> &DocMeta<Self> {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut DocMeta<Self> {
        &mut self.meta
    }
}

impl Entity for Dish {
    const PREFIX: &'static str = "dish";
}
