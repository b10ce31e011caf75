use std::cmp::Ordering;

use anyhow::Result;
use log::*;

use infra::ids::Id;

use super::models::Restaurant;
use super::repository::RestaurantsRepository;
use super::RestaurantService;
use crate::authorization::{ResourceOperation, RestaurantAuthorization};
use crate::errors::{Forbidden, NotFound};
use crate::services::{Queryable, Request};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRestaurantById {
    pub id: Id<Restaurant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAllRestaurants {
    pub search_phrase: Option<String>,
    /// One based.
    pub page_number: usize,
    pub page_size: usize,
    pub sort_by: Option<SortBy>,
    pub sort_direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Name,
    Category,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total_items: usize,
    pub total_pages: usize,
    pub items_from: usize,
    pub items_to: usize,
}

impl Default for GetAllRestaurants {
    fn default() -> Self {
        GetAllRestaurants {
            search_phrase: None,
            page_number: 1,
            page_size: 10,
            sort_by: None,
            sort_direction: SortDirection::Ascending,
        }
    }
}

impl GetAllRestaurants {
    fn matches(&self, restaurant: &Restaurant) -> bool {
        match &self.search_phrase {
            Some(phrase) if !phrase.trim().is_empty() => {
                let phrase = phrase.trim().to_lowercase();
                restaurant.name.to_lowercase().contains(&phrase)
                    || restaurant.description.to_lowercase().contains(&phrase)
            }
            _ => true,
        }
    }

    fn compare(&self, a: &Restaurant, b: &Restaurant) -> Ordering {
        let ordering = match self.sort_by {
            Some(SortBy::Name) => a.name.cmp(&b.name),
            Some(SortBy::Category) => a.category.cmp(&b.category),
            Some(SortBy::Description) => a.description.cmp(&b.description),
            None => Ordering::Equal,
        };
        match self.sort_direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total_items: usize, page_size: usize, page_number: usize) -> Self {
        let page_size = page_size.max(1);
        let page_number = page_number.max(1);
        let items_from = page_size.saturating_mul(page_number - 1).saturating_add(1);
        let mut total_pages = total_items / page_size;
        if total_items % page_size != 0 {
            total_pages += 1;
        }
        PagedResult {
            items,
            total_items,
            total_pages,
            items_from,
            items_to: items_from.saturating_add(page_size - 1),
        }
    }
}

impl Request for GetRestaurantById {
    type Resp = Restaurant;
}

impl Request for GetAllRestaurants {
    type Resp = PagedResult<Restaurant>;
}

impl<R, A, M> Queryable<GetRestaurantById> for RestaurantService<R, A, M>
where
    R: RestaurantsRepository,
    A: RestaurantAuthorization,
{
    fn query(&self, req: GetRestaurantById) -> Result<Restaurant> {
        let restaurant = self
            .repository
            .get_by_id(&req.id)?
            .ok_or_else(|| NotFound::new("Restaurant", &req.id))?;
        if !self
            .authorization
            .authorize(&restaurant, ResourceOperation::Read)
        {
            return Err(Forbidden.into());
        }
        Ok(restaurant)
    }
}

impl<R, A, M> Queryable<GetAllRestaurants> for RestaurantService<R, A, M>
where
    R: RestaurantsRepository,
{
    fn query(&self, req: GetAllRestaurants) -> Result<PagedResult<Restaurant>> {
        let mut matching = self
            .repository
            .get_all()?
            .into_iter()
            .filter(|restaurant| req.matches(restaurant))
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| req.compare(a, b));

        let total = matching.len();
        let page_size = req.page_size.max(1);
        let skip = page_size.saturating_mul(req.page_number.max(1) - 1);
        let items = matching
            .into_iter()
            .skip(skip)
            .take(page_size)
            .collect::<Vec<_>>();
        debug!(
            "Query {:?} matched {} restaurants, returning {}",
            req.search_phrase,
            total,
            items.len()
        );

        Ok(PagedResult::new(items, total, page_size, req.page_number))
    }
}
