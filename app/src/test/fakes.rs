//! Hand-written doubles for the service seams. Every fake shares a `CallLog`
//! so tests can assert on the order of interactions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use infra::ids::Id;
use infra::persistence::StoreUnavailable;

use crate::authorization::{ResourceOperation, RestaurantAuthorization};
use crate::restaurants::{
    Mapper, Restaurant, RestaurantsRepository, UpdateRestaurant, UpdateRestaurantMapper,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    GetById(Id<Restaurant>),
    GetAll,
    Create(Id<Restaurant>),
    Save(Id<Restaurant>),
    Delete(Id<Restaurant>),
    Authorize(ResourceOperation),
    Map(Id<Restaurant>),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn record(&self, call: Call) {
        self.0.lock().expect("lock call log").push(call)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.0.lock().expect("lock call log").clone()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakeRepository {
    restaurants: Arc<Mutex<BTreeMap<Id<Restaurant>, Restaurant>>>,
    saves: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
    log: CallLog,
}

impl FakeRepository {
    pub(crate) fn with(restaurants: Vec<Restaurant>, log: CallLog) -> Self {
        let restaurants = restaurants
            .into_iter()
            .map(|r| (r.id(), r))
            .collect::<BTreeMap<_, _>>();
        FakeRepository {
            restaurants: Arc::new(Mutex::new(restaurants)),
            saves: Arc::default(),
            fail_saves: Arc::default(),
            log,
        }
    }

    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self, id: &Id<Restaurant>) -> Option<Restaurant> {
        self.restaurants.lock().expect("lock").get(id).cloned()
    }

    pub(crate) fn all(&self) -> Vec<Restaurant> {
        self.restaurants.lock().expect("lock").values().cloned().collect()
    }

    pub(crate) fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst)
    }
}

impl RestaurantsRepository for FakeRepository {
    fn get_by_id(&self, id: &Id<Restaurant>) -> Result<Option<Restaurant>> {
        self.log.record(Call::GetById(*id));
        Ok(self.stored(id))
    }

    fn get_all(&self) -> Result<Vec<Restaurant>> {
        self.log.record(Call::GetAll);
        Ok(self.all())
    }

    fn create(&self, restaurant: &mut Restaurant) -> Result<Id<Restaurant>> {
        self.log.record(Call::Create(restaurant.id()));
        self.restaurants
            .lock()
            .expect("lock")
            .insert(restaurant.id(), restaurant.clone());
        Ok(restaurant.id())
    }

    fn save(&self, restaurant: &mut Restaurant) -> Result<()> {
        self.log.record(Call::Save(restaurant.id()));
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreUnavailable.into());
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.restaurants
            .lock()
            .expect("lock")
            .insert(restaurant.id(), restaurant.clone());
        Ok(())
    }

    fn delete(&self, restaurant: &Restaurant) -> Result<()> {
        self.log.record(Call::Delete(restaurant.id()));
        self.restaurants.lock().expect("lock").remove(&restaurant.id());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StubAuthorization {
    allow: bool,
    log: CallLog,
}

impl StubAuthorization {
    pub(crate) fn new(allow: bool, log: CallLog) -> Self {
        StubAuthorization { allow, log }
    }
}

impl RestaurantAuthorization for StubAuthorization {
    fn authorize(&self, _: &Restaurant, operation: ResourceOperation) -> bool {
        self.log.record(Call::Authorize(operation));
        self.allow
    }
}

/// Delegates to `UpdateRestaurantMapper`, remembering what it was given.
#[derive(Debug, Clone)]
pub(crate) struct RecordingMapper {
    seen: Arc<Mutex<Vec<(UpdateRestaurant, Restaurant)>>>,
    log: CallLog,
}

impl RecordingMapper {
    pub(crate) fn new(log: CallLog) -> Self {
        RecordingMapper {
            seen: Arc::default(),
            log,
        }
    }

    pub(crate) fn seen(&self) -> Vec<(UpdateRestaurant, Restaurant)> {
        self.seen.lock().expect("lock").clone()
    }
}

impl Mapper<UpdateRestaurant, Restaurant> for RecordingMapper {
    fn map(&self, command: &UpdateRestaurant, restaurant: &mut Restaurant) {
        self.log.record(Call::Map(restaurant.id()));
        self.seen
            .lock()
            .expect("lock")
            .push((command.clone(), restaurant.clone()));
        UpdateRestaurantMapper.map(command, restaurant)
    }
}
