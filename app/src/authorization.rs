use log::*;

use crate::restaurants::Restaurant;
use crate::roles::Role;
use crate::users::CurrentUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOperation {
    Create,
    Read,
    Update,
    Delete,
}

pub trait RestaurantAuthorization {
    fn authorize(&self, restaurant: &Restaurant, operation: ResourceOperation) -> bool;
}

/// Ownership and role based policy for the acting principal. Anonymous
/// callers may only read.
#[derive(Debug, Clone, Default)]
pub struct RestaurantAuthorizationService {
    user: Option<CurrentUser>,
}

impl RestaurantAuthorizationService {
    pub fn new(user: Option<CurrentUser>) -> Self {
        RestaurantAuthorizationService { user }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }
}

impl RestaurantAuthorization for RestaurantAuthorizationService {
    fn authorize(&self, restaurant: &Restaurant, operation: ResourceOperation) -> bool {
        let user = match &self.user {
            Some(user) => user,
            None => {
                debug!("Anonymous {:?} on {}", operation, restaurant.id());
                return operation == ResourceOperation::Read;
            }
        };

        debug!(
            "Authorizing user {} to {:?} restaurant {}",
            user.email,
            operation,
            restaurant.id()
        );
        let owner = restaurant.is_owned_by(&user.id);
        let allowed = match operation {
            ResourceOperation::Read => true,
            ResourceOperation::Create => user.is_in_role(Role::Owner) && owner,
            ResourceOperation::Update => owner,
            ResourceOperation::Delete => owner || user.is_in_role(Role::Admin),
        };
        if !allowed {
            info!(
                "Denied {:?} on {} for {}",
                operation,
                restaurant.id(),
                user.email
            );
        }
        allowed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::users::User;
    use maplit::btreeset;
    use rand::random;

    fn user(email: &str, roles: &[Role]) -> CurrentUser {
        CurrentUser::new(User::id_for(email), email, roles.iter().copied().collect())
    }

    fn owned_by(owner: &CurrentUser) -> Restaurant {
        let mut restaurant = Restaurant::with_id(random());
        restaurant.owner_id = Some(owner.id);
        restaurant
    }

    #[test]
    fn anonymous_may_only_read() {
        let owner = user("owner@test.com", &[Role::Owner]);
        let restaurant = owned_by(&owner);
        let service = RestaurantAuthorizationService::anonymous();

        assert!(service.authorize(&restaurant, ResourceOperation::Read));
        assert!(!service.authorize(&restaurant, ResourceOperation::Update));
        assert!(!service.authorize(&restaurant, ResourceOperation::Delete));
        assert!(!service.authorize(&restaurant, ResourceOperation::Create));
    }

    #[test]
    fn only_the_owner_may_update() {
        let owner = user("owner@test.com", &[Role::Owner]);
        let admin = user("admin@test.com", &[Role::Admin]);
        let restaurant = owned_by(&owner);

        assert!(RestaurantAuthorizationService::new(Some(owner))
            .authorize(&restaurant, ResourceOperation::Update));
        assert!(!RestaurantAuthorizationService::new(Some(admin))
            .authorize(&restaurant, ResourceOperation::Update));
    }

    #[test]
    fn owner_or_admin_may_delete() {
        let owner = user("owner@test.com", &[Role::Owner]);
        let admin = user("admin@test.com", &[Role::Admin]);
        let stranger = user("someone@test.com", &[Role::User]);
        let restaurant = owned_by(&owner);

        for (principal, expected) in vec![(owner, true), (admin, true), (stranger, false)] {
            let service = RestaurantAuthorizationService::new(Some(principal));
            assert_eq!(
                service.authorize(&restaurant, ResourceOperation::Delete),
                expected
            );
        }
    }

    #[test]
    fn create_requires_owner_role_and_self_ownership() {
        let owner = user("owner@test.com", &[Role::Owner]);
        let plain = user("plain@test.com", &[]);
        let other = CurrentUser {
            roles: btreeset! {Role::Owner},
            ..user("other@test.com", &[])
        };

        let service = RestaurantAuthorizationService::new(Some(owner.clone()));
        assert!(service.authorize(&owned_by(&owner), ResourceOperation::Create));
        assert!(!service.authorize(&owned_by(&other), ResourceOperation::Create));

        let service = RestaurantAuthorizationService::new(Some(plain.clone()));
        assert!(!service.authorize(&owned_by(&plain), ResourceOperation::Create));
    }
}
