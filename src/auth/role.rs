use moka::future::Cache;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::model::role::Role;
use crate::store::{SqlValue, Store, StoreResult};
use crate::utils::generation::Generation;

/// Outcome of asking the store for a principal's role. The caller decides what
/// an unresolved role means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleLookupResult {
    Resolved(Role),
    Unresolved,
}

impl RoleLookupResult {
    pub fn or(self, default: Role) -> Role {
        match self {
            RoleLookupResult::Resolved(role) => role,
            RoleLookupResult::Unresolved => default,
        }
    }
}

impl From<StoreResult<Option<String>>> for RoleLookupResult {
    fn from(result: StoreResult<Option<String>>) -> Self {
        match result {
            Ok(Some(name)) => match Role::from_str(&name) {
                Ok(role) => RoleLookupResult::Resolved(role),
                Err(_) => {
                    warn!(role = %name, "Unknown role name");
                    RoleLookupResult::Unresolved
                }
            },
            Ok(None) => RoleLookupResult::Unresolved,
            Err(e) => {
                error!(error = %e, "Role lookup failed");
                RoleLookupResult::Unresolved
            }
        }
    }
}

/// Resolves roles through the `get_user_role` stored function, caching hits.
pub struct RoleResolver {
    store: Store,
    cache: Cache<u64, Role>,
    generation: Generation,
}

impl RoleResolver {
    pub fn new(store: Store, ttl: Duration) -> Self {
        Self {
            store,
            cache: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(ttl)
                .build(),
            generation: Generation::default(),
        }
    }

    pub async fn resolve(&self, user_id: u64) -> RoleLookupResult {
        if let Some(role) = self.cache.get(&user_id).await {
            return RoleLookupResult::Resolved(role);
        }

        let ticket = self.generation.current();
        let result: RoleLookupResult = self
            .store
            .rpc::<String>("get_user_role", vec![SqlValue::U64(user_id)])
            .await
            .into();

        if let RoleLookupResult::Resolved(role) = result {
            self.remember(user_id, role, ticket).await;
        }
        result
    }

    /// Caches a lookup unless an invalidation happened while it was in flight.
    /// The ticket is checked after the write; a stale entry is removed again.
    async fn remember(&self, user_id: u64, role: Role, ticket: u64) -> bool {
        self.cache.insert(user_id, role).await;
        self.confirm(user_id, ticket).await
    }

    /// Drops an entry written under a ticket that has since gone stale.
    async fn confirm(&self, user_id: u64, ticket: u64) -> bool {
        if self.generation.is_current(ticket) {
            return true;
        }
        debug!(user_id, "Discarding stale role lookup");
        self.cache.invalidate(&user_id).await;
        false
    }

    /// Call after a role changes so the next request sees it.
    pub async fn invalidate(&self, user_id: u64) {
        self.generation.bump();
        self.cache.invalidate(&user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StoreError, tests::lazy_store};

    #[test]
    fn missing_role_is_unresolved_and_caller_picks_the_default() {
        let lookup: StoreResult<Option<String>> = Ok(None);
        let result = RoleLookupResult::from(lookup);
        assert_eq!(result, RoleLookupResult::Unresolved);
        assert_eq!(result.or(Role::Employee), Role::Employee);
    }

    #[test]
    fn failed_lookup_is_unresolved_not_an_error() {
        let lookup: StoreResult<Option<String>> = Err(StoreError::NoRows);
        let result = RoleLookupResult::from(lookup);
        assert_eq!(result, RoleLookupResult::Unresolved);
    }

    #[test]
    fn unknown_role_names_are_unresolved() {
        let lookup: StoreResult<Option<String>> = Ok(Some("superuser".to_string()));
        let result = RoleLookupResult::from(lookup);
        assert_eq!(result, RoleLookupResult::Unresolved);
    }

    #[test]
    fn known_role_names_resolve() {
        let lookup: StoreResult<Option<String>> = Ok(Some("hr".to_string()));
        let result = RoleLookupResult::from(lookup);
        assert_eq!(result.or(Role::Employee), Role::Hr);
    }

    #[actix_web::test]
    async fn stale_lookups_do_not_populate_the_cache() {
        let resolver = RoleResolver::new(lazy_store(), Duration::from_secs(60));

        let ticket = resolver.generation.current();
        resolver.invalidate(9).await;
        assert!(!resolver.remember(9, Role::Admin, ticket).await);

        let fresh = resolver.generation.current();
        assert!(resolver.remember(9, Role::Hr, fresh).await);
        assert_eq!(resolver.resolve(9).await, RoleLookupResult::Resolved(Role::Hr));
    }

    #[actix_web::test]
    async fn insert_landing_after_an_invalidation_is_dropped() {
        let resolver = RoleResolver::new(lazy_store(), Duration::from_secs(60));

        // a worker read `admin` and passed its generation check ...
        let ticket = resolver.generation.current();
        // ... another worker demotes the user ...
        resolver.invalidate(9).await;
        // ... and only then does the first worker's write reach the cache
        resolver.cache.insert(9, Role::Admin).await;

        assert!(!resolver.confirm(9, ticket).await);
        assert_eq!(resolver.cache.get(&9).await, None);
    }

    #[actix_web::test]
    async fn unreachable_store_leaves_role_unresolved() {
        let resolver = RoleResolver::new(lazy_store(), Duration::from_secs(60));
        assert_eq!(resolver.resolve(1).await, RoleLookupResult::Unresolved);
    }
}
