//! The authentication manager: drives the identity handler chain and assembles the
//! authorization context of a request.
//!
//! # Resolution
//!
//! Each request moves through a fresh, strictly forward sequence of states:
//!
//! ```text
//! UNAUTHENTICATED → TRYING[0] → TRYING[1] → ... → TRYING[n-1] → EXHAUSTED  (NotAuthenticated)
//!                        └────────────┴──────────────┴────────→ AUTHENTICATED
//!                                                                   │
//!                                       roles → ACL → AuthorizationContext published
//! ```
//!
//! Handlers are tried one at a time in registration order and the first one producing an
//! identity wins. A handler error is logged and the chain moves on. Once an identity is found,
//! roles are resolved from the role store and the ACL from the ACL store; a failure of either
//! lookup fails the whole request closed.
//!
//! Nothing is published to the [`RequestContext`] until the context is complete, so dropping
//! the resolution future (client disconnect, timeout) never leaves a partial context behind.

use crate::{
    auth::{
        acl::AclResolver,
        context::AuthorizationContext,
        handlers::create_handlers,
        identity::{IdentityHandler, IdentityProfile, RequestContext},
        roles::resolve_roles,
    },
    config::AuthConfig,
    errors::{Error, HandlerError, Result},
    store::{AclStore, RoleStore},
    types::Role,
};
use axum::http::request::Parts;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, trace};

fn record_attempt(handler: &'static str, outcome: &'static str) {
    metrics::counter!("aclgate_auth_attempts_total", "handler" => handler, "outcome" => outcome).increment(1);
}

pub struct AuthenticationManager {
    handlers: Vec<Box<dyn IdentityHandler>>,
    role_store: Arc<dyn RoleStore>,
    acl: AclResolver,
    scope_entity_types: BTreeSet<String>,
}

impl AuthenticationManager {
    /// Create a manager over an ordered, non-empty handler chain.
    pub fn create(
        handlers: Vec<Box<dyn IdentityHandler>>,
        role_store: Arc<dyn RoleStore>,
        acl_store: Arc<dyn AclStore>,
        scope_entity_types: BTreeSet<String>,
    ) -> Result<Self> {
        if handlers.is_empty() {
            return Err(Error::InvalidConfiguration {
                message: "No handlers provided".to_string(),
            });
        }

        Ok(Self {
            handlers,
            role_store,
            acl: AclResolver::new(acl_store),
            scope_entity_types,
        })
    }

    /// Create a manager with the handler chain described by `config`.
    pub fn from_config(config: &AuthConfig, role_store: Arc<dyn RoleStore>, acl_store: Arc<dyn AclStore>) -> Result<Self> {
        config.validate()?;
        Self::create(create_handlers(config)?, role_store, acl_store, config.scope_entity_types.clone())
    }

    /// Names of the handlers in the order they are tried
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Authenticate the request and publish its authorization context into `ctx`.
    ///
    /// Fails with [`Error::NotAuthenticated`] when no handler authenticates the request, and with
    /// [`Error::RoleLookupFailed`] / [`Error::AclLookupFailed`] when authorization data cannot be
    /// read. In every failure case nothing is published.
    #[instrument(skip_all, fields(request_id = ctx.request_id.as_deref()))]
    pub async fn authenticate(&self, parts: &Parts, ctx: &mut RequestContext) -> Result<AuthorizationContext> {
        let identity = self.identify(parts, ctx).await?;
        let roles = self.resolve_roles(&identity).await?;

        let acl = match identity.organization_id.as_deref() {
            Some(organization_id) => self.acl.resolve_acl(organization_id, &roles).await?,
            None => Vec::new(),
        };

        let auth_info = AuthorizationContext {
            identity,
            roles,
            acl,
            scope_entity_types: self.scope_entity_types.clone(),
        };
        ctx.publish(auth_info.clone());

        Ok(auth_info)
    }

    async fn identify(&self, parts: &Parts, ctx: &RequestContext) -> Result<IdentityProfile> {
        let mut handler_errors: Vec<(&'static str, HandlerError)> = Vec::new();

        for handler in &self.handlers {
            let name = handler.name();
            debug!("Trying to authenticate with {}", name);

            match handler.check_auth(parts, ctx).await {
                Ok(Some(identity)) if identity.is_well_formed() => {
                    info!("Authenticated with {}", name);
                    record_attempt(name, "success");
                    return Ok(identity);
                }
                Ok(Some(_)) => {
                    debug!("Handler {} returned an empty identity, treating it as no match", name);
                    record_attempt(name, "no_match");
                }
                Ok(None) => {
                    debug!("Failed to authenticate with {}", name);
                    record_attempt(name, "no_match");
                }
                Err(e) => {
                    error!("Failed to authenticate with {}: {}", name, e);
                    record_attempt(name, "error");
                    handler_errors.push((name, e));
                }
            }
        }

        info!("No authentication handler was able to authenticate the request");
        if !handler_errors.is_empty() {
            trace!("All authentication attempts failed ({}): {:?}", handler_errors.len(), handler_errors);
        }
        Err(Error::NotAuthenticated)
    }

    async fn resolve_roles(&self, identity: &IdentityProfile) -> Result<BTreeSet<Role>> {
        let Some(organization_id) = identity.organization_id.as_deref() else {
            debug!("Identity carries no organization, no roles can be resolved");
            return Ok(BTreeSet::new());
        };

        let records = self
            .role_store
            .role_mappings(organization_id)
            .await
            .map_err(|source| Error::RoleLookupFailed {
                organization_id: organization_id.to_string(),
                source,
            })?;

        let roles = resolve_roles(identity, &records);
        debug!("Resolved roles {:?} from {} role mapping records", roles, records.len());
        Ok(roles)
    }
}

type ManagerFactory = dyn Fn() -> Result<AuthenticationManager> + Send + Sync;

struct AuthStateInner {
    factory: Box<ManagerFactory>,
    manager: OnceCell<AuthenticationManager>,
}

/// Shared handle to the authentication manager.
///
/// The manager is built on first use. Concurrent first requests wait on the same initialisation
/// without blocking a runtime worker, and the built chain is read-only from then on. A failed
/// build is not cached, so the next request tries again.
#[derive(Clone)]
pub struct AuthState {
    inner: Arc<AuthStateInner>,
}

impl AuthState {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<AuthenticationManager> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(AuthStateInner {
                factory: Box::new(factory),
                manager: OnceCell::new(),
            }),
        }
    }

    pub fn from_config(config: AuthConfig, role_store: Arc<dyn RoleStore>, acl_store: Arc<dyn AclStore>) -> Self {
        Self::new(move || AuthenticationManager::from_config(&config, role_store.clone(), acl_store.clone()))
    }

    pub async fn manager(&self) -> Result<&AuthenticationManager> {
        self.inner
            .manager
            .get_or_try_init(|| async {
                let manager = (self.inner.factory)()?;
                info!("Authentication handler chain built: {:?}", manager.handler_names());
                Ok(manager)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::identity::Group,
        config::{HandlerKind, TokenAuthConfig},
        store::InMemoryStore,
        test_utils::{parts_with_bearer, sign_token, StubHandler, TEST_SECRET},
        types::{AclEntry, AclRule, Action, IdentifierType, RoleMappingRecord},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn identity(email: &str) -> IdentityProfile {
        IdentityProfile {
            email: Some(email.to_string()),
            organization_id: Some("ORG1".to_string()),
            groups: vec![],
        }
    }

    fn empty_parts() -> Parts {
        axum::http::Request::builder()
            .uri("http://localhost/test")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn manager(handlers: Vec<Box<dyn IdentityHandler>>, store: Arc<InMemoryStore>) -> AuthenticationManager {
        AuthenticationManager::create(handlers, store.clone(), store, BTreeSet::from(["organization".to_string()])).unwrap()
    }

    fn token_config() -> AuthConfig {
        AuthConfig {
            handlers: vec![HandlerKind::Token],
            token: TokenAuthConfig {
                secret: Some(TEST_SECRET.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_successful_handler_wins() {
        let first = StubHandler::succeeding("first", identity("first@acme.com"));
        let second = StubHandler::succeeding("second", identity("second@acme.com"));
        let second_calls = second.calls();
        let manager = manager(vec![Box::new(first), Box::new(second)], Arc::new(InMemoryStore::new()));

        for _ in 0..5 {
            let auth_info = manager.authenticate(&empty_parts(), &mut RequestContext::new()).await.unwrap();
            assert_eq!(auth_info.identity.email.as_deref(), Some("first@acme.com"));
        }
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_failing_handler_does_not_abort_chain() {
        let manager = manager(
            vec![
                Box::new(StubHandler::failing("broken")),
                Box::new(StubHandler::succeeding("fallback", identity("u@acme.com"))),
            ],
            Arc::new(InMemoryStore::new()),
        );

        let auth_info = manager.authenticate(&empty_parts(), &mut RequestContext::new()).await.unwrap();
        assert_eq!(auth_info.identity.email.as_deref(), Some("u@acme.com"));
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_not_authenticated() {
        let manager = manager(
            vec![Box::new(StubHandler::failing("broken")), Box::new(StubHandler::no_match("absent"))],
            Arc::new(InMemoryStore::new()),
        );
        let mut ctx = RequestContext::new();

        let result = manager.authenticate(&empty_parts(), &mut ctx).await;
        assert!(matches!(result, Err(Error::NotAuthenticated)));
        assert!(ctx.auth_info().is_none());
    }

    #[tokio::test]
    async fn test_empty_identity_is_no_match() {
        let manager = manager(
            vec![
                Box::new(StubHandler::succeeding("empty", IdentityProfile::default())),
                Box::new(StubHandler::succeeding("real", identity("u@acme.com"))),
            ],
            Arc::new(InMemoryStore::new()),
        );

        let auth_info = manager.authenticate(&empty_parts(), &mut RequestContext::new()).await.unwrap();
        assert_eq!(auth_info.identity.email.as_deref(), Some("u@acme.com"));
    }

    #[test]
    fn test_empty_chain_is_invalid_configuration() {
        let store = Arc::new(InMemoryStore::new());
        let result = AuthenticationManager::create(vec![], store.clone(), store, BTreeSet::new());
        assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));

        let config = AuthConfig {
            handlers: vec![],
            ..Default::default()
        };
        let store = Arc::new(InMemoryStore::new());
        let result = AuthenticationManager::from_config(&config, store.clone(), store);
        assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));
    }

    #[tokio::test]
    async fn test_no_roles_means_no_acl_query() {
        let store = Arc::new(InMemoryStore::new());
        store.add_role_mapping("ORG1", RoleMappingRecord::new(IdentifierType::Email, "other@acme.com", ["viewer"]));
        let manager = manager(vec![Box::new(StubHandler::succeeding("stub", identity("u@acme.com")))], store.clone());

        let auth_info = manager.authenticate(&empty_parts(), &mut RequestContext::new()).await.unwrap();

        assert!(auth_info.roles.is_empty());
        assert!(auth_info.acl.is_empty());
        assert_eq!(store.role_query_count(), 1);
        assert_eq!(store.acl_query_count(), 0);
    }

    #[tokio::test]
    async fn test_acl_store_failure_fails_closed() {
        let store = Arc::new(InMemoryStore::new());
        store.add_role_mapping("ORG1", RoleMappingRecord::new(IdentifierType::Email, "u@acme.com", ["viewer"]));
        store.fail_acl_queries(true);
        let manager = manager(vec![Box::new(StubHandler::succeeding("stub", identity("u@acme.com")))], store);
        let mut ctx = RequestContext::new();

        let result = manager.authenticate(&empty_parts(), &mut ctx).await;

        assert!(matches!(result, Err(Error::AclLookupFailed { .. })));
        assert!(ctx.auth_info().is_none());
    }

    #[tokio::test]
    async fn test_role_store_failure_fails_closed() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_role_queries(true);
        let manager = manager(vec![Box::new(StubHandler::succeeding("stub", identity("u@acme.com")))], store.clone());
        let mut ctx = RequestContext::new();

        let result = manager.authenticate(&empty_parts(), &mut ctx).await;

        assert!(matches!(result, Err(Error::RoleLookupFailed { .. })));
        assert!(ctx.auth_info().is_none());
        assert_eq!(store.acl_query_count(), 0);
    }

    #[tokio::test]
    async fn test_identity_without_organization_skips_stores() {
        let store = Arc::new(InMemoryStore::new());
        let manager = manager(
            vec![Box::new(StubHandler::succeeding(
                "stub",
                IdentityProfile {
                    email: Some("u@acme.com".to_string()),
                    ..Default::default()
                },
            ))],
            store.clone(),
        );

        let auth_info = manager.authenticate(&empty_parts(), &mut RequestContext::new()).await.unwrap();

        assert!(auth_info.roles.is_empty());
        assert!(auth_info.acl.is_empty());
        assert_eq!(store.role_query_count(), 0);
        assert_eq!(store.acl_query_count(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_token_request_resolves_roles_and_acl() {
        let store = Arc::new(InMemoryStore::new());
        store.add_role_mapping("ORG1", RoleMappingRecord::new(IdentifierType::Email, "u@acme.com", ["viewer"]));
        store.add_acl_rule(
            "ORG1",
            AclRule {
                role: Role::from("viewer"),
                entries: vec![AclEntry::new("/org/ORG1/*", [Action::Read])],
            },
        );
        let manager = AuthenticationManager::from_config(&token_config(), store.clone(), store).unwrap();

        let token = sign_token("u@acme.com", "ORG1", &["readers"]);
        let mut ctx = RequestContext::new();
        let auth_info = manager.authenticate(&parts_with_bearer(&token), &mut ctx).await.unwrap();

        assert_eq!(auth_info.identity.groups, vec![Group::new("readers")]);
        assert_eq!(auth_info.roles, BTreeSet::from([Role::from("viewer")]));
        assert_eq!(auth_info.acl, vec![AclEntry::new("/org/ORG1/*", [Action::Read])]);
        assert_eq!(auth_info.scope_entity_types, BTreeSet::from(["organization".to_string()]));
        assert_eq!(ctx.auth_info(), Some(&auth_info));
    }

    #[tokio::test]
    async fn test_token_request_without_token_is_not_authenticated() {
        let store = Arc::new(InMemoryStore::new());
        let manager = AuthenticationManager::from_config(&token_config(), store.clone(), store).unwrap();

        let result = manager.authenticate(&empty_parts(), &mut RequestContext::new()).await;
        assert!(matches!(result, Err(Error::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_cancelled_resolution_publishes_nothing() {
        let manager = manager(
            vec![Box::new(StubHandler::pending("slow"))],
            Arc::new(InMemoryStore::new()),
        );
        let mut ctx = RequestContext::new();
        let parts = empty_parts();

        let result = tokio::time::timeout(Duration::from_millis(20), manager.authenticate(&parts, &mut ctx)).await;

        assert!(result.is_err());
        assert!(ctx.auth_info().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_chain_is_built_once_under_concurrent_first_use() {
        let builds = Arc::new(AtomicUsize::new(0));
        let state = {
            let builds = builds.clone();
            AuthState::new(move || {
                builds.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                let store = Arc::new(InMemoryStore::new());
                AuthenticationManager::create(
                    vec![Box::new(StubHandler::no_match("stub"))],
                    store.clone(),
                    store,
                    BTreeSet::new(),
                )
            })
        };

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { state.manager().await.map(|m| m.handler_names()).unwrap() })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), vec!["stub"]);
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_waiting_for_chain_build_yields_to_other_tasks() {
        let state = AuthState::new(|| {
            let store = Arc::new(InMemoryStore::new());
            AuthenticationManager::create(vec![Box::new(StubHandler::no_match("stub"))], store.clone(), store, BTreeSet::new())
        });

        // Every caller shares one runtime thread; all of them must still get the chain
        let waiters = (0..4).map(|_| {
            let state = state.clone();
            tokio::spawn(async move { state.manager().await.map(|m| m.handler_names().len()).unwrap() })
        });
        for waiter in waiters.collect::<Vec<_>>() {
            assert_eq!(waiter.await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_failed_chain_build_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let state = {
            let attempts = attempts.clone();
            AuthState::new(move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::InvalidConfiguration {
                    message: "No handlers provided".to_string(),
                })
            })
        };

        assert!(state.manager().await.is_err());
        assert!(state.manager().await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
