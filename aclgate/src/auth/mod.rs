//! Authentication and authorization resolution.
//!
//! Every protected request runs through the same pipeline:
//!
//! 1. **Identity**: the configured [`IdentityHandler`]s are tried in order until one of them
//!    recognises the request's credentials and produces an [`IdentityProfile`].
//! 2. **Roles**: the role mapping records of the identity's organization are matched against its
//!    email, organization ID and `{org}/{group}` memberships.
//! 3. **ACL**: the ACL rules of the resolved roles are read and flattened, in store order.
//! 4. **Publication**: the resulting [`AuthorizationContext`] is attached to the request and made
//!    available to route handlers through the [`AuthInfo`] extractor.
//!
//! # Modules
//!
//! - [`identity`]: Identity profiles, the handler trait and the per-request context
//! - [`handlers`]: Bearer token and trusted proxy header handlers
//! - [`roles`]: Role resolution from role mapping records
//! - [`acl`]: ACL resolution from the ACL store
//! - [`manager`]: The handler chain and lazily built shared state
//! - [`context`]: The published context and its path matching
//! - [`middleware`]: Route protection middleware
//! - [`current`]: Extractor for route handlers
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use aclgate::auth::current::AuthInfo;
//! use aclgate::types::Action;
//!
//! async fn list_sites(AuthInfo(auth): AuthInfo) -> Result<String, Error> {
//!     if !auth.permits("/org/ORG1/sites", Action::Read) {
//!         return Err(Error::NotAuthenticated);
//!     }
//!     Ok(format!("Sites for {:?}", auth.identity.email))
//! }
//! ```
//!
//! [`IdentityHandler`]: identity::IdentityHandler
//! [`IdentityProfile`]: identity::IdentityProfile
//! [`AuthorizationContext`]: context::AuthorizationContext
//! [`AuthInfo`]: current::AuthInfo

pub mod acl;
pub mod context;
pub mod current;
pub mod handlers;
pub mod identity;
pub mod manager;
pub mod middleware;
pub mod roles;
