//! Identity handler implementations.

use crate::{
    auth::identity::IdentityHandler,
    config::{AuthConfig, HandlerKind},
    errors::Error,
};

pub mod proxy_header;
pub mod token;

pub use proxy_header::ProxyHeaderHandler;
pub use token::TokenHandler;

/// Create the handler chain from configuration, preserving the configured order.
///
/// This is the single point where we convert config into handler instances.
/// Adding a new handler requires adding a match arm here.
pub fn create_handlers(config: &AuthConfig) -> Result<Vec<Box<dyn IdentityHandler>>, Error> {
    config
        .handlers
        .iter()
        .map(|kind| -> Result<Box<dyn IdentityHandler>, Error> {
            match kind {
                HandlerKind::Token => Ok(Box::new(TokenHandler::new(&config.token)?)),
                HandlerKind::ProxyHeader => Ok(Box::new(ProxyHeaderHandler::new(config.proxy_header.clone()))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenAuthConfig;

    #[test]
    fn test_handlers_follow_configured_order() {
        let config = AuthConfig {
            handlers: vec![HandlerKind::ProxyHeader, HandlerKind::Token],
            token: TokenAuthConfig {
                secret: Some("secret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let names: Vec<&str> = create_handlers(&config).unwrap().iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["proxy_header", "token"]);
    }

    #[test]
    fn test_token_handler_without_secret_fails() {
        let config = AuthConfig {
            handlers: vec![HandlerKind::Token],
            ..Default::default()
        };

        assert!(matches!(create_handlers(&config), Err(Error::InvalidConfiguration { .. })));
    }
}
