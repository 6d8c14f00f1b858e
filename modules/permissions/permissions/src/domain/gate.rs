use std::sync::Arc;

use async_trait::async_trait;
use dac_security::{PermissionType, Principal};
use permissions_sdk::ResourceLocator;
use tracing::{debug, info};

use super::cache::RequestScope;
use super::error::DomainError;
use super::resolver::PermissionResolver;

/// Authorization requirements of a dispatched request.
///
/// Empty role and permission lists impose nothing; every opted-in request
/// still requires an authenticated principal.
#[async_trait]
pub trait Authorize: Send + Sync {
    /// Any one of these roles passes the role check.
    fn required_roles(&self) -> &[&str] {
        &[]
    }

    /// Any one of these capabilities on [`Authorize::locator`] passes the
    /// permission check.
    fn required_permissions(&self) -> &[PermissionType] {
        &[]
    }

    /// Object the permission check is evaluated against.
    fn locator(&self) -> Option<ResourceLocator> {
        None
    }

    /// Request-specific predicate, evaluated last.
    async fn is_authorized(&self, _principal: &Principal) -> Result<bool, DomainError> {
        Ok(true)
    }
}

/// A command or query routed through [`AuthorizationGate::dispatch`].
///
/// `Error` is built from the gate's rejection through `From`, so each request
/// type picks its failure representation at compile time.
pub trait Request: Send + Sync {
    type Response: Send;
    type Error: From<DomainError> + Send;

    /// `None` marks the request as public; it reaches its handler unchecked.
    fn authorization(&self) -> Option<&dyn Authorize> {
        None
    }
}

#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, scope: &RequestScope, request: R) -> Result<R::Response, R::Error>;
}

/// Pipeline interceptor in front of every request handler.
#[derive(Clone)]
pub struct AuthorizationGate {
    resolver: Arc<PermissionResolver>,
}

impl AuthorizationGate {
    #[must_use]
    pub fn new(resolver: Arc<PermissionResolver>) -> Self {
        Self { resolver }
    }

    /// Run the gate, then `handler` if the gate passes.
    ///
    /// # Errors
    /// The gate's rejection converted into `R::Error`, or the handler's error.
    pub async fn dispatch<R, H>(
        &self,
        scope: &RequestScope,
        handler: &H,
        request: R,
    ) -> Result<R::Response, R::Error>
    where
        R: Request,
        H: RequestHandler<R> + ?Sized,
    {
        if let Some(auth) = request.authorization() {
            self.check(scope, auth).await.map_err(R::Error::from)?;
        }
        handler.handle(scope, request).await
    }

    /// Evaluate `auth` for the scope's principal. The first failing check
    /// short-circuits: authentication, roles, permissions, predicate.
    ///
    /// # Errors
    /// `Unauthenticated`, `Forbidden`, `Validation` for a permission check
    /// without a locator, and any resolver failure.
    pub async fn check(&self, scope: &RequestScope, auth: &dyn Authorize) -> Result<(), DomainError> {
        let principal = scope.principal();
        if !principal.is_authenticated() {
            debug!("request rejected: unauthenticated");
            return Err(DomainError::Unauthenticated);
        }

        let roles = auth.required_roles();
        if !roles.is_empty() && !principal.has_any_role(roles) {
            info!(user_id = %principal.user_id(), ?roles, "request rejected: missing role");
            return Err(DomainError::forbidden("missing required role"));
        }

        let permissions = auth.required_permissions();
        if !permissions.is_empty() {
            let locator = auth.locator().ok_or_else(|| {
                DomainError::validation("locator", "permission check requires a resource locator")
            })?;
            let mut allowed = false;
            for &permission in permissions {
                if self.resolver.resolve(scope, permission, &locator).await?.granted {
                    allowed = true;
                    break;
                }
            }
            if !allowed {
                info!(
                    user_id = %principal.user_id(),
                    entity_type = %locator.entity_type,
                    "request rejected: missing permission"
                );
                return Err(DomainError::forbidden("missing required permission"));
            }
        }

        if !auth.is_authorized(principal).await? {
            info!(user_id = %principal.user_id(), "request rejected by predicate");
            return Err(DomainError::forbidden("request predicate denied access"));
        }
        Ok(())
    }
}
