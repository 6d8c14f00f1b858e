use std::sync::Arc;

use dac_security::Principal;
use permissions_sdk::PermissionsClient;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PermissionsConfig;
use crate::domain::cache::RequestScope;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::events::PermissionAuditEvent;
use crate::domain::field_guard::SchemaBuilder;
use crate::domain::gate::AuthorizationGate;
use crate::domain::groups::{GroupConfig, GroupHierarchy};
use crate::domain::local_client::PermissionsLocalClient;
use crate::domain::ports::EventPublisher;
use crate::domain::resolver::PermissionResolver;
use crate::domain::service::{PermissionMutationService, ServiceConfig};
use crate::domain::store::PermissionStore;
use crate::infra::audit::TracingAuditPublisher;

/// Everything a request needs, shared by the local client and the REST
/// handlers.
#[doc(hidden)]
pub struct AppServices {
    pub(crate) resolver: Arc<PermissionResolver>,
    pub(crate) gate: AuthorizationGate,
    pub(crate) mutations: Arc<PermissionMutationService>,
    pub(crate) admin_roles: Arc<[String]>,
    pub(crate) cache_enabled: bool,
    pub(crate) groups: GroupHierarchy,
}

impl AppServices {
    pub(crate) fn new_scope(&self, principal: Principal, cancel: CancellationToken) -> RequestScope {
        RequestScope::new(principal, self.cache_enabled, cancel)
    }
}

/// Wired permission engine.
///
/// Built once at startup from a store; hands out the in-process client, the
/// REST router and the field-guard schema builder, all sharing one resolver.
#[derive(Clone)]
pub struct PermissionsModule {
    services: Arc<AppServices>,
}

impl PermissionsModule {
    #[must_use]
    pub fn builder(store: Arc<dyn PermissionStore>) -> PermissionsModuleBuilder {
        PermissionsModuleBuilder {
            store,
            clock: None,
            publisher: None,
            config: PermissionsConfig::default(),
            groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn PermissionsClient> {
        Arc::new(PermissionsLocalClient::new(Arc::clone(&self.services)))
    }

    /// Routes under `/permissions/v1`.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        crate::api::rest::routes::router(Arc::clone(&self.services))
    }

    /// Scope for one inbound request of a host pipeline.
    #[must_use]
    pub fn new_scope(&self, principal: Principal, cancel: CancellationToken) -> RequestScope {
        self.services.new_scope(principal, cancel)
    }

    /// Gate for host request types implementing
    /// [`Request`](crate::domain::gate::Request).
    #[must_use]
    pub fn gate(&self) -> &AuthorizationGate {
        &self.services.gate
    }

    /// Start a graph-style query schema whose guarded fields consult this
    /// module's resolver.
    #[must_use]
    pub fn schema_builder(&self) -> SchemaBuilder {
        SchemaBuilder::new(Arc::clone(&self.services.resolver))
    }

    /// Roles contributed by group memberships, ancestors included.
    #[must_use]
    pub fn group_roles(&self, groups: &[uuid::Uuid]) -> Vec<String> {
        self.services.groups.effective_roles(groups)
    }
}

pub struct PermissionsModuleBuilder {
    store: Arc<dyn PermissionStore>,
    clock: Option<Arc<dyn Clock>>,
    publisher: Option<Arc<dyn EventPublisher<PermissionAuditEvent>>>,
    config: PermissionsConfig,
    groups: Vec<GroupConfig>,
}

impl PermissionsModuleBuilder {
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Audit sink. Defaults to [`TracingAuditPublisher`].
    #[must_use]
    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher<PermissionAuditEvent>>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    #[must_use]
    pub fn config(mut self, config: PermissionsConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn groups(mut self, groups: Vec<GroupConfig>) -> Self {
        self.groups = groups;
        self
    }

    #[must_use]
    pub fn build(self) -> PermissionsModule {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let publisher = self
            .publisher
            .unwrap_or_else(|| Arc::new(TracingAuditPublisher));

        let resolver = Arc::new(PermissionResolver::new(
            Arc::clone(&self.store),
            clock,
            self.config.admin_roles.clone(),
        ));
        let mutations = Arc::new(PermissionMutationService::new(
            self.store,
            Arc::clone(&resolver),
            publisher,
            ServiceConfig::from(&self.config),
        ));
        let groups = GroupHierarchy::from_config(&self.groups);

        info!(
            admin_roles = ?self.config.admin_roles,
            cache_enabled = self.config.cache_enabled,
            groups = groups.len(),
            "permissions module initialized"
        );

        PermissionsModule {
            services: Arc::new(AppServices {
                gate: AuthorizationGate::new(Arc::clone(&resolver)),
                resolver,
                mutations,
                admin_roles: self.config.admin_roles.into(),
                cache_enabled: self.config.cache_enabled,
                groups,
            }),
        }
    }
}
