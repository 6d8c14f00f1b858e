//! Per-field authorization for graph-style queries.
//!
//! A field is registered on a [`SchemaBuilder`] either plainly or with a
//! [`FieldGuardDirective`]. Guarded fields get their resolver wrapped at
//! build time by one shared [`FieldGuardMiddleware`]; at execution time a
//! denied field resolves to `null` plus a field-scoped error while its
//! siblings resolve normally. Infrastructure failures (store, cancellation)
//! abort the whole execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use dac_security::PermissionType;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use permissions_sdk::{PermissionLayer, ResourceLocator};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::cache::RequestScope;
use super::error::DomainError;
use super::resolver::PermissionResolver;

/// Declarative guard attached to a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGuardDirective {
    pub level: PermissionLayer,
    pub permission: PermissionType,
    pub entity_type: String,
    /// Name of the field argument carrying the resource id. Required for
    /// resource-level guards.
    pub resource_id_argument: Option<String>,
}

impl FieldGuardDirective {
    #[must_use]
    pub fn tenant(permission: PermissionType, entity_type: impl Into<String>) -> Self {
        Self {
            level: PermissionLayer::Tenant,
            permission,
            entity_type: entity_type.into(),
            resource_id_argument: None,
        }
    }

    #[must_use]
    pub fn content_type(permission: PermissionType, entity_type: impl Into<String>) -> Self {
        Self {
            level: PermissionLayer::ContentType,
            permission,
            entity_type: entity_type.into(),
            resource_id_argument: None,
        }
    }

    #[must_use]
    pub fn resource(
        permission: PermissionType,
        entity_type: impl Into<String>,
        argument: impl Into<String>,
    ) -> Self {
        Self {
            level: PermissionLayer::Resource,
            permission,
            entity_type: entity_type.into(),
            resource_id_argument: Some(argument.into()),
        }
    }

    fn locator(&self, ctx: &FieldContext) -> Result<ResourceLocator, DomainError> {
        let resource_id = match self.level {
            PermissionLayer::Resource => {
                let argument = self.resource_id_argument.as_deref().ok_or_else(|| {
                    DomainError::validation(
                        "resource_id_argument",
                        "resource-level guard without an argument name",
                    )
                })?;
                let raw = ctx
                    .arguments
                    .get(argument)
                    .and_then(Value::as_str)
                    .ok_or_else(|| DomainError::validation(argument, "missing resource id"))?;
                let id = Uuid::parse_str(raw)
                    .map_err(|_| DomainError::validation(argument, "resource id is not a UUID"))?;
                Some(id)
            }
            PermissionLayer::ContentType | PermissionLayer::Tenant => None,
        };
        Ok(ResourceLocator {
            entity_type: self.entity_type.clone(),
            resource_id,
            tenant_id: ctx.tenant_id,
        })
    }
}

/// Runtime input of one field resolution.
#[derive(Clone)]
pub struct FieldContext {
    pub scope: Arc<RequestScope>,
    /// Owning tenant of the objects being queried; `None` for global ones.
    pub tenant_id: Option<Uuid>,
    pub arguments: Map<String, Value>,
}

/// Why a field produced no value.
#[derive(Debug)]
pub enum FieldFault {
    Guard(DomainError),
    Resolver(anyhow::Error),
}

pub type FieldResolverFn =
    Arc<dyn Fn(FieldContext) -> BoxFuture<'static, Result<Value, FieldFault>> + Send + Sync>;

/// The one middleware every guarded field goes through.
pub struct FieldGuardMiddleware {
    resolver: Arc<PermissionResolver>,
}

impl FieldGuardMiddleware {
    #[must_use]
    pub fn new(resolver: Arc<PermissionResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve the directive for the field's principal.
    ///
    /// # Errors
    /// `Unauthenticated` or `Forbidden` on denial, `Validation` for a missing
    /// or malformed resource id argument, resolver failures as-is.
    pub async fn authorize(
        &self,
        directive: &FieldGuardDirective,
        ctx: &FieldContext,
    ) -> Result<(), DomainError> {
        let locator = directive.locator(ctx)?;
        if !ctx.scope.principal().is_authenticated() {
            return Err(DomainError::Unauthenticated);
        }
        let decision = self
            .resolver
            .resolve_from(&ctx.scope, directive.permission, &locator, directive.level)
            .await?;
        if decision.granted {
            Ok(())
        } else {
            Err(DomainError::forbidden(format!(
                "missing {} on {}",
                directive.permission, directive.entity_type
            )))
        }
    }

    async fn around(
        self: Arc<Self>,
        directive: Arc<FieldGuardDirective>,
        ctx: FieldContext,
        inner: FieldResolverFn,
    ) -> Result<Value, FieldFault> {
        self.authorize(&directive, &ctx)
            .await
            .map_err(FieldFault::Guard)?;
        inner(ctx).await
    }
}

pub struct SchemaBuilder {
    middleware: Arc<FieldGuardMiddleware>,
    fields: HashMap<String, FieldResolverFn>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new(resolver: Arc<PermissionResolver>) -> Self {
        Self {
            middleware: Arc::new(FieldGuardMiddleware::new(resolver)),
            fields: HashMap::new(),
        }
    }

    /// Register an unguarded field.
    #[must_use]
    pub fn field<F, Fut>(mut self, name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(FieldContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.fields.insert(name.into(), plain(resolve));
        self
    }

    /// Register a field whose resolver only runs once `directive` allows it.
    #[must_use]
    pub fn guarded_field<F, Fut>(
        mut self,
        name: impl Into<String>,
        directive: FieldGuardDirective,
        resolve: F,
    ) -> Self
    where
        F: Fn(FieldContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let inner = plain(resolve);
        let middleware = Arc::clone(&self.middleware);
        let directive = Arc::new(directive);
        let wrapped: FieldResolverFn = Arc::new(move |ctx: FieldContext| {
            Arc::clone(&middleware)
                .around(Arc::clone(&directive), ctx, Arc::clone(&inner))
                .boxed()
        });
        self.fields.insert(name.into(), wrapped);
        self
    }

    #[must_use]
    pub fn build(self) -> Schema {
        Schema {
            fields: self.fields,
        }
    }
}

fn plain<F, Fut>(resolve: F) -> FieldResolverFn
where
    F: Fn(FieldContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |ctx: FieldContext| {
        resolve(ctx).map(|r| r.map_err(FieldFault::Resolver)).boxed()
    })
}

/// One requested field.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub field: String,
    pub alias: Option<String>,
    pub arguments: Map<String, Value>,
}

impl Selection {
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldErrorCode {
    Unauthenticated,
    Forbidden,
    Validation,
    UnknownField,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Response key of the failed field.
    pub path: Vec<String>,
    pub message: String,
    pub code: FieldErrorCode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResponse {
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

pub struct Schema {
    fields: HashMap<String, FieldResolverFn>,
}

impl Schema {
    /// Resolve all `selections` concurrently against one request scope.
    ///
    /// # Errors
    /// `StoreUnavailable` or `Cancelled` from any guarded field; these are
    /// never downgraded to a field error.
    pub async fn execute(
        &self,
        scope: &Arc<RequestScope>,
        tenant_id: Option<Uuid>,
        selections: Vec<Selection>,
    ) -> Result<QueryResponse, DomainError> {
        let runs = selections.into_iter().map(|selection| {
            let resolve = self.fields.get(&selection.field).cloned();
            let ctx = FieldContext {
                scope: Arc::clone(scope),
                tenant_id,
                arguments: selection.arguments.clone(),
            };
            async move {
                let outcome = match resolve {
                    Some(resolve) => Some(resolve(ctx).await),
                    None => None,
                };
                (selection, outcome)
            }
        });

        let mut response = QueryResponse::default();
        for (selection, outcome) in join_all(runs).await {
            let key = selection.response_key().to_owned();
            let error = match outcome {
                Some(Ok(value)) => {
                    response.data.insert(key, value);
                    continue;
                }
                None => FieldError {
                    path: vec![key.clone()],
                    message: format!("unknown field '{}'", selection.field),
                    code: FieldErrorCode::UnknownField,
                },
                Some(Err(FieldFault::Guard(e))) => field_error(&key, e)?,
                Some(Err(FieldFault::Resolver(e))) => {
                    warn!(field = %key, error = %e, "field resolver failed");
                    FieldError {
                        path: vec![key.clone()],
                        message: "internal error".to_owned(),
                        code: FieldErrorCode::Internal,
                    }
                }
            };
            debug!(field = %key, code = ?error.code, "field resolved to null");
            response.data.insert(key, Value::Null);
            response.errors.push(error);
        }
        Ok(response)
    }
}

fn field_error(key: &str, e: DomainError) -> Result<FieldError, DomainError> {
    let code = match &e {
        DomainError::Unauthenticated => FieldErrorCode::Unauthenticated,
        DomainError::Forbidden { .. } | DomainError::SelfEscalationDenied { .. } => {
            FieldErrorCode::Forbidden
        }
        DomainError::Validation { .. } => FieldErrorCode::Validation,
        DomainError::StoreUnavailable(_) | DomainError::Cancelled => return Err(e),
    };
    Ok(FieldError {
        path: vec![key.to_owned()],
        message: e.to_string(),
        code,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::test_support::{ProbeStore, clock, resolver, scope, seed, user};
    use crate::infra::storage::InMemoryPermissionStore;
    use dac_security::Principal;
    use permissions_sdk::GrantKey;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema(store: Arc<dyn crate::domain::store::PermissionStore>) -> Schema {
        SchemaBuilder::new(Arc::new(resolver(store, clock())))
            .field("motd", |_ctx| async { anyhow::Ok(json!("hello")) })
            .guarded_field(
                "post",
                FieldGuardDirective::resource(PermissionType::READ, "Post", "id"),
                |ctx: FieldContext| async move { anyhow::Ok(json!({ "id": ctx.arguments["id"] })) },
            )
            .guarded_field(
                "drafts",
                FieldGuardDirective::content_type(PermissionType::EDIT, "Post"),
                |_ctx| async { anyhow::Ok(json!([])) },
            )
            .build()
    }

    #[tokio::test]
    async fn denied_field_does_not_affect_siblings() {
        let tenant = Uuid::new_v4();
        let post = Uuid::new_v4();
        let principal = user(tenant);
        let store = Arc::new(InMemoryPermissionStore::new());
        seed(
            &store,
            GrantKey::Resource {
                user_id: principal.user_id(),
                entity_type: "Post".to_owned(),
                resource_id: post,
            },
            PermissionType::READ,
            None,
        )
        .await;

        let response = schema(store)
            .execute(
                &Arc::new(scope(principal)),
                Some(tenant),
                vec![
                    Selection::new("motd"),
                    Selection::new("post").arg("id", post.to_string()),
                    Selection::new("drafts"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(response.data["motd"], json!("hello"));
        assert_eq!(response.data["post"], json!({ "id": post.to_string() }));
        assert_eq!(response.data["drafts"], Value::Null);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path, vec!["drafts".to_owned()]);
        assert_eq!(response.errors[0].code, FieldErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn missing_argument_is_a_field_validation_error() {
        let response = schema(Arc::new(InMemoryPermissionStore::new()))
            .execute(
                &Arc::new(scope(user(Uuid::new_v4()))),
                None,
                vec![Selection::new("post").alias("p"), Selection::new("motd")],
            )
            .await
            .unwrap();

        assert_eq!(response.data["p"], Value::Null);
        assert_eq!(response.errors[0].code, FieldErrorCode::Validation);
        assert_eq!(response.data["motd"], json!("hello"));
    }

    #[tokio::test]
    async fn anonymous_principal_gets_unauthenticated_field_errors() {
        let response = schema(Arc::new(InMemoryPermissionStore::new()))
            .execute(
                &Arc::new(scope(Principal::anonymous())),
                None,
                vec![Selection::new("drafts")],
            )
            .await
            .unwrap();

        assert_eq!(response.errors[0].code, FieldErrorCode::Unauthenticated);
    }

    #[tokio::test]
    async fn store_failure_aborts_execution() {
        let result = schema(Arc::new(ProbeStore::failing()))
            .execute(
                &Arc::new(scope(user(Uuid::new_v4()))),
                Some(Uuid::new_v4()),
                vec![Selection::new("motd"), Selection::new("drafts")],
            )
            .await;

        assert!(matches!(result, Err(DomainError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn unknown_field_is_reported() {
        let response = schema(Arc::new(InMemoryPermissionStore::new()))
            .execute(
                &Arc::new(scope(user(Uuid::new_v4()))),
                None,
                vec![Selection::new("nope")],
            )
            .await
            .unwrap();

        assert_eq!(response.errors[0].code, FieldErrorCode::UnknownField);
    }

    #[tokio::test]
    async fn sibling_fields_share_the_request_cache() {
        let tenant = Uuid::new_v4();
        let store = Arc::new(ProbeStore::new());
        let schema = schema(store.clone());
        let selections = (0..6)
            .map(|i| Selection::new("drafts").alias(format!("d{i}")))
            .collect();

        let response = schema
            .execute(&Arc::new(scope(user(tenant))), Some(tenant), selections)
            .await
            .unwrap();

        assert_eq!(response.errors.len(), 6);
        // ContentType + Tenant lookups once for the whole response.
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn resolver_runs_only_after_guard_allows() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let schema = SchemaBuilder::new(Arc::new(resolver(
            Arc::new(InMemoryPermissionStore::new()),
            clock(),
        )))
        .guarded_field(
            "secret",
            FieldGuardDirective::tenant(PermissionType::READ, "Vault"),
            move |_ctx| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(json!("s3cr3t"))
                }
            },
        )
        .build();

        let response = schema
            .execute(
                &Arc::new(scope(user(Uuid::new_v4()))),
                Some(Uuid::new_v4()),
                vec![Selection::new("secret")],
            )
            .await
            .unwrap();

        assert_eq!(response.data["secret"], Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tenant_directive_ignores_content_type_rows() {
        let tenant = Uuid::new_v4();
        let principal = user(tenant);
        let store = Arc::new(InMemoryPermissionStore::new());
        seed(
            &store,
            GrantKey::ContentType {
                user_id: principal.user_id(),
                tenant_id: tenant,
                entity_type: "Vault".to_owned(),
            },
            PermissionType::READ,
            None,
        )
        .await;
        let schema = SchemaBuilder::new(Arc::new(resolver(store, clock())))
            .guarded_field(
                "vault",
                FieldGuardDirective::tenant(PermissionType::READ, "Vault"),
                |_ctx| async { anyhow::Ok(json!("open")) },
            )
            .guarded_field(
                "vaults",
                FieldGuardDirective::content_type(PermissionType::READ, "Vault"),
                |_ctx| async { anyhow::Ok(json!("open")) },
            )
            .build();

        let response = schema
            .execute(
                &Arc::new(scope(principal)),
                Some(tenant),
                vec![Selection::new("vault"), Selection::new("vaults")],
            )
            .await
            .unwrap();

        assert_eq!(response.data["vault"], Value::Null);
        assert_eq!(response.errors[0].path, vec!["vault".to_owned()]);
        assert_eq!(response.errors[0].code, FieldErrorCode::Forbidden);
        assert_eq!(response.data["vaults"], json!("open"));
    }
}
