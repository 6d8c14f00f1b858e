use uuid::Uuid;

/// `Principal` is the authenticated actor of a single request.
///
/// It is produced by the authentication edge after token validation and is
/// trusted as-is. The engine never persists it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Principal {
    user_id: Uuid,
    tenant_id: Option<Uuid>,
    roles: Vec<String>,
}

impl Principal {
    #[must_use]
    pub fn builder() -> PrincipalBuilder {
        PrincipalBuilder::default()
    }

    /// Principal of a request that carried no credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        PrincipalBuilder::default().build()
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Home tenant of the principal, if the token carried one.
    #[must_use]
    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// `false` for the anonymous principal (nil user id).
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.user_id.is_nil()
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    /// Returns `true` if the principal carries at least one of `roles`.
    #[must_use]
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.has_role(r.as_ref()))
    }
}

#[derive(Default)]
pub struct PrincipalBuilder {
    user_id: Option<Uuid>,
    tenant_id: Option<Uuid>,
    roles: Vec<String>,
}

impl PrincipalBuilder {
    #[must_use]
    pub fn user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn tenant_id(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn build(mut self) -> Principal {
        self.roles.sort();
        self.roles.dedup();
        Principal {
            user_id: self.user_id.unwrap_or_default(),
            tenant_id: self.tenant_id,
            roles: self.roles,
        }
    }
}
