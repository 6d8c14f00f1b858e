#![allow(clippy::unwrap_used, clippy::expect_used)]

//! The module running on the relational store.

mod common;

use std::sync::Arc;

use dac_security::{PermissionSet, PermissionType};
use permissions::infra::storage::{SeaOrmPermissionStore, connect};
use permissions_sdk::{
    GrantRequest, GrantTarget, PermissionLayer, ResourceLocator, RevokeRequest,
};
use time::Duration;
use uuid::Uuid;

use common::{Env, env_with_store, member};

async fn sql_env() -> Env {
    let db = connect("sqlite::memory:").await.unwrap();
    env_with_store(Arc::new(SeaOrmPermissionStore::new(db)))
}

#[tokio::test]
async fn layered_resolution_over_sql_tables() {
    let env = sql_env().await;
    let u = member(env.tenant);
    let r1 = Uuid::new_v4();

    env.grant(&u, GrantTarget::tenant(env.tenant), PermissionType::READ, env.in_days(1))
        .await;
    env.grant(
        &u,
        GrantTarget::content_type(env.tenant, "Project"),
        PermissionType::COMMENT,
        None,
    )
    .await;
    env.grant(
        &u,
        GrantTarget::resource("Project", r1, Some(env.tenant)),
        PermissionType::READ,
        None,
    )
    .await;

    let on_r1 = ResourceLocator::resource("Project", r1, Some(env.tenant));
    let edit = env.client.check(&u, PermissionType::EDIT, &on_r1).await.unwrap();
    assert!(!edit.granted);
    assert_eq!(edit.matched_layer, Some(PermissionLayer::Resource));

    let article = ResourceLocator::content_type("Article", Some(env.tenant));
    assert!(env.client.check(&u, PermissionType::READ, &article).await.unwrap().granted);
    env.clock.advance(Duration::days(2));
    assert!(!env.client.check(&u, PermissionType::READ, &article).await.unwrap().granted);

    let rows = env.client.list_grants(&u, u.user_id()).await.unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn merges_and_revocations_bump_revisions() {
    let env = sql_env().await;
    let u = member(env.tenant);
    let target = GrantTarget::content_type(env.tenant, "Course");

    let first = env
        .grant(&u, target.clone(), PermissionType::READ, None)
        .await;
    let merged = env
        .grant(&u, target.clone(), PermissionType::COMMENT, None)
        .await;
    assert_eq!(first.revision, 1);
    assert_eq!(merged.revision, 2);
    assert_eq!(merged.permissions, PermissionType::READ | PermissionType::COMMENT);

    let revoked = env
        .client
        .revoke(
            &env.admin,
            RevokeRequest {
                subject_user_id: u.user_id(),
                target,
                permissions: Some(PermissionType::READ.into()),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(revoked.revision, 3);
    assert_eq!(revoked.permissions, PermissionSet::from(PermissionType::COMMENT));
}

#[tokio::test]
async fn concurrent_grants_merge_on_sql_store() {
    let env = sql_env().await;
    let u = member(env.tenant);
    let request = |permission: PermissionType| GrantRequest {
        subject_user_id: u.user_id(),
        target: GrantTarget::tenant(env.tenant),
        permissions: permission.into(),
        expires_at: None,
    };

    let (a, b, c) = tokio::join!(
        env.client.grant(&env.admin, request(PermissionType::READ)),
        env.client.grant(&env.admin, request(PermissionType::VOTE)),
        env.client.grant(&env.admin, request(PermissionType::SHARE)),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let held = env
        .client
        .effective_permissions(&u, &ResourceLocator::content_type("Poll", Some(env.tenant)))
        .await
        .unwrap();
    assert_eq!(
        held,
        PermissionType::READ | PermissionType::VOTE | PermissionType::SHARE
    );
}
