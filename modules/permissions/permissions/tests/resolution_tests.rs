#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end resolution behaviour through the in-process client.

mod common;

use dac_security::{PermissionSet, PermissionType};
use permissions::domain::events::PermissionAuditEvent;
use permissions_sdk::{
    BulkGrantRequest, DecisionBasis, GrantRequest, GrantTarget, PermissionLayer, PermissionsError,
    ResourceLocator, RevokeRequest,
};
use time::Duration;
use uuid::Uuid;

use common::{env, member};

#[tokio::test]
async fn scenario_a_resource_record_shadows_lower_layers() {
    let env = env();
    let u = member(env.tenant);
    let r1 = Uuid::new_v4();

    env.grant(
        &u,
        GrantTarget::content_type(env.tenant, "Project"),
        PermissionType::READ | PermissionType::EDIT,
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

    let locator = ResourceLocator::resource("Project", r1, Some(env.tenant));
    let edit = env.client.check(&u, PermissionType::EDIT, &locator).await.unwrap();
    assert!(!edit.granted);
    assert_eq!(edit.matched_layer, Some(PermissionLayer::Resource));

    let read = env.client.check(&u, PermissionType::READ, &locator).await.unwrap();
    assert!(read.granted);
    assert_eq!(read.matched_layer, Some(PermissionLayer::Resource));
}

#[tokio::test]
async fn scenario_b_expired_tenant_grant_falls_through_to_content_type() {
    let env = env();
    let u = member(env.tenant);

    env.grant(
        &u,
        GrantTarget::tenant(env.tenant),
        PermissionSet::builtin(),
        env.in_days(1),
    )
    .await;
    env.clock.advance(Duration::days(2));
    env.grant(
        &u,
        GrantTarget::content_type(env.tenant, "Post"),
        PermissionType::COMMENT,
        env.in_days(10),
    )
    .await;

    let any_post = ResourceLocator::resource("Post", Uuid::new_v4(), Some(env.tenant));
    let comment = env
        .client
        .check(&u, PermissionType::COMMENT, &any_post)
        .await
        .unwrap();
    assert!(comment.granted);
    assert_eq!(comment.matched_layer, Some(PermissionLayer::ContentType));

    // Where no content-type row exists, the expired tenant row is absent too.
    let page = ResourceLocator::resource("Page", Uuid::new_v4(), Some(env.tenant));
    let read = env
        .client
        .check(&u, PermissionType::READ, &page)
        .await
        .unwrap();
    assert!(!read.granted);
    assert_eq!(read.basis, DecisionBasis::NoGrant);
}

#[tokio::test]
async fn scenario_c_bulk_grant_lapses_after_expiry() {
    let mut env = env();
    let users: Vec<_> = (0..50).map(|_| member(env.tenant)).collect();

    let report = env
        .client
        .bulk_grant(
            &env.admin,
            BulkGrantRequest {
                subject_user_ids: users.iter().map(dac_security::Principal::user_id).collect(),
                target: GrantTarget::content_type(env.tenant, "Course"),
                permissions: PermissionType::READ | PermissionType::COMMENT,
                expires_at: env.in_days(30),
            },
        )
        .await
        .unwrap();
    assert_eq!(report.requested, 50);
    assert_eq!(report.succeeded, 50);
    assert_eq!(report.failed, 0);

    let events = env.audit_events();
    let per_subject = events
        .iter()
        .filter(|e| matches!(e, PermissionAuditEvent::Granted { .. }))
        .count();
    let aggregate = events
        .iter()
        .filter(|e| matches!(e, PermissionAuditEvent::BulkGranted { succeeded: 50, .. }))
        .count();
    assert_eq!((per_subject, aggregate), (50, 1));

    let course = ResourceLocator::resource("Course", Uuid::new_v4(), Some(env.tenant));
    for u in &users {
        assert!(env.client.check(u, PermissionType::READ, &course).await.unwrap().granted);
    }

    env.clock.advance(Duration::days(31));
    for u in &users {
        let decision = env.client.check(u, PermissionType::READ, &course).await.unwrap();
        assert!(!decision.granted, "grant for {} outlived its expiry", u.user_id());
        assert_eq!(decision.basis, DecisionBasis::NoGrant);
    }
}

#[tokio::test]
async fn unexpired_resource_grant_wins_regardless_of_lower_layers() {
    let env = env();
    let u = member(env.tenant);
    let doc = Uuid::new_v4();

    // Lower layers deny by holding only unrelated bits.
    env.grant(&u, GrantTarget::tenant(env.tenant), PermissionType::VOTE, None)
        .await;
    env.grant(
        &u,
        GrantTarget::content_type(env.tenant, "Document"),
        PermissionType::COMMENT,
        None,
    )
    .await;
    env.grant(
        &u,
        GrantTarget::resource("Document", doc, Some(env.tenant)),
        PermissionType::DELETE,
        env.in_days(1),
    )
    .await;

    let decision = env
        .client
        .check(
            &u,
            PermissionType::DELETE,
            &ResourceLocator::resource("Document", doc, Some(env.tenant)),
        )
        .await
        .unwrap();
    assert!(decision.granted);
    assert_eq!(decision.matched_layer, Some(PermissionLayer::Resource));
    assert_eq!(decision.expires_at, env.in_days(1));
}

#[tokio::test]
async fn tenant_only_allow_is_labelled_tenant() {
    let env = env();
    let u = member(env.tenant);
    env.grant(&u, GrantTarget::tenant(env.tenant), PermissionType::READ, None)
        .await;

    for locator in [
        ResourceLocator::content_type("Article", Some(env.tenant)),
        ResourceLocator::resource("Article", Uuid::new_v4(), Some(env.tenant)),
    ] {
        let decision = env
            .client
            .check(&u, PermissionType::READ, &locator)
            .await
            .unwrap();
        assert!(decision.granted);
        assert_eq!(decision.matched_layer, Some(PermissionLayer::Tenant));
        assert_eq!(decision.basis, DecisionBasis::Grant);
    }
}

#[tokio::test]
async fn global_resources_are_allowed_at_tenant_layer() {
    let env = env();
    let u = member(env.tenant);
    let id = Uuid::new_v4();

    let global = env
        .client
        .check(&u, PermissionType::READ, &ResourceLocator::resource("Help", id, None))
        .await
        .unwrap();
    assert!(global.granted);
    assert_eq!(global.matched_layer, Some(PermissionLayer::Tenant));
    assert_eq!(global.basis, DecisionBasis::GlobalResource);

    let owned = env
        .client
        .check(
            &u,
            PermissionType::READ,
            &ResourceLocator::resource("Help", id, Some(env.tenant)),
        )
        .await
        .unwrap();
    assert!(!owned.granted);
}

#[tokio::test]
async fn regranting_is_idempotent() {
    let mut env = env();
    let u = member(env.tenant);
    let target = GrantTarget::content_type(env.tenant, "Wiki");
    let locator = ResourceLocator::content_type("Wiki", Some(env.tenant));
    let expiry = env.in_days(7);

    let first = env
        .grant(&u, target.clone(), PermissionType::READ | PermissionType::EDIT, expiry)
        .await;
    let before = env.client.effective_permissions(&u, &locator).await.unwrap();
    let second = env
        .grant(&u, target, PermissionType::READ | PermissionType::EDIT, expiry)
        .await;
    let after = env.client.effective_permissions(&u, &locator).await.unwrap();

    assert_eq!(before, after);
    assert_eq!(first.revision, second.revision, "nothing was rewritten");

    let changed: Vec<bool> = env
        .audit_events()
        .into_iter()
        .filter_map(|e| match e {
            PermissionAuditEvent::Granted { changed, .. } => Some(changed),
            _ => None,
        })
        .collect();
    assert_eq!(changed, vec![true, false]);
}

#[tokio::test]
async fn granter_cannot_delegate_what_it_lacks() {
    let mut env = env();
    let granter = member(env.tenant);
    let subject = member(env.tenant);
    let page = Uuid::new_v4();
    env.grant(
        &granter,
        GrantTarget::resource("Page", page, Some(env.tenant)),
        PermissionType::READ | PermissionType::SHARE,
        None,
    )
    .await;
    env.audit_events();

    let err = env
        .client
        .grant(
            &granter,
            GrantRequest {
                subject_user_id: subject.user_id(),
                target: GrantTarget::resource("Page", page, Some(env.tenant)),
                permissions: PermissionType::READ | PermissionType::EDIT,
                expires_at: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PermissionsError::SelfEscalationDenied {
            missing: PermissionType::EDIT.into()
        }
    );

    assert!(env.client.list_grants(&env.admin, subject.user_id()).await.unwrap().is_empty());
    assert!(matches!(
        env.audit_events().as_slice(),
        [PermissionAuditEvent::GrantRejected { .. }]
    ));

    // What it does hold, it may pass on.
    let record = env
        .client
        .grant(
            &granter,
            GrantRequest {
                subject_user_id: subject.user_id(),
                target: GrantTarget::resource("Page", page, Some(env.tenant)),
                permissions: PermissionType::READ.into(),
                expires_at: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(record.granted_by, granter.user_id());
}

#[tokio::test]
async fn concurrent_grants_of_different_bits_both_survive() {
    let env = env();
    let u = member(env.tenant);
    let target = GrantTarget::tenant(env.tenant);

    let request = |permission: PermissionType| GrantRequest {
        subject_user_id: u.user_id(),
        target: target.clone(),
        permissions: permission.into(),
        expires_at: None,
    };
    let (a, b) = tokio::join!(
        env.client.grant(&env.admin, request(PermissionType::READ)),
        env.client.grant(&env.admin, request(PermissionType::VOTE)),
    );
    a.unwrap();
    b.unwrap();

    let held = env
        .client
        .effective_permissions(&u, &ResourceLocator::content_type("Poll", Some(env.tenant)))
        .await
        .unwrap();
    assert_eq!(held, PermissionType::READ | PermissionType::VOTE);
}

#[tokio::test]
async fn revoking_every_bit_restores_lower_layer() {
    let env = env();
    let u = member(env.tenant);
    let thread = Uuid::new_v4();
    let locator = ResourceLocator::resource("Thread", thread, Some(env.tenant));

    env.grant(
        &u,
        GrantTarget::content_type(env.tenant, "Thread"),
        PermissionType::COMMENT,
        None,
    )
    .await;
    env.grant(
        &u,
        GrantTarget::resource("Thread", thread, Some(env.tenant)),
        PermissionType::READ,
        None,
    )
    .await;
    assert!(
        !env.client
            .check(&u, PermissionType::COMMENT, &locator)
            .await
            .unwrap()
            .granted
    );

    env.client
        .revoke(
            &env.admin,
            RevokeRequest {
                subject_user_id: u.user_id(),
                target: GrantTarget::resource("Thread", thread, Some(env.tenant)),
                permissions: Some(PermissionType::READ.into()),
            },
        )
        .await
        .unwrap();

    let decision = env
        .client
        .check(&u, PermissionType::COMMENT, &locator)
        .await
        .unwrap();
    assert!(decision.granted);
    assert_eq!(decision.matched_layer, Some(PermissionLayer::ContentType));
}

#[tokio::test]
async fn grant_listing_is_limited_to_self_and_administrators() {
    let env = env();
    let u = member(env.tenant);
    env.grant(&u, GrantTarget::tenant(env.tenant), PermissionType::READ, None)
        .await;

    assert_eq!(env.client.list_grants(&u, u.user_id()).await.unwrap().len(), 1);
    assert_eq!(
        env.client
            .list_grants(&env.admin, u.user_id())
            .await
            .unwrap()
            .len(),
        1
    );
    let other = member(env.tenant);
    assert!(matches!(
        env.client.list_grants(&other, u.user_id()).await,
        Err(PermissionsError::Forbidden { .. })
    ));
}
