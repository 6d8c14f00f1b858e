use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use super::handlers;
use crate::module::AppServices;

pub const BASE_PATH: &str = "/permissions/v1";

pub(crate) fn router(services: Arc<AppServices>) -> Router {
    let api = Router::new()
        .route("/grants", post(handlers::grant))
        .route("/grants/bulk", post(handlers::bulk_grant))
        .route("/grants/{user_id}", get(handlers::list_grants))
        .route("/revocations", post(handlers::revoke))
        .route("/effective", get(handlers::effective))
        .route("/check", get(handlers::check));

    Router::new().nest(BASE_PATH, api).with_state(services)
}
