use axum::{
    Router, middleware,
    routing::{get, post},
};

use luct_types::Role;

use crate::auth::{self, AppState};
use crate::middleware::{require_auth, role_gate};
use crate::{export, health, reports, users};

const LECTURER: &[Role] = &[Role::Lecturer];
const PRL: &[Role] = &[Role::Prl];
const PL: &[Role] = &[Role::Pl];

/// Full `/api` route table. Protected routes run `require_auth` first, then
/// the per-group role gate, then the handler's own ownership checks.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let lecturer_routes = Router::new()
        .route("/lecturer/classes", get(reports::list_classes))
        .route(
            "/lecturer/reports",
            get(reports::list_lecturer_reports).post(reports::submit_report),
        )
        .route_layer(middleware::from_fn_with_state(LECTURER, role_gate));

    let prl_routes = Router::new()
        .route("/prl/reports", get(reports::list_prl_reports))
        .route("/prl/reports/{id}/feedback", post(reports::add_feedback))
        .route_layer(middleware::from_fn_with_state(PRL, role_gate));

    let pl_routes = Router::new()
        .route("/pl/reports", get(reports::list_pl_reports))
        .route("/pl/reports/{id}/approve", post(reports::approve_report))
        .route_layer(middleware::from_fn_with_state(PL, role_gate));

    let account_routes = Router::new()
        .route(
            "/user/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{role}", get(users::list_users))
        .route("/profile", get(users::profile))
        .route("/reports/export", get(export::export_reports));

    let protected_routes = Router::new()
        .merge(lecturer_routes)
        .merge(prl_routes)
        .merge(pl_routes)
        .merge(account_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .with_state(state)
}
