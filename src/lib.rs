pub mod attendance;
pub mod auth;
pub mod config;
pub mod coordinators;
pub mod err;
pub mod handoff;
pub mod lookup;
pub mod models;
pub mod report;
pub mod roster;
pub mod state;
pub mod store;

use std::sync::Arc;

use axum::handler::Handler;
use axum::http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{get, post, put};
use axum::{Extension, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

pub use crate::err::{ApiJson, ApiPath, ApiQuery, Error, Success};
use crate::state::AppState;

pub type Payload<T> = Result<Success<T>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Success::of(value))
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route(
            "/functions/create-coordinator",
            post(coordinators::create_coordinator),
        )
        .route(
            "/functions/delete-coordinator",
            post(coordinators::delete_coordinator),
        )
        .route("/functions/get-student-report", post(lookup::get_student_report))
        .route(
            "/functions/get-student-report/download",
            post(lookup::download_student_report),
        )
        .route("/coordinators", get(coordinators::list_coordinators))
        .route("/coordinators/:id", put(coordinators::update_coordinator))
        .route("/credentials", get(coordinators::issued_credentials))
        .route(
            "/projects",
            get(roster::list_projects).post(roster::create_project),
        )
        .route(
            "/projects/:id",
            put(roster::update_project).delete(roster::delete_project),
        )
        .route(
            "/students",
            get(roster::list_students).post(roster::create_student),
        )
        .route("/students/:id", axum::routing::delete(roster::delete_student))
        .route("/students/:id/report", get(report::student_report))
        .route("/participations", get(roster::list_participations))
        .route("/attendance", post(attendance::record_attendance))
        .fallback(err::handler404.into_service())
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(Extension(state)),
        )
}
