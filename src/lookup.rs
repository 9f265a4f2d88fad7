//! Unauthenticated report lookup by registration number.
//!
//! The store is read with full privilege here, so the only input ever
//! accepted is the registration number and every query is scoped to the
//! single student it names.

use std::sync::Arc;

use axum::{Extension, Json};
use serde::{Deserialize, Deserializer};

use crate::report::{ReportFile, StudentReport};
use crate::state::AppState;
use crate::{ApiJson, Error};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupRequest {
    #[serde(default, deserialize_with = "registration")]
    pub matricula: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Registration {
    Text(String),
    Number(u64),
}

/// Registration numbers arrive as JSON strings or bare numbers.
fn registration<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<Registration>::deserialize(deserializer)?.map(|r| match r {
            Registration::Text(text) => text,
            Registration::Number(number) => number.to_string(),
        }),
    )
}

/// Store failures leave this endpoint as a bare internal error, whatever
/// their kind.
fn sealed(err: Error) -> Error {
    match err {
        Error::InternalError { .. } => err,
        other => Error::internal("LookupError", format!("{:?}", other)),
    }
}

pub async fn lookup(state: &AppState, request: LookupRequest) -> Result<StudentReport, Error> {
    let registration = request
        .matricula
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Error::validation("matricula is required"))?;

    log::info!("Fetching student report for {}", registration);
    let student = state
        .store
        .find_student_by_registration(registration)
        .await
        .map_err(|e| sealed(e.into()))?
        .ok_or_else(Error::bare_not_found)?;

    StudentReport::gather(state.store.as_ref(), student)
        .await
        .map_err(|e| sealed(e.into()))
}

pub async fn get_student_report(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(request): ApiJson<LookupRequest>,
) -> Result<Json<StudentReport>, Error> {
    Ok(Json(lookup(&state, request).await?))
}

pub async fn download_student_report(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(request): ApiJson<LookupRequest>,
) -> Result<ReportFile, Error> {
    let report = lookup(&state, request).await?;
    Ok(ReportFile::build(&report, state.config.report_offset))
}
