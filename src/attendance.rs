use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Extension;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::models::{AttendanceBatch, AttendanceRecord, Participation, Role};
use crate::state::AppState;
use crate::{proceeds, ApiJson, Error, Payload};

pub const DEFAULT_ACTIVITY: &str = "Atividade registrada";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateMode {
    Single,
    Multiple,
}

impl Default for DateMode {
    fn default() -> Self {
        DateMode::Single
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordAttendance {
    pub project_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub hours: i64,
    #[serde(default)]
    pub mode: DateMode,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    pub activity: Option<String>,
}

impl RecordAttendance {
    /// Check the submission and turn it into a store batch. `today` fills in
    /// a single-date submission that names no date.
    pub fn into_batch(self, created_by: Uuid, today: NaiveDate) -> Result<AttendanceBatch, Error> {
        let (project_id, student_id) = match (self.project_id, self.student_id) {
            (Some(project), Some(student)) => (project, student),
            _ => return Err(Error::validation("Selecione um projeto e um aluno.")),
        };
        let hours = i32::try_from(self.hours)
            .ok()
            .filter(|h| *h > 0)
            .ok_or_else(|| Error::validation("`hours` must be a positive whole number"))?;

        let dates: Vec<NaiveDate> = match self.mode {
            DateMode::Single => vec![self.date.unwrap_or(today)],
            DateMode::Multiple => {
                let unique: BTreeSet<NaiveDate> = self.dates.into_iter().collect();
                unique.into_iter().collect()
            }
        };
        if dates.is_empty() {
            return Err(Error::validation("Selecione pelo menos uma data."));
        }

        let activity_description = match self.activity {
            Some(activity) if !activity.trim().is_empty() => activity.trim().to_string(),
            _ => DEFAULT_ACTIVITY.to_string(),
        };

        Ok(AttendanceBatch {
            project_id,
            student_id,
            hours,
            dates,
            activity_description,
            created_by,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRegistered {
    pub participation: Participation,
    pub participation_created: bool,
    pub records: Vec<AttendanceRecord>,
    pub days: usize,
    pub total_hours_registered: i64,
}

pub async fn record(
    state: &AppState,
    ctx: &AuthContext,
    submission: RecordAttendance,
) -> Result<AttendanceRegistered, Error> {
    ctx.require(Role::Coordinator)?;
    let batch = submission.into_batch(ctx.user_id(), Utc::now().date_naive())?;

    let project = state.store.get_project(batch.project_id).await?;
    if project.coordinator_id != Some(ctx.user_id()) {
        return Err(Error::not_found("Project not found"));
    }

    let receipt = state.store.record_attendance(&batch).await?;
    let days = receipt.records.len();
    let total = i64::from(batch.hours) * days as i64;
    log::info!(
        "{}h registered over {} day(s) for participation {}",
        total,
        days,
        receipt.participation.id
    );

    Ok(AttendanceRegistered {
        total_hours_registered: total,
        days,
        participation: receipt.participation,
        participation_created: receipt.participation_created,
        records: receipt.records,
    })
}

pub async fn record_attendance(
    Extension(state): Extension<Arc<AppState>>,
    ctx: AuthContext,
    ApiJson(body): ApiJson<RecordAttendance>,
) -> Payload<AttendanceRegistered> {
    proceeds(record(&state, &ctx, body).await?)
}
