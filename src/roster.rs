//! Coordinator-side projects, students and participations.

use std::sync::Arc;

use axum::Extension;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::models::{
    NewProject, NewStudent, ParticipationFilter, ParticipationView, Project, ProjectSummary, Role,
    Status, Student,
};
use crate::report::project_total_hours;
use crate::state::AppState;
use crate::store::DeletePolicy;
use crate::{proceeds, ApiJson, ApiPath, ApiQuery, Error, Payload};

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub cascade: bool,
}

impl DeleteQuery {
    fn policy(&self) -> DeletePolicy {
        if self.cascade {
            DeletePolicy::Cascade
        } else {
            DeletePolicy::Restrict
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub cascaded: bool,
}

/// The project, if the caller owns it. Someone else's project is reported
/// as missing.
async fn owned_project(state: &AppState, ctx: &AuthContext, id: Uuid) -> Result<Project, Error> {
    let project = state.store.get_project(id).await?;
    if project.coordinator_id != Some(ctx.user_id()) {
        return Err(Error::not_found("Project not found"));
    }
    Ok(project)
}

// Projects

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectForm {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSaved {
    pub project: Project,
}

#[derive(Debug, Clone, Serialize)]
pub struct Projects {
    pub projects: Vec<ProjectSummary>,
}

pub async fn create_project(
    Extension(state): Extension<Arc<AppState>>,
    ctx: AuthContext,
    ApiJson(form): ApiJson<ProjectForm>,
) -> Payload<ProjectSaved> {
    ctx.require(Role::Coordinator)?;
    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::validation("Missing required field: name"));
    }
    let project = state
        .store
        .create_project(&NewProject {
            name: name.to_string(),
            description: trimmed(form.description),
            coordinator_id: ctx.user_id(),
        })
        .await?;
    proceeds(ProjectSaved { project })
}

pub async fn list_projects(
    Extension(state): Extension<Arc<AppState>>,
    ctx: AuthContext,
) -> Payload<Projects> {
    ctx.require(Role::Coordinator)?;
    let projects = state.store.list_projects(ctx.user_id()).await?;
    let active = state
        .store
        .list_participations(&ParticipationFilter {
            status: Some(Status::Active),
            ..Default::default()
        })
        .await?;
    let participations: Vec<_> = active.iter().map(|v| &v.participation).collect();

    let projects = projects
        .into_iter()
        .map(|project| ProjectSummary {
            student_count: participations
                .iter()
                .filter(|p| p.project_id == project.id)
                .count(),
            total_hours: project_total_hours(project.id, participations.iter().copied()),
            project,
        })
        .collect();
    proceeds(Projects { projects })
}

pub async fn update_project(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ctx: AuthContext,
    ApiJson(form): ApiJson<ProjectForm>,
) -> Payload<ProjectSaved> {
    ctx.require(Role::Coordinator)?;
    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::validation("Missing required field: name"));
    }
    owned_project(&state, &ctx, id).await?;
    let description = trimmed(form.description);
    let project = state
        .store
        .update_project(id, name, description.as_deref())
        .await?;
    proceeds(ProjectSaved { project })
}

pub async fn delete_project(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DeleteQuery>,
    ctx: AuthContext,
) -> Payload<Deleted> {
    ctx.require(Role::Coordinator)?;
    owned_project(&state, &ctx, id).await?;
    state.store.delete_project(id, query.policy()).await?;
    log::info!("Project {} deleted (cascade: {})", id, query.cascade);
    proceeds(Deleted {
        id,
        cascaded: query.cascade,
    })
}

// Students

#[derive(Debug, Clone, Deserialize)]
pub struct StudentForm {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "matricula")]
    pub registration: String,
    pub email: Option<String>,
    pub course: Option<String>,
    pub entry_year: Option<i32>,
}

impl StudentForm {
    pub fn validate(self) -> Result<NewStudent, Error> {
        let name = self.name.trim();
        let registration = self.registration.trim();
        if name.is_empty() || registration.is_empty() {
            return Err(Error::validation(
                "Missing required fields: name, registration",
            ));
        }
        Ok(NewStudent {
            name: name.to_string(),
            registration: registration.to_string(),
            email: trimmed(self.email),
            course: trimmed(self.course),
            entry_year: self.entry_year,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSaved {
    pub student: Student,
}

#[derive(Debug, Clone, Serialize)]
pub struct Students {
    pub students: Vec<Student>,
}

pub async fn create_student(
    Extension(state): Extension<Arc<AppState>>,
    ctx: AuthContext,
    ApiJson(form): ApiJson<StudentForm>,
) -> Payload<StudentSaved> {
    ctx.require(Role::Coordinator)?;
    let student = state.store.create_student(&form.validate()?).await?;
    proceeds(StudentSaved { student })
}

pub async fn list_students(
    Extension(state): Extension<Arc<AppState>>,
    ctx: AuthContext,
) -> Payload<Students> {
    ctx.require(Role::Coordinator)?;
    proceeds(Students {
        students: state.store.list_students().await?,
    })
}

pub async fn delete_student(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DeleteQuery>,
    ctx: AuthContext,
) -> Payload<Deleted> {
    ctx.require(Role::Coordinator)?;
    state.store.delete_student(id, query.policy()).await?;
    log::info!("Student {} deleted (cascade: {})", id, query.cascade);
    proceeds(Deleted {
        id,
        cascaded: query.cascade,
    })
}

// Participations

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipationQuery {
    pub project_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Participations {
    pub participations: Vec<ParticipationView>,
    pub total_hours: i64,
}

pub async fn list_participations(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ParticipationQuery>,
    ctx: AuthContext,
) -> Payload<Participations> {
    ctx.require(Role::Coordinator)?;
    let participations = state
        .store
        .list_participations(&ParticipationFilter {
            project_id: query.project_id,
            student_id: query.student_id,
            status: Some(query.status.unwrap_or_default()),
        })
        .await?;
    let total_hours = crate::report::total_hours(participations.iter().map(|v| &v.participation));
    proceeds(Participations {
        participations,
        total_hours,
    })
}
