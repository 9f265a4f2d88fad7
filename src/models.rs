use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Coordinator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Coordinator => "coordinator",
        }
    }

    /// How the role reads in user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "administrador",
            Role::Coordinator => "coordenador",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "coordinator" => Ok(Role::Coordinator),
            other => Err(format!("unknown role `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl Default for Status {
    fn default() -> Self {
        Status::Active
    }
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Status::Active),
            "inactive" => Ok(Status::Inactive),
            other => Err(format!("unknown status `{}`", other)),
        }
    }
}

/// Account as the identity provider sees it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Authenticated identity together with its stored role claim.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.user_id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub coordinator_id: Option<Uuid>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "matricula")]
    pub registration: String,
    pub email: Option<String>,
    pub course: Option<String>,
    pub entry_year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Participation with its derived hour total.
#[derive(Debug, Clone, Serialize)]
pub struct Participation {
    pub id: Uuid,
    pub student_id: Uuid,
    pub project_id: Uuid,
    pub status: Status,
    pub total_hours: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub participation_id: Uuid,
    pub date: NaiveDate,
    pub hours: i32,
    pub activity_description: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRef {
    pub name: String,
    pub description: Option<String>,
}

/// Participation joined with its project, as the public lookup returns it.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectParticipation {
    #[serde(flatten)]
    pub participation: Participation,
    pub project: Option<ProjectRef>,
}

/// Participation joined with both sides, for the coordinator dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipationView {
    #[serde(flatten)]
    pub participation: Participation,
    pub project: Project,
    pub student: Student,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub student_count: usize,
    pub total_hours: i64,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub department: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub coordinator_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub registration: String,
    pub email: Option<String>,
    pub course: Option<String>,
    pub entry_year: Option<i32>,
}

/// Attendance for one (student, project) pair across a set of dates, written
/// as a single unit.
#[derive(Debug, Clone)]
pub struct AttendanceBatch {
    pub project_id: Uuid,
    pub student_id: Uuid,
    pub hours: i32,
    pub dates: Vec<NaiveDate>,
    pub activity_description: String,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReceipt {
    pub participation: Participation,
    pub participation_created: bool,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct ParticipationFilter {
    pub project_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub status: Option<Status>,
}
