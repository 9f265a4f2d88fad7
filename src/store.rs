//! The backend collaborator: identities, sessions and the four record
//! collections, behind one trait so handlers never see a concrete database.

pub mod memory;
pub mod postgres;

use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// What to do with participations when their project or student is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Refuse while anything still references the row.
    Restrict,
    /// Remove participations and their attendance in the same transaction.
    Cascade,
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // Identities

    /// Create an identity and its profile together. `Conflict` if the email
    /// already has an identity.
    async fn create_identity(&self, new: &NewProfile) -> Result<Profile, StoreError>;

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Remove an identity with its profile and sessions. Projects it owned
    /// keep existing without a coordinator.
    async fn delete_identity(&self, user_id: Uuid) -> Result<(), StoreError>;

    // Sessions

    async fn create_session(&self, session: &Session) -> Result<(), StoreError>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, StoreError>;

    async fn delete_session(&self, token_hash: &str) -> Result<bool, StoreError>;

    // Profiles

    async fn get_profile_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;

    async fn get_profile(&self, id: Uuid) -> Result<Profile, StoreError>;

    async fn list_profiles(&self, role: Role) -> Result<Vec<Profile>, StoreError>;

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        department: Option<&str>,
    ) -> Result<Profile, StoreError>;

    // Projects

    async fn create_project(&self, new: &NewProject) -> Result<Project, StoreError>;

    /// Projects owned by `coordinator_id`, newest first.
    async fn list_projects(&self, coordinator_id: Uuid) -> Result<Vec<Project>, StoreError>;

    async fn get_project(&self, id: Uuid) -> Result<Project, StoreError>;

    async fn update_project(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, StoreError>;

    async fn delete_project(&self, id: Uuid, policy: DeletePolicy) -> Result<(), StoreError>;

    // Students

    /// `Conflict` if the registration number is taken.
    async fn create_student(&self, new: &NewStudent) -> Result<Student, StoreError>;

    /// All students ordered by name.
    async fn list_students(&self) -> Result<Vec<Student>, StoreError>;

    async fn get_student(&self, id: Uuid) -> Result<Student, StoreError>;

    async fn find_student_by_registration(
        &self,
        registration: &str,
    ) -> Result<Option<Student>, StoreError>;

    async fn delete_student(&self, id: Uuid, policy: DeletePolicy) -> Result<(), StoreError>;

    // Participations

    async fn list_participations(
        &self,
        filter: &ParticipationFilter,
    ) -> Result<Vec<ParticipationView>, StoreError>;

    /// A student's participations joined with project name/description.
    async fn list_student_participations(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<ProjectParticipation>, StoreError>;

    // Attendance

    /// Find-or-create the participation for the batch's pair and append one
    /// record per date. All or nothing.
    async fn record_attendance(
        &self,
        batch: &AttendanceBatch,
    ) -> Result<AttendanceReceipt, StoreError>;

    /// Records whose participation belongs to `student_id`, in insertion order.
    async fn list_student_attendance(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
}
