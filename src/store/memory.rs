//! In-process store. Every operation runs under one lock, which gives it the
//! same uniqueness and all-or-nothing guarantees the PostgreSQL schema has.
//!
//! Nothing survives a restart: use it for development and tests only.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{DeletePolicy, Store, StoreError};
use crate::models::*;

#[derive(Debug, Clone)]
struct ParticipationRow {
    id: Uuid,
    student_id: Uuid,
    project_id: Uuid,
    status: Status,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    identities: Vec<Identity>,
    profiles: Vec<Profile>,
    sessions: HashMap<String, Session>,
    projects: Vec<Project>,
    students: Vec<Student>,
    participations: Vec<ParticipationRow>,
    attendance: Vec<AttendanceRecord>,
}

impl Tables {
    fn total_hours(&self, participation_id: Uuid) -> i64 {
        self.attendance
            .iter()
            .filter(|r| r.participation_id == participation_id)
            .map(|r| i64::from(r.hours))
            .sum()
    }

    fn participation(&self, row: &ParticipationRow) -> Participation {
        Participation {
            id: row.id,
            student_id: row.student_id,
            project_id: row.project_id,
            status: row.status,
            total_hours: self.total_hours(row.id),
            created_at: row.created_at,
        }
    }

    fn drop_participations(&mut self, doomed: impl Fn(&ParticipationRow) -> bool) {
        let ids: Vec<Uuid> = self
            .participations
            .iter()
            .filter(|p| doomed(p))
            .map(|p| p.id)
            .collect();
        self.attendance.retain(|r| !ids.contains(&r.participation_id));
        self.participations.retain(|p| !ids.contains(&p.id));
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_identity(&self, new: &NewProfile) -> Result<Profile, StoreError> {
        let mut t = self.tables.lock().await;
        if t.identities
            .iter()
            .any(|i| i.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(StoreError::Conflict(format!(
                "an account for `{}` already exists",
                new.email
            )));
        }
        let now = Utc::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            created_at: now,
        };
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id: identity.id,
            name: new.name.clone(),
            email: new.email.clone(),
            department: new.department.clone(),
            role: new.role,
            created_at: now,
        };
        t.identities.push(identity);
        t.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.identities
            .iter()
            .find(|i| i.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn delete_identity(&self, user_id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let before = t.identities.len();
        t.identities.retain(|i| i.id != user_id);
        if t.identities.len() == before {
            return Err(StoreError::NotFound);
        }
        t.profiles.retain(|p| p.user_id != user_id);
        t.sessions.retain(|_, s| s.user_id != user_id);
        for project in t.projects.iter_mut() {
            if project.coordinator_id == Some(user_id) {
                project.coordinator_id = None;
            }
        }
        for record in t.attendance.iter_mut() {
            if record.created_by == Some(user_id) {
                record.created_by = None;
            }
        }
        Ok(())
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if !t.identities.iter().any(|i| i.id == session.user_id) {
            return Err(StoreError::NotFound);
        }
        let now = Utc::now();
        t.sessions.retain(|_, s| s.expires_at >= now);
        t.sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.tables.lock().await.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.sessions.remove(token_hash).is_some())
    }

    async fn get_profile_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Profile, StoreError> {
        let t = self.tables.lock().await;
        t.profiles
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_profiles(&self, role: Role) -> Result<Vec<Profile>, StoreError> {
        let t = self.tables.lock().await;
        let mut profiles: Vec<Profile> = t
            .profiles
            .iter()
            .filter(|p| p.role == role)
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        department: Option<&str>,
    ) -> Result<Profile, StoreError> {
        let mut t = self.tables.lock().await;
        let profile = t
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;
        profile.name = name.to_string();
        profile.department = department.map(str::to_string);
        Ok(profile.clone())
    }

    async fn create_project(&self, new: &NewProject) -> Result<Project, StoreError> {
        let project = Project {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            description: new.description.clone(),
            coordinator_id: Some(new.coordinator_id),
            status: Status::Active,
            created_at: Utc::now(),
        };
        self.tables.lock().await.projects.push(project.clone());
        Ok(project)
    }

    async fn list_projects(&self, coordinator_id: Uuid) -> Result<Vec<Project>, StoreError> {
        let t = self.tables.lock().await;
        // newest first; rows were pushed in creation order
        Ok(t.projects
            .iter()
            .rev()
            .filter(|p| p.coordinator_id == Some(coordinator_id))
            .cloned()
            .collect())
    }

    async fn get_project(&self, id: Uuid) -> Result<Project, StoreError> {
        let t = self.tables.lock().await;
        t.projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_project(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, StoreError> {
        let mut t = self.tables.lock().await;
        let project = t
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;
        project.name = name.to_string();
        project.description = description.map(str::to_string);
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid, policy: DeletePolicy) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if !t.projects.iter().any(|p| p.id == id) {
            return Err(StoreError::NotFound);
        }
        let referenced = t.participations.iter().any(|p| p.project_id == id);
        match (referenced, policy) {
            (true, DeletePolicy::Restrict) => {
                return Err(StoreError::Conflict(
                    "project still has participations".to_string(),
                ))
            }
            (true, DeletePolicy::Cascade) => t.drop_participations(|p| p.project_id == id),
            (false, _) => {}
        }
        t.projects.retain(|p| p.id != id);
        Ok(())
    }

    async fn create_student(&self, new: &NewStudent) -> Result<Student, StoreError> {
        let mut t = self.tables.lock().await;
        if t.students.iter().any(|s| s.registration == new.registration) {
            return Err(StoreError::Conflict(format!(
                "registration `{}` is already taken",
                new.registration
            )));
        }
        let student = Student {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            registration: new.registration.clone(),
            email: new.email.clone(),
            course: new.course.clone(),
            entry_year: new.entry_year,
            created_at: Utc::now(),
        };
        t.students.push(student.clone());
        Ok(student)
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut students = self.tables.lock().await.students.clone();
        students.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(students)
    }

    async fn get_student(&self, id: Uuid) -> Result<Student, StoreError> {
        let t = self.tables.lock().await;
        t.students
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_student_by_registration(
        &self,
        registration: &str,
    ) -> Result<Option<Student>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.students
            .iter()
            .find(|s| s.registration == registration)
            .cloned())
    }

    async fn delete_student(&self, id: Uuid, policy: DeletePolicy) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if !t.students.iter().any(|s| s.id == id) {
            return Err(StoreError::NotFound);
        }
        let referenced = t.participations.iter().any(|p| p.student_id == id);
        match (referenced, policy) {
            (true, DeletePolicy::Restrict) => {
                return Err(StoreError::Conflict(
                    "student still has participations".to_string(),
                ))
            }
            (true, DeletePolicy::Cascade) => t.drop_participations(|p| p.student_id == id),
            (false, _) => {}
        }
        t.students.retain(|s| s.id != id);
        Ok(())
    }

    async fn list_participations(
        &self,
        filter: &ParticipationFilter,
    ) -> Result<Vec<ParticipationView>, StoreError> {
        let t = self.tables.lock().await;
        let mut views = Vec::new();
        for row in &t.participations {
            if filter.project_id.map_or(false, |id| id != row.project_id)
                || filter.student_id.map_or(false, |id| id != row.student_id)
                || filter.status.map_or(false, |s| s != row.status)
            {
                continue;
            }
            let project = t.projects.iter().find(|p| p.id == row.project_id);
            let student = t.students.iter().find(|s| s.id == row.student_id);
            if let (Some(project), Some(student)) = (project, student) {
                views.push(ParticipationView {
                    participation: t.participation(row),
                    project: project.clone(),
                    student: student.clone(),
                });
            }
        }
        Ok(views)
    }

    async fn list_student_participations(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<ProjectParticipation>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.participations
            .iter()
            .filter(|p| p.student_id == student_id)
            .map(|row| ProjectParticipation {
                participation: t.participation(row),
                project: t
                    .projects
                    .iter()
                    .find(|p| p.id == row.project_id)
                    .map(|p| ProjectRef {
                        name: p.name.clone(),
                        description: p.description.clone(),
                    }),
            })
            .collect())
    }

    async fn record_attendance(
        &self,
        batch: &AttendanceBatch,
    ) -> Result<AttendanceReceipt, StoreError> {
        let mut t = self.tables.lock().await;
        if !t.projects.iter().any(|p| p.id == batch.project_id)
            || !t.students.iter().any(|s| s.id == batch.student_id)
        {
            return Err(StoreError::NotFound);
        }

        let now = Utc::now();
        let existing = t
            .participations
            .iter()
            .find(|p| p.student_id == batch.student_id && p.project_id == batch.project_id)
            .cloned();
        let created = existing.is_none();
        let row = existing.unwrap_or_else(|| ParticipationRow {
            id: Uuid::new_v4(),
            student_id: batch.student_id,
            project_id: batch.project_id,
            status: Status::Active,
            created_at: now,
        });
        if created {
            t.participations.push(row.clone());
        }

        let records: Vec<AttendanceRecord> = batch
            .dates
            .iter()
            .map(|date| AttendanceRecord {
                id: Uuid::new_v4(),
                participation_id: row.id,
                date: *date,
                hours: batch.hours,
                activity_description: batch.activity_description.clone(),
                created_by: Some(batch.created_by),
                created_at: now,
            })
            .collect();
        t.attendance.extend(records.iter().cloned());

        Ok(AttendanceReceipt {
            participation: t.participation(&row),
            participation_created: created,
            records,
        })
    }

    async fn list_student_attendance(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let t = self.tables.lock().await;
        let ids: Vec<Uuid> = t
            .participations
            .iter()
            .filter(|p| p.student_id == student_id)
            .map(|p| p.id)
            .collect();
        Ok(t.attendance
            .iter()
            .filter(|r| ids.contains(&r.participation_id))
            .cloned()
            .collect())
    }
}
