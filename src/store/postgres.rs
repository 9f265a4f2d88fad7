use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{DeletePolicy, Store, StoreError};
use crate::models::*;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const PARTICIPATION_COLUMNS: &str = "p.id, p.student_id, p.project_id, p.status, p.created_at, \
    COALESCE((SELECT SUM(a.hours) FROM attendance_records a WHERE a.participation_id = p.id), 0) \
    AS total_hours";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(backend)?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

/// Unique and foreign-key violations are conflicts; everything else is the
/// backend's problem.
fn backend(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") | Some("23503") => {
                return StoreError::Conflict(db.message().to_string())
            }
            _ => {}
        }
    }
    StoreError::Backend(err.to_string())
}

fn parse<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T, StoreError> {
    value.parse().map_err(StoreError::Backend)
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    email: String,
    department: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = StoreError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Profile {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            department: row.department,
            role: parse(&row.role)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    coordinator_id: Option<Uuid>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            name: row.name,
            description: row.description,
            coordinator_id: row.coordinator_id,
            status: parse(&row.status)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ParticipationRow {
    id: Uuid,
    student_id: Uuid,
    project_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    total_hours: i64,
}

impl TryFrom<ParticipationRow> for Participation {
    type Error = StoreError;

    fn try_from(row: ParticipationRow) -> Result<Self, Self::Error> {
        Ok(Participation {
            id: row.id,
            student_id: row.student_id,
            project_id: row.project_id,
            status: parse(&row.status)?,
            total_hours: row.total_hours,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProjectParticipationRow {
    id: Uuid,
    student_id: Uuid,
    project_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    total_hours: i64,
    project_name: Option<String>,
    project_description: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ParticipationViewRow {
    id: Uuid,
    student_id: Uuid,
    project_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    total_hours: i64,
    project_name: String,
    project_description: Option<String>,
    project_coordinator_id: Option<Uuid>,
    project_status: String,
    project_created_at: DateTime<Utc>,
    student_name: String,
    student_registration: String,
    student_email: Option<String>,
    student_course: Option<String>,
    student_entry_year: Option<i32>,
    student_created_at: DateTime<Utc>,
}

impl TryFrom<ParticipationViewRow> for ParticipationView {
    type Error = StoreError;

    fn try_from(row: ParticipationViewRow) -> Result<Self, Self::Error> {
        let participation = Participation::try_from(ParticipationRow {
            id: row.id,
            student_id: row.student_id,
            project_id: row.project_id,
            status: row.status,
            created_at: row.created_at,
            total_hours: row.total_hours,
        })?;
        Ok(ParticipationView {
            project: Project {
                id: participation.project_id,
                name: row.project_name,
                description: row.project_description,
                coordinator_id: row.project_coordinator_id,
                status: parse(&row.project_status)?,
                created_at: row.project_created_at,
            },
            student: Student {
                id: participation.student_id,
                name: row.student_name,
                registration: row.student_registration,
                email: row.student_email,
                course: row.student_course,
                entry_year: row.student_entry_year,
                created_at: row.student_created_at,
            },
            participation,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_identity(&self, new: &NewProfile) -> Result<Profile, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query("INSERT INTO identities VALUES ($1, $2, $3, $4)")
            .bind(user_id)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(now)
            .execute(&mut tx)
            .await
            .map_err(|err| match backend(err) {
                StoreError::Conflict(_) => StoreError::Conflict(format!(
                    "an account for `{}` already exists",
                    new.email
                )),
                other => other,
            })?;

        let row = sqlx::query_as::<_, ProfileRow>(
            "INSERT INTO profiles VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.department)
        .bind(new.role.as_str())
        .bind(now)
        .fetch_one(&mut tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Profile::try_from(row)
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        sqlx::query_as::<_, Identity>(
            "SELECT * FROM identities WHERE LOWER(email) = LOWER($1) LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)
    }

    async fn delete_identity(&self, user_id: Uuid) -> Result<(), StoreError> {
        let affected = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if affected.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let pruned = sqlx::query("DELETE FROM user_sessions WHERE expires_at < NOW()")
            .execute(&mut tx)
            .await
            .map_err(backend)?;
        if pruned.rows_affected() > 0 {
            log::debug!("Pruned {} expired session(s)", pruned.rows_affected());
        }

        sqlx::query("INSERT INTO user_sessions VALUES ($1, $2, $3)")
            .bind(&session.token_hash)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&mut tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        sqlx::query_as::<_, Session>("SELECT * FROM user_sessions WHERE token_hash = $1 LIMIT 1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(affected.rows_affected() >= 1)
    }

    async fn get_profile_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1 LIMIT 1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(Profile::try_from)
            .transpose()
    }

    async fn get_profile(&self, id: Uuid) -> Result<Profile, StoreError> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)
            .and_then(Profile::try_from)
    }

    async fn list_profiles(&self, role: Role) -> Result<Vec<Profile>, StoreError> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE role = $1 ORDER BY name")
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(Profile::try_from)
            .collect()
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        department: Option<&str>,
    ) -> Result<Profile, StoreError> {
        sqlx::query_as::<_, ProfileRow>(
            "UPDATE profiles SET name = $2, department = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(department)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)
        .and_then(Profile::try_from)
    }

    async fn create_project(&self, new: &NewProject) -> Result<Project, StoreError> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "INSERT INTO projects VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.coordinator_id)
        .bind(Status::Active.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Project::try_from(row)
    }

    async fn list_projects(&self, coordinator_id: Uuid) -> Result<Vec<Project>, StoreError> {
        sqlx::query_as::<_, ProjectRow>(
            "SELECT * FROM projects WHERE coordinator_id = $1 ORDER BY created_at DESC",
        )
        .bind(coordinator_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?
        .into_iter()
        .map(Project::try_from)
        .collect()
    }

    async fn get_project(&self, id: Uuid) -> Result<Project, StoreError> {
        sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)
            .and_then(Project::try_from)
    }

    async fn update_project(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, StoreError> {
        sqlx::query_as::<_, ProjectRow>(
            "UPDATE projects SET name = $2, description = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)
        .and_then(Project::try_from)
    }

    async fn delete_project(&self, id: Uuid, policy: DeletePolicy) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let (referenced,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM participations WHERE project_id = $1")
                .bind(id)
                .fetch_one(&mut tx)
                .await
                .map_err(backend)?;
        if referenced > 0 {
            if policy == DeletePolicy::Restrict {
                return Err(StoreError::Conflict(
                    "project still has participations".to_string(),
                ));
            }
            sqlx::query("DELETE FROM participations WHERE project_id = $1")
                .bind(id)
                .execute(&mut tx)
                .await
                .map_err(backend)?;
        }

        let affected = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut tx)
            .await
            .map_err(backend)?;
        if affected.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        tx.commit().await.map_err(backend)
    }

    async fn create_student(&self, new: &NewStudent) -> Result<Student, StoreError> {
        sqlx::query_as::<_, Student>(
            "INSERT INTO students VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.registration)
        .bind(&new.email)
        .bind(&new.course)
        .bind(new.entry_year)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match backend(err) {
            StoreError::Conflict(_) => StoreError::Conflict(format!(
                "registration `{}` is already taken",
                new.registration
            )),
            other => other,
        })
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn get_student(&self, id: Uuid) -> Result<Student, StoreError> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)
    }

    async fn find_student_by_registration(
        &self,
        registration: &str,
    ) -> Result<Option<Student>, StoreError> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE registration = $1 LIMIT 1")
            .bind(registration)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn delete_student(&self, id: Uuid, policy: DeletePolicy) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let (referenced,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM participations WHERE student_id = $1")
                .bind(id)
                .fetch_one(&mut tx)
                .await
                .map_err(backend)?;
        if referenced > 0 {
            if policy == DeletePolicy::Restrict {
                return Err(StoreError::Conflict(
                    "student still has participations".to_string(),
                ));
            }
            sqlx::query("DELETE FROM participations WHERE student_id = $1")
                .bind(id)
                .execute(&mut tx)
                .await
                .map_err(backend)?;
        }

        let affected = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&mut tx)
            .await
            .map_err(backend)?;
        if affected.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        tx.commit().await.map_err(backend)
    }

    async fn list_participations(
        &self,
        filter: &ParticipationFilter,
    ) -> Result<Vec<ParticipationView>, StoreError> {
        let sql = format!(
            "SELECT {}, \
                pr.name AS project_name, pr.description AS project_description, \
                pr.coordinator_id AS project_coordinator_id, pr.status AS project_status, \
                pr.created_at AS project_created_at, \
                s.name AS student_name, s.registration AS student_registration, \
                s.email AS student_email, s.course AS student_course, \
                s.entry_year AS student_entry_year, s.created_at AS student_created_at \
             FROM participations p \
             JOIN projects pr ON pr.id = p.project_id \
             JOIN students s ON s.id = p.student_id \
             WHERE ($1::uuid IS NULL OR p.project_id = $1) \
               AND ($2::uuid IS NULL OR p.student_id = $2) \
               AND ($3::text IS NULL OR p.status = $3) \
             ORDER BY p.created_at",
            PARTICIPATION_COLUMNS
        );
        sqlx::query_as::<_, ParticipationViewRow>(&sql)
            .bind(filter.project_id)
            .bind(filter.student_id)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(ParticipationView::try_from)
            .collect()
    }

    async fn list_student_participations(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<ProjectParticipation>, StoreError> {
        let sql = format!(
            "SELECT {}, pr.name AS project_name, pr.description AS project_description \
             FROM participations p \
             LEFT JOIN projects pr ON pr.id = p.project_id \
             WHERE p.student_id = $1 \
             ORDER BY p.created_at",
            PARTICIPATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProjectParticipationRow>(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(ProjectParticipation {
                participation: Participation::try_from(ParticipationRow {
                    id: row.id,
                    student_id: row.student_id,
                    project_id: row.project_id,
                    status: row.status,
                    created_at: row.created_at,
                    total_hours: row.total_hours,
                })?,
                project: row.project_name.map(|name| ProjectRef {
                    name,
                    description: row.project_description,
                }),
            });
        }
        Ok(out)
    }

    async fn record_attendance(
        &self,
        batch: &AttendanceBatch,
    ) -> Result<AttendanceReceipt, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let project: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM projects WHERE id = $1")
            .bind(batch.project_id)
            .fetch_optional(&mut tx)
            .await
            .map_err(backend)?;
        let student: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM students WHERE id = $1")
            .bind(batch.student_id)
            .fetch_optional(&mut tx)
            .await
            .map_err(backend)?;
        if project.is_none() || student.is_none() {
            return Err(StoreError::NotFound);
        }

        let now = Utc::now();
        // A racing submission for the same pair blocks on the unique index
        // here and then falls through to the select below.
        let inserted = sqlx::query(
            "INSERT INTO participations VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (student_id, project_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(batch.student_id)
        .bind(batch.project_id)
        .bind(Status::Active.as_str())
        .bind(now)
        .execute(&mut tx)
        .await
        .map_err(backend)?;

        let participation_sql = format!(
            "SELECT {} FROM participations p WHERE p.student_id = $1 AND p.project_id = $2",
            PARTICIPATION_COLUMNS
        );
        let (participation_id,): (Uuid,) = sqlx::query_as(
            "SELECT id FROM participations WHERE student_id = $1 AND project_id = $2",
        )
        .bind(batch.student_id)
        .bind(batch.project_id)
        .fetch_one(&mut tx)
        .await
        .map_err(backend)?;

        let mut records = Vec::with_capacity(batch.dates.len());
        for date in &batch.dates {
            let record = sqlx::query_as::<_, AttendanceRecord>(
                "INSERT INTO attendance_records VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(participation_id)
            .bind(*date)
            .bind(batch.hours)
            .bind(&batch.activity_description)
            .bind(batch.created_by)
            .bind(now)
            .fetch_one(&mut tx)
            .await
            .map_err(backend)?;
            records.push(record);
        }

        let participation = sqlx::query_as::<_, ParticipationRow>(&participation_sql)
            .bind(batch.student_id)
            .bind(batch.project_id)
            .fetch_one(&mut tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(AttendanceReceipt {
            participation: Participation::try_from(participation)?,
            participation_created: inserted.rows_affected() == 1,
            records,
        })
    }

    async fn list_student_attendance(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        sqlx::query_as::<_, AttendanceRecord>(
            "SELECT a.* FROM attendance_records a \
             JOIN participations p ON p.id = a.participation_id \
             WHERE p.student_id = $1 \
             ORDER BY a.created_at, a.date",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }
}
