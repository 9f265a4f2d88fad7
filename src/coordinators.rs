//! Admin-side management of coordinator accounts.

use std::sync::Arc;

use axum::Extension;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{hash_password, AuthContext};
use crate::config::AdminBootstrap;
use crate::handoff::IssuedCredential;
use crate::models::{NewProfile, Profile, Role};
use crate::state::AppState;
use crate::{proceeds, ApiJson, ApiPath, ApiQuery, Error, Payload};

fn required(field: &str, value: &str) -> Result<String, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!(
            "Missing required field: {}",
            field
        )));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCoordinator {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub department: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub department: Option<String>,
}

impl From<&Profile> for ProvisionedUser {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.user_id,
            email: profile.email.clone(),
            role: profile.role,
            name: profile.name.clone(),
            department: profile.department.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorCreated {
    pub user: ProvisionedUser,
    pub message: &'static str,
}

pub async fn provision(
    state: &AppState,
    ctx: &AuthContext,
    body: CreateCoordinator,
) -> Result<Profile, Error> {
    ctx.require(Role::Admin)?;

    let email = required("email", &body.email)?;
    if body.password.is_empty() {
        return Err(Error::validation("Missing required field: password"));
    }
    let name = required("name", &body.name)?;
    let department = required("department", &body.department)?;

    let profile = state
        .store
        .create_identity(&NewProfile {
            email,
            password_hash: hash_password(&body.password)?,
            name,
            department: Some(department),
            role: Role::Coordinator,
        })
        .await?;
    log::info!("Coordinator created: {} ({})", profile.email, profile.user_id);

    state
        .handoff
        .remember(
            ctx.session_key(),
            ctx.session_expires_at(),
            IssuedCredential {
                email: profile.email.clone(),
                name: profile.name.clone(),
                password: body.password,
            },
        )
        .await;
    Ok(profile)
}

pub async fn create_coordinator(
    Extension(state): Extension<Arc<AppState>>,
    ctx: AuthContext,
    ApiJson(body): ApiJson<CreateCoordinator>,
) -> Payload<CoordinatorCreated> {
    let profile = provision(&state, &ctx, body).await?;
    proceeds(CoordinatorCreated {
        user: ProvisionedUser::from(&profile),
        message: "Coordinator created successfully",
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Coordinators {
    pub coordinators: Vec<Profile>,
}

pub fn matches_search(profile: &Profile, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    profile.name.to_lowercase().contains(&term)
        || profile
            .department
            .as_ref()
            .map_or(false, |d| d.to_lowercase().contains(&term))
}

pub async fn list_coordinators(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(query): ApiQuery<SearchQuery>,
    ctx: AuthContext,
) -> Payload<Coordinators> {
    ctx.require(Role::Admin)?;
    let mut coordinators = state.store.list_profiles(Role::Coordinator).await?;
    if let Some(term) = &query.search {
        coordinators.retain(|p| matches_search(p, term));
    }
    proceeds(Coordinators { coordinators })
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCoordinator {
    pub name: String,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorUpdated {
    pub coordinator: Profile,
}

pub async fn update_coordinator(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ctx: AuthContext,
    ApiJson(body): ApiJson<UpdateCoordinator>,
) -> Payload<CoordinatorUpdated> {
    ctx.require(Role::Admin)?;
    let name = required("name", &body.name)?;
    let department = body
        .department
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let existing = state.store.get_profile(id).await?;
    if existing.role != Role::Coordinator {
        return Err(Error::not_found("Coordinator not found"));
    }
    let coordinator = state.store.update_profile(id, &name, department).await?;
    proceeds(CoordinatorUpdated { coordinator })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCoordinator {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorDeleted {
    pub user_id: Uuid,
}

pub async fn remove(state: &AppState, ctx: &AuthContext, user_id: Uuid) -> Result<(), Error> {
    ctx.require(Role::Admin)?;
    if user_id == ctx.user_id() {
        return Err(Error::validation("An admin cannot delete their own account"));
    }
    match state.store.get_profile_by_user(user_id).await? {
        Some(profile) if profile.role != Role::Coordinator => {
            return Err(Error::not_found("Coordinator not found"))
        }
        Some(profile) => state.handoff.forget_email(&profile.email).await,
        None => {}
    }
    state.store.delete_identity(user_id).await.map_err(|err| match err {
        crate::store::StoreError::NotFound => Error::not_found("User not found"),
        other => other.into(),
    })?;
    log::info!("Coordinator {} deleted", user_id);
    Ok(())
}

pub async fn delete_coordinator(
    Extension(state): Extension<Arc<AppState>>,
    ctx: AuthContext,
    ApiJson(body): ApiJson<DeleteCoordinator>,
) -> Payload<CoordinatorDeleted> {
    ctx.require(Role::Admin)?;
    let user_id = body
        .user_id
        .ok_or_else(|| Error::validation("Missing required field: userId"))?;
    remove(&state, &ctx, user_id).await?;
    proceeds(CoordinatorDeleted { user_id })
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub credentials: Vec<IssuedCredential>,
}

/// Passwords this admin session handed out, for one-time display.
pub async fn issued_credentials(
    Extension(state): Extension<Arc<AppState>>,
    ctx: AuthContext,
) -> Payload<Credentials> {
    ctx.require(Role::Admin)?;
    proceeds(Credentials {
        credentials: state.handoff.list(ctx.session_key()).await,
    })
}

/// Create the configured admin account unless its email is already taken.
pub async fn bootstrap_admin(state: &AppState, admin: &AdminBootstrap) -> Result<(), Error> {
    if state.store.find_identity_by_email(&admin.email).await?.is_some() {
        log::info!("Admin account {} already present", admin.email);
        return Ok(());
    }
    let profile = state
        .store
        .create_identity(&NewProfile {
            email: admin.email.clone(),
            password_hash: hash_password(&admin.password)?,
            name: admin.name.clone(),
            department: None,
            role: Role::Admin,
        })
        .await?;
    log::info!("Admin user created: {}", profile.user_id);
    Ok(())
}
