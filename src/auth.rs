use std::ops::Add;
use std::sync::Arc;

use axum::extract::{FromRequest, RequestParts};
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{async_trait, Extension, TypedHeader};
use chrono::{DateTime, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Principal, Profile, Role, Session};
use crate::state::AppState;
use crate::{proceeds, ApiJson, ApiQuery, Error, Payload};

const NO_SESSION: &str = "No active session, select a profile and sign in";

pub fn hash_password(password: &str) -> Result<String, Error> {
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(hash) => Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok(),
        Err(_) => false,
    }
}

/// Fresh bearer token: 32 random bytes, hashed and hex encoded.
pub fn new_session_token() -> String {
    let ssid_bytes: [u8; 32] = thread_rng().gen();
    let mut hasher: Sha256 = Digest::new();
    hasher.update(&ssid_bytes);
    hex::encode(hasher.finalize())
}

/// What the store keeps instead of the bearer token itself.
pub fn token_hash(token: &str) -> String {
    let mut hasher: Sha256 = Digest::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub enum AuthResult {
    Success(AuthContext),
    SessionExpired,
    InvalidSession,
}

/// The signed-in principal for one request. Handlers receive it explicitly;
/// nothing about the caller lives in global state.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub profile: Profile,
    session: String,
    expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn session_key(&self) -> &str {
        &self.session
    }

    pub fn session_expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn user_id(&self) -> Uuid {
        self.principal.id
    }

    /// Gate for operations that need a specific role.
    pub fn require(&self, role: Role) -> Result<(), Error> {
        if self.principal.role != role {
            return Err(Error::unauthorized(format!(
                "This operation requires the {} role",
                role
            )));
        }
        Ok(())
    }
}

pub async fn ensure_authenticated(
    state: &AppState,
    token: Option<&str>,
) -> Result<AuthResult, Error> {
    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return Ok(AuthResult::InvalidSession),
    };
    let key = token_hash(token);

    let session = match state.store.find_session(&key).await? {
        Some(session) => session,
        None => return Ok(AuthResult::InvalidSession),
    };
    if Utc::now().gt(&session.expires_at) {
        state.store.delete_session(&key).await?;
        state.handoff.evict(&key).await;
        return Ok(AuthResult::SessionExpired);
    }

    match state.store.get_profile_by_user(session.user_id).await? {
        Some(profile) => Ok(AuthResult::Success(AuthContext {
            principal: profile.principal(),
            profile,
            session: key,
            expires_at: session.expires_at,
        })),
        None => Ok(AuthResult::InvalidSession),
    }
}

#[async_trait]
impl<B: Send> FromRequest<B> for AuthContext {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(state) = Extension::<Arc<AppState>>::from_request(req)
            .await
            .map_err(|err| Error::internal("MissingState", err.to_string()))?;
        let bearer = TypedHeader::<Authorization<Bearer>>::from_request(req)
            .await
            .ok();
        let token = bearer.as_ref().map(|TypedHeader(auth)| auth.0.token());

        match ensure_authenticated(&state, token).await? {
            AuthResult::Success(ctx) => Ok(ctx),
            AuthResult::SessionExpired => Err(Error::unauthorized(
                "Session expired, select a profile and sign in again",
            )),
            AuthResult::InvalidSession => Err(Error::unauthorized(NO_SESSION)),
        }
    }
}

pub async fn open_session(state: &AppState, user_id: Uuid) -> Result<(String, Session), Error> {
    let token = new_session_token();
    let session = Session {
        token_hash: token_hash(&token),
        user_id,
        expires_at: Utc::now().add(state.config.session_ttl),
    };
    state.store.create_session(&session).await?;
    Ok((token, session))
}

pub async fn sign_out(state: &AppState, ctx: &AuthContext) -> Result<bool, Error> {
    let dropped = state.store.delete_session(ctx.session_key()).await?;
    state.handoff.evict(ctx.session_key()).await;
    Ok(dropped)
}

/// The dashboard role gate. A mismatch ends the session on the spot.
pub async fn resolve_role(
    state: &AppState,
    ctx: &AuthContext,
    expected: Role,
) -> Result<RoleGranted, Error> {
    if ctx.principal.role != expected {
        log::warn!(
            "{} tried to enter the {} dashboard as {}",
            ctx.principal.email,
            expected,
            ctx.principal.role
        );
        sign_out(state, ctx).await?;
        return Err(Error::access_denied(format!(
            "Esta conta não tem permissão para acessar como {}.",
            expected.display_name()
        )));
    }
    Ok(RoleGranted {
        message: "Login realizado com sucesso!",
        profile: ctx.profile.clone(),
    })
}

pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(login): ApiJson<LoginRequest>,
) -> Payload<LoggedIn> {
    if login.email.trim().is_empty() || login.password.is_empty() {
        return Err(Error::validation("`email` and `password` are required"));
    }

    let identity = state.store.find_identity_by_email(login.email.trim()).await?;
    let identity = match identity {
        Some(identity) if verify_password(&login.password, &identity.password_hash) => identity,
        _ => return Err(Error::unauthorized("Email ou senha incorretos.")),
    };
    let profile = state
        .store
        .get_profile_by_user(identity.id)
        .await?
        .ok_or_else(|| Error::unauthorized("Email ou senha incorretos."))?;

    let (token, session) = open_session(&state, identity.id).await?;
    let ctx = AuthContext {
        principal: profile.principal(),
        profile,
        session: session.token_hash,
        expires_at: session.expires_at,
    };
    let granted = resolve_role(&state, &ctx, login.role).await?;

    proceeds(LoggedIn {
        session_id: token,
        user_id: identity.id,
        expires_at: session.expires_at,
        granted,
    })
}

pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    ctx: AuthContext,
) -> Payload<SessionDropped> {
    let drop_success = sign_out(&state, &ctx).await?;
    proceeds(SessionDropped {
        user_id: ctx.user_id(),
        drop_success,
    })
}

/// Dashboard entry: is the caller signed in, and as the right role?
pub async fn session(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RoleQuery>,
    ctx: AuthContext,
) -> Payload<RoleGranted> {
    proceeds(resolve_role(&state, &ctx, query.role).await?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleQuery {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleGranted {
    pub message: &'static str,
    pub profile: Profile,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedIn {
    pub session_id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub granted: RoleGranted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDropped {
    pub user_id: Uuid,
    pub drop_success: bool,
}
