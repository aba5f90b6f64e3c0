//! Bearer-token authentication: JWT issue/verify, argon2 password checks,
//! the request middleware, and the login endpoints.

use std::{collections::BTreeSet, sync::Arc};

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  Extension, Json,
  extract::{Request, State},
  http::{StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use halo_api::{ApiError, Caller, TenantContext};
use halo_core::{
  auth::{NewUser, Permission, Principal, Role, UserView},
  store::SurveyStore,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ServerConfig;

// ─── Tokens ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub:          Uuid,
  pub tenant_id:    Option<Uuid>,
  pub role:         Role,
  pub permissions:  BTreeSet<Permission>,
  pub evaluator_id: Option<Uuid>,
  pub iss:          String,
  pub aud:          String,
  pub iat:          usize,
  pub exp:          usize,
}

#[derive(Clone)]
pub struct JwtService {
  encoding: EncodingKey,
  decoding: DecodingKey,
  issuer:   String,
  audience: String,
  expiry:   Duration,
}

impl JwtService {
  pub fn new(secret: &str, issuer: &str, audience: &str, expiry: Duration) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      issuer:   issuer.to_owned(),
      audience: audience.to_owned(),
      expiry,
    }
  }

  pub fn from_config(config: &ServerConfig) -> Self {
    Self::new(
      &config.jwt_secret,
      &config.jwt_issuer,
      &config.jwt_audience,
      Duration::minutes(config.jwt_expiry_minutes),
    )
  }

  pub fn expiry(&self) -> Duration { self.expiry }

  pub fn issue(&self, principal: &Principal) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now();
    let claims = Claims {
      sub:          principal.user_id,
      tenant_id:    principal.tenant_id,
      role:         principal.role,
      permissions:  principal.permissions.clone(),
      evaluator_id: principal.evaluator_id,
      iss:          self.issuer.clone(),
      aud:          self.audience.clone(),
      iat:          now.timestamp().max(0) as usize,
      exp:          (now + self.expiry).timestamp().max(0) as usize,
    };
    encode(&Header::default(), &claims, &self.encoding)
  }

  pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<Principal> {
    let mut validation = Validation::default();
    validation.set_audience(&[self.audience.clone()]);
    validation.set_issuer(&[self.issuer.clone()]);
    let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
    Ok(Principal {
      user_id:      claims.sub,
      tenant_id:    claims.tenant_id,
      role:         claims.role,
      permissions:  claims.permissions,
      evaluator_id: claims.evaluator_id,
    })
  }
}

// ─── Passwords ────────────────────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)?
      .to_string(),
  )
}

/// `false` for a wrong password and for an unparsable hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
  match PasswordHash::new(hash) {
    Ok(parsed) => Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok(),
    Err(e) => {
      tracing::warn!(error = %e, "stored password hash is malformed");
      false
    }
  }
}

// ─── Service ──────────────────────────────────────────────────────────────────

/// Everything the auth endpoints need, shared as an [`Extension`].
pub struct AuthService {
  pub jwt:                 JwtService,
  pub admin_email:         String,
  pub admin_password_hash: String,
}

impl AuthService {
  pub fn from_config(config: &ServerConfig) -> Self {
    Self {
      jwt:                 JwtService::from_config(config),
      admin_email:         config.admin_email.trim().to_lowercase(),
      admin_password_hash: config.admin_password_hash.clone(),
    }
  }

  fn token_response(&self, principal: &Principal) -> Result<Json<TokenResponse>, ApiError> {
    let token = self
      .jwt
      .issue(principal)
      .map_err(|e| ApiError::Internal(format!("could not sign token: {e}")))?;
    Ok(Json(TokenResponse {
      access_token: token,
      token_type:   "Bearer",
      expires_in:   self.jwt.expiry().num_seconds(),
    }))
  }
}

/// Middleware: decode an `Authorization: Bearer` token into a [`Principal`].
///
/// Requests without the header pass through anonymously; a header that is
/// present but invalid is rejected outright.
pub async fn authenticate(
  State(auth): State<Arc<AuthService>>,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let principal = match req.headers().get(header::AUTHORIZATION) {
    None => None,
    Some(value) => {
      let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;
      let principal = auth.jwt.verify(token.trim()).map_err(|e| {
        tracing::debug!(error = %e, "bearer token rejected");
        ApiError::Unauthorized
      })?;
      Some(principal)
    }
  };

  if let Some(principal) = principal {
    req.extensions_mut().insert(principal);
  }
  Ok(next.run(req).await)
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub token_type:   &'static str,
  pub expires_in:   i64,
}

/// `POST /auth/login`: super-admin credentials from configuration.
pub async fn admin_login(
  Extension(auth): Extension<Arc<AuthService>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<TokenResponse>, ApiError> {
  if body.email.trim().to_lowercase() != auth.admin_email
    || !verify_password(&body.password, &auth.admin_password_hash)
  {
    tracing::info!(email = %body.email, "super-admin login failed");
    return Err(ApiError::Unauthorized);
  }

  let principal = Principal {
    user_id:      Uuid::nil(),
    tenant_id:    None,
    role:         Role::SuperAdmin,
    permissions:  Role::SuperAdmin.permissions(),
    evaluator_id: None,
  };
  auth.token_response(&principal)
}

/// `POST /t/{tenant}/auth/login`: a user of that tenant.
pub async fn tenant_login<S>(
  State(store): State<Arc<S>>,
  Extension(auth): Extension<Arc<AuthService>>,
  TenantContext(tenant): TenantContext,
  Json(body): Json<LoginBody>,
) -> Result<Json<TokenResponse>, ApiError>
where
  S: SurveyStore,
{
  let user = store
    .find_user_by_email(tenant.tenant_id, &body.email)
    .await
    .map_err(ApiError::store)?
    .filter(|u| u.active)
    .filter(|u| verify_password(&body.password, &u.password_hash));

  let Some(user) = user else {
    tracing::info!(tenant = %tenant.slug, email = %body.email, "login failed");
    return Err(ApiError::Unauthorized);
  };

  let principal = Principal {
    user_id:      user.user_id,
    tenant_id:    Some(user.tenant_id),
    role:         user.role,
    permissions:  user.role.permissions(),
    evaluator_id: user.evaluator_id,
  };
  tracing::info!(tenant = %tenant.slug, user_id = %user.user_id, role = %user.role, "login");
  auth.token_response(&principal)
}

// ─── Users ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
  pub email:        String,
  pub password:     String,
  pub role:         Role,
  pub evaluator_id: Option<Uuid>,
}

/// `POST /t/{tenant}/users`: create a tenant login.
pub async fn create_user<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Json(body): Json<CreateUserBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManagePeople)?;
  if body.role == Role::SuperAdmin {
    return Err(ApiError::BadRequest("super_admin is not a tenant role".into()));
  }
  if body.role == Role::Evaluator && body.evaluator_id.is_none() {
    return Err(ApiError::BadRequest("evaluator logins need an evaluator_id".into()));
  }
  if !body.email.contains('@') {
    return Err(ApiError::BadRequest(format!("invalid email {:?}", body.email)));
  }
  if body.password.len() < 8 {
    return Err(ApiError::BadRequest("password must be at least 8 characters".into()));
  }

  let password_hash = hash_password(&body.password)
    .map_err(|e| ApiError::Internal(format!("cannot hash password: {e}")))?;
  let user = store
    .create_user(tenant.tenant_id, NewUser {
      email: body.email,
      password_hash,
      role: body.role,
      evaluator_id: body.evaluator_id,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(tenant = %tenant.slug, user_id = %user.user_id, role = %user.role, "user created");
  Ok((StatusCode::CREATED, Json(UserView::from(user))))
}
