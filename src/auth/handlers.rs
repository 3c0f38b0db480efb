use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, ApiResult},
    model::{
        profile::Profile,
        role::Role,
        user::{RefreshTokenRecord, User},
    },
    models::{Claims, SignInReq, SignUpReq, TokenType},
    store::{Filterable, Row, SqlValue, Store, StoreError},
};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whether an account already uses this (normalized) email. Store failures
/// are returned to the caller, never read as "taken".
pub async fn email_taken(email: &str, store: &Store) -> ApiResult<bool> {
    let count = store
        .from("users")
        .select("id")
        .eq("email", email)
        .count()
        .await
        .map_err(|e| {
            error!(error = %e, "Email availability check failed");
            e
        })?;
    Ok(count > 0)
}

fn refresh_expiry(claims: &Claims) -> SqlValue {
    DateTime::<Utc>::from_timestamp(claims.exp as i64, 0).into()
}

async fn store_refresh_token(store: &Store, user_id: u64, claims: &Claims) -> ApiResult<()> {
    store
        .from("refresh_tokens")
        .insert(
            Row::new()
                .set("user_id", user_id)
                .set("jti", claims.jti.as_str())
                .set("expires_at", refresh_expiry(claims)),
        )
        .execute()
        .await?;
    Ok(())
}

fn token_error(e: jsonwebtoken::errors::Error) -> ApiError {
    ApiError::Internal(format!("token signing failed: {}", e))
}

/// Bearer token from the Authorization header, if any.
fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Register an account with an employee-role profile
#[utoipa::path(
    post,
    path = "/auth/sign-up",
    request_body = SignUpReq,
    responses(
        (status = 201, description = "Account created", body = Object, example = json!({
            "message": "User registered successfully",
            "user_id": 12
        })),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
pub async fn sign_up(
    payload: web::Json<SignUpReq>,
    store: web::Data<Store>,
) -> ApiResult<HttpResponse> {
    let email = normalize_email(&payload.email);
    let first_name = payload.first_name.trim();
    let last_name = payload.last_name.trim();

    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password must not be empty"));
    }
    if !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::bad_request("First and last name are required"));
    }

    // the unique key on users.email still catches a concurrent sign-up
    if email_taken(&email, &store).await? {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hashed = hash_password(&payload.password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;

    // account and profile land together or not at all
    let mut tx = store.pool().begin().await.map_err(StoreError::from)?;

    let user_id = store
        .from("users")
        .insert(Row::new().set("email", email.as_str()).set("password", hashed))
        .statement()?
        .execute(&mut *tx)
        .await?
        .last_insert_id();

    store
        .from("profiles")
        .insert(
            Row::new()
                .set("id", user_id)
                .set("first_name", first_name)
                .set("last_name", last_name)
                .set("email", email.as_str())
                .set("role", Role::Employee.as_ref()),
        )
        .statement()?
        .execute(&mut *tx)
        .await?;

    tx.commit().await.map_err(StoreError::from)?;

    info!(user_id, "Account registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user_id": user_id
    })))
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[utoipa::path(
    post,
    path = "/auth/sign-in",
    request_body = SignInReq,
    responses(
        (status = 200, description = "Signed in", body = TokenPair),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_sign_in",
    skip(store, config, payload),
    fields(email = %payload.email)
)]
pub async fn sign_in(
    payload: web::Json<SignInReq>,
    store: web::Data<Store>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Sign-in request received");

    // 1️⃣ Basic validation
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(ApiError::bad_request("Email or password required"));
    }

    // 2️⃣ Fetch user
    debug!("Fetching user from database");
    let user = store
        .from("users")
        .select("id, email, password")
        .eq("email", email.as_str())
        .maybe_single::<User>()
        .await?
        .ok_or_else(|| {
            info!("Invalid credentials: user not found");
            ApiError::Unauthorized("Invalid credentials")
        })?;

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&payload.password, &user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    // 4️⃣ Issue tokens
    let access_token = generate_access_token(
        user.id,
        &user.email,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user.id,
        &user.email,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

    // 5️⃣ Store refresh token
    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(&store, user.id, &refresh_claims).await?;

    // 6️⃣ Update last_login_at (non-fatal)
    if let Err(e) = store
        .from("users")
        .update(Row::new().set("last_login_at", Utc::now()))
        .eq("id", user.id)
        .execute()
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = user.id, "Sign-in successful");

    Ok(HttpResponse::Ok().json(TokenPair {
        access_token,
        refresh_token,
    }))
}

/// Rotate a refresh token: the presented one is revoked, a new pair is issued
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token missing, invalid or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    store: web::Data<Store>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let token = bearer(&req).ok_or(ApiError::Unauthorized("No token"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh token required"));
    }

    // 🔍 find refresh token in DB
    let record = store
        .from("refresh_tokens")
        .select("id, user_id, revoked")
        .eq("jti", claims.jti.as_str())
        .maybe_single::<RefreshTokenRecord>()
        .await?;

    let record = match record {
        Some(r) if !r.revoked => r,
        _ => return Err(ApiError::Unauthorized("Refresh token revoked")),
    };

    // 🔥 revoke old refresh token; losing this race means someone else rotated it
    let revoked = store
        .from("refresh_tokens")
        .update(Row::new().set("revoked", true))
        .eq("id", record.id)
        .eq("revoked", false)
        .execute()
        .await?;
    if revoked == 0 {
        return Err(ApiError::Unauthorized("Refresh token revoked"));
    }

    // 🔄 issue new pair
    let (new_refresh_token, new_claims) = generate_refresh_token(
        record.user_id,
        &claims.sub,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;
    store_refresh_token(&store, record.user_id, &new_claims).await?;

    let access_token = generate_access_token(
        record.user_id,
        &claims.sub,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    Ok(HttpResponse::Ok().json(TokenPair {
        access_token,
        refresh_token: new_refresh_token,
    }))
}

/// Revoke the presented refresh token. Always 204, even for unknown tokens
#[utoipa::path(
    post,
    path = "/auth/sign-out",
    responses((status = 204, description = "Signed out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn sign_out(
    req: HttpRequest,
    store: web::Data<Store>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = store
        .from("refresh_tokens")
        .update(Row::new().set("revoked", true))
        .eq("jti", claims.jti.as_str())
        .execute()
        .await
    {
        error!(error = %e, user_id = claims.user_id, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub profile: Option<Profile>,
}

/// Current principal: who is signed in and with which role
#[utoipa::path(
    get,
    path = "/auth",
    responses(
        (status = 200, description = "Current session", body = SessionResponse),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn session(auth: AuthUser, store: web::Data<Store>) -> ApiResult<HttpResponse> {
    let profile = store
        .from("profiles")
        .select("*")
        .eq("id", auth.user_id)
        .maybe_single::<Profile>()
        .await?;

    Ok(HttpResponse::Ok().json(SessionResponse {
        user_id: auth.user_id,
        email: auth.email,
        role: auth.role,
        profile,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::lazy_store;
    use actix_web::{ResponseError, http::StatusCode};

    #[test]
    fn refresh_expiry_binds_as_timestamp() {
        let claims = Claims {
            user_id: 1,
            sub: "a@b.c".into(),
            exp: 1_700_000_000,
            jti: "jti".into(),
            token_type: TokenType::Refresh,
        };
        assert!(matches!(refresh_expiry(&claims), SqlValue::Timestamp(_)));
    }

    #[test]
    fn emails_are_compared_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Jane@Company.COM "), "jane@company.com");
    }

    #[actix_web::test]
    async fn failed_availability_check_is_a_server_error_not_a_conflict() {
        let store = lazy_store();
        let err = email_taken("brand.new.person@company.com", &store)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Store(StoreError::Database(_))));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
