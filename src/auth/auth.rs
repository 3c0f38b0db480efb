use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::LocalBoxFuture;

use crate::auth::jwt::verify_token;
use crate::auth::role::RoleResolver;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::model::role::Role;
use crate::models::{Claims, TokenType};
use crate::store::{Filterable, Store};

/// The authenticated principal for one request. Built fresh per request from
/// the bearer token and the role resolver.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
}

/// Reads and validates the bearer access token from the request headers.
pub fn bearer_claims(req: &HttpRequest) -> ApiResult<Claims> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized("Missing token"))?;

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| ApiError::Internal("Config missing".into()))?;

    let claims =
        verify_token(token, &config.jwt_secret).map_err(|_| ApiError::Unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Access {
        return Err(ApiError::Unauthorized("Access token required"));
    }

    Ok(claims)
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // the middleware has usually validated the token already
        let claims = match req.extensions().get::<Claims>().cloned() {
            Some(c) => Ok(c),
            None => bearer_claims(req),
        };
        let resolver = req.app_data::<Data<RoleResolver>>().cloned();

        Box::pin(async move {
            let claims = claims?;
            let resolver =
                resolver.ok_or_else(|| ApiError::Internal("Role resolver missing".into()))?;

            let role = resolver.resolve(claims.user_id).await.or(Role::Employee);

            Ok(AuthUser {
                user_id: claims.user_id,
                email: claims.sub,
                role,
            })
        })
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> ApiResult<()> {
        if self.role.is_manager() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("HR/Admin only"))
        }
    }

    /// The employee record linked to this principal, required by the
    /// self-service endpoints.
    pub async fn employee_id(&self, store: &Store) -> ApiResult<u64> {
        let row: Option<(u64,)> = store
            .from("employees")
            .select("id")
            .eq("profile_id", self.user_id)
            .maybe_single()
            .await?;

        row.map(|(id,)| id)
            .ok_or(ApiError::Forbidden("No employee profile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 1,
            email: "someone@company.com".into(),
            role,
        }
    }

    #[test]
    fn admin_passes_every_gate() {
        let admin = user(Role::Admin);
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_hr_or_admin().is_ok());
    }

    #[test]
    fn hr_is_a_manager_but_not_admin() {
        let hr = user(Role::Hr);
        assert!(hr.require_admin().is_err());
        assert!(hr.require_hr_or_admin().is_ok());
    }

    #[test]
    fn employees_are_kept_out_of_manager_pages() {
        let employee = user(Role::Employee);
        assert!(matches!(
            employee.require_hr_or_admin(),
            Err(ApiError::Forbidden(_))
        ));
    }
}
