use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        employee::{EMPLOYEE_COLUMNS, Employee},
        profile::Profile,
    },
    store::{Filterable, Row, Store},
};

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub profile: Profile,
    /// Absent for accounts without an employee record
    pub employee: Option<Employee>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfile {
    #[schema(example = "Jane")]
    pub first_name: Option<String>,
    #[schema(example = "Doe")]
    pub last_name: Option<String>,
    /// Empty string clears the phone number
    #[schema(example = "+8801712345678")]
    pub phone: Option<String>,
    #[schema(example = "https://cdn.company.com/avatars/12.png")]
    pub avatar_url: Option<String>,
}

impl UpdateProfile {
    fn into_row(self) -> ApiResult<Row> {
        let mut row = Row::new();
        for (column, value) in [("first_name", self.first_name), ("last_name", self.last_name)] {
            if let Some(value) = value {
                let value = value.trim();
                if value.is_empty() {
                    return Err(ApiError::bad_request(format!("{} must not be empty", column)));
                }
                row.push(column, value);
            }
        }
        for (column, value) in [("phone", self.phone), ("avatar_url", self.avatar_url)] {
            if let Some(value) = value {
                let value = value.trim();
                row.push(column, (!value.is_empty()).then_some(value));
            }
        }
        if row.is_empty() {
            return Err(ApiError::bad_request("No fields provided for update"));
        }
        Ok(row)
    }
}

#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Own profile", body = ProfileResponse),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn get_profile(auth: AuthUser, store: web::Data<Store>) -> ApiResult<HttpResponse> {
    let profile = store
        .from("profiles")
        .select("*")
        .eq("id", auth.user_id)
        .maybe_single::<Profile>();
    let employee = store
        .from("employees e")
        .select(EMPLOYEE_COLUMNS)
        .left_join("profiles p", "p.id = e.profile_id")
        .left_join("departments d", "d.id = e.department_id")
        .eq("e.profile_id", auth.user_id)
        .maybe_single::<Employee>();

    let (profile, employee) = futures::try_join!(profile, employee).map_err(|e| {
        error!(error = %e, user_id = auth.user_id, "Failed to load profile");
        e
    })?;
    let profile = profile.ok_or(ApiError::NotFound("Profile not found"))?;

    Ok(HttpResponse::Ok().json(ProfileResponse { profile, employee }))
}

#[utoipa::path(
    put,
    path = "/api/profile",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = Object, example = json!({
            "message": "Profile updated successfully"
        })),
        (status = 400, description = "Nothing to update or blank name")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn update_profile(
    auth: AuthUser,
    store: web::Data<Store>,
    payload: web::Json<UpdateProfile>,
) -> ApiResult<HttpResponse> {
    let row = payload.into_inner().into_row()?;

    store
        .from("profiles")
        .update(row)
        .eq("id", auth.user_id)
        .execute()
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqlValue;

    fn update(first: Option<&str>, phone: Option<&str>) -> UpdateProfile {
        UpdateProfile {
            first_name: first.map(Into::into),
            last_name: None,
            phone: phone.map(Into::into),
            avatar_url: None,
        }
    }

    #[test]
    fn only_provided_fields_are_written() {
        let row = update(Some(" Jane "), None).into_row().unwrap();
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["first_name"]);
        assert_eq!(
            row.into_values().collect::<Vec<_>>(),
            vec![SqlValue::String("Jane".into())]
        );
    }

    #[test]
    fn blank_phone_clears_it() {
        let row = update(None, Some("")).into_row().unwrap();
        assert_eq!(row.into_values().collect::<Vec<_>>(), vec![SqlValue::Null]);
    }

    #[test]
    fn blank_names_and_empty_updates_are_rejected() {
        assert!(update(Some("  "), None).into_row().is_err());
        assert!(update(None, None).into_row().is_err());
    }
}
