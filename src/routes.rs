use crate::{
    api::{
        attendance, dashboard, department, employee, leave_request, navigation, payroll, profile,
        user_role,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, http::header, middleware::from_fn, web};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            warn!(requests_per_min, "Invalid rate limit, falling back to defaults");
            GovernorConfig::default()
        });
    Governor::new(&cfg)
}

async fn root_redirect() -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/auth"))
        .finish()
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "message": "Not found" }))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(web::resource("/").route(web::get().to(root_redirect)));

    // Session routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("")
                    .wrap(protected_limiter.clone())
                    .route(web::get().to(handlers::session)),
            )
            .service(
                web::resource("/sign-in")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::sign_in)),
            )
            .service(
                web::resource("/sign-up")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::sign_up)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/sign-out")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::sign_out)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(web::resource("/dashboard").route(web::get().to(dashboard::dashboard)))
            .service(web::resource("/navigation").route(web::get().to(navigation::navigation)))
            // /employees
            .service(
                web::resource("/employees")
                    .route(web::get().to(employee::list_employees))
                    .route(web::post().to(employee::create_employee)),
            )
            .service(
                web::resource("/employees/{id}")
                    .route(web::get().to(employee::get_employee))
                    .route(web::put().to(employee::update_employee))
                    .route(web::delete().to(employee::delete_employee)),
            )
            // /departments
            .service(
                web::resource("/departments")
                    .route(web::get().to(department::list_departments))
                    .route(web::post().to(department::create_department)),
            )
            .service(
                web::resource("/departments/{id}")
                    .route(web::put().to(department::update_department))
                    .route(web::delete().to(department::delete_department)),
            )
            // /attendance
            .service(
                web::resource("/attendance")
                    .route(web::get().to(attendance::roster))
                    .route(web::put().to(attendance::mark_attendance)),
            )
            .service(
                web::resource("/attendance/check-in").route(web::post().to(attendance::check_in)),
            )
            .service(
                web::resource("/attendance/check-out")
                    .route(web::post().to(attendance::check_out)),
            )
            .service(
                web::resource("/my-attendance").route(web::get().to(attendance::my_attendance)),
            )
            // /payroll; fixed segments before /{id}
            .service(
                web::resource("/payroll")
                    .route(web::get().to(payroll::list_payrolls))
                    .route(web::post().to(payroll::create_payroll)),
            )
            .service(
                web::resource("/payroll/generate")
                    .route(web::post().to(payroll::generate_payroll)),
            )
            .service(
                web::resource("/payroll/{id}")
                    .route(web::get().to(payroll::get_payroll))
                    .route(web::put().to(payroll::update_payroll)),
            )
            .service(
                web::resource("/payroll/{id}/status")
                    .route(web::put().to(payroll::update_payroll_status)),
            )
            .service(web::resource("/my-payroll").route(web::get().to(payroll::my_payroll)))
            // /leaves
            .service(web::resource("/leaves").route(web::get().to(leave_request::leave_list)))
            .service(
                web::resource("/leaves/{id}").route(web::get().to(leave_request::get_leave)),
            )
            .service(
                web::resource("/leaves/{id}/approve")
                    .route(web::put().to(leave_request::approve_leave)),
            )
            .service(
                web::resource("/leaves/{id}/reject")
                    .route(web::put().to(leave_request::reject_leave)),
            )
            .service(
                web::resource("/my-leaves")
                    .route(web::get().to(leave_request::my_leaves))
                    .route(web::post().to(leave_request::create_leave)),
            )
            // /profile
            .service(
                web::resource("/profile")
                    .route(web::get().to(profile::get_profile))
                    .route(web::put().to(profile::update_profile)),
            )
            .service(
                web::resource("/users/{id}/role").route(web::put().to(user_role::assign_role)),
            ),
    );

    cfg.default_service(web::to(not_found));
}

// SIGN-IN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access + refresh pair, old refresh revoked
