use crate::models::{ErrorResponse, RouteDoc};
use rocket::http::Status;
use rocket::response::{status, Redirect};
use rocket::serde::json::Json;
use rocket::request::{FromRequest, Outcome};
use rocket::{catch, get, Request};

#[get("/")]
pub fn index() -> Redirect {
    Redirect::to("/docs")
}

/// Every route mounted on the running instance, sorted by path then method.
pub struct MountedRoutes(pub Vec<RouteDoc>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MountedRoutes {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let mut routes: Vec<RouteDoc> = request
            .rocket()
            .routes()
            .map(|route| RouteDoc {
                method: route.method.to_string(),
                path: route.uri.to_string(),
                name: route.name.as_ref().map(|name| name.to_string()),
            })
            .collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.method.cmp(&b.method)));
        Outcome::Success(MountedRoutes(routes))
    }
}

#[get("/docs")]
pub fn route_docs(routes: MountedRoutes) -> Json<Vec<RouteDoc>> {
    Json(routes.0)
}

fn label(status: Status) -> &'static str {
    match status.code {
        400 => "bad_request",
        404 => "not_found",
        409 => "conflict",
        422 => "validation_failed",
        500..=599 => "engine_failure",
        _ => "error",
    }
}

/// Keeps framework-level failures (unmatched routes, bad query strings) in the
/// same JSON shape as handler errors.
#[catch(default)]
pub fn default_catcher(status: Status, request: &Request<'_>) -> status::Custom<Json<ErrorResponse>> {
    let message = format!(
        "{} {}: {}",
        request.method(),
        request.uri(),
        status.reason().unwrap_or("request failed")
    );
    status::Custom(
        status,
        Json(ErrorResponse {
            error: label(status).to_string(),
            message,
        }),
    )
}
