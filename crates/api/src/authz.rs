//! Route-level role/permission requirements.
//!
//! Layer these with `from_fn_with_state` *inside* the auth middleware, so the
//! principal context is already present:
//!
//! ```ignore
//! get(handler).route_layer(from_fn_with_state(Permission::new("/system/users"), require_permission))
//! ```

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tracing::info;

use stars_auth::{authorize, authorize_role, AuthzError, Permission, Role};

use crate::app::errors;
use crate::context::PrincipalContext;

pub async fn require_permission(
    State(required): State<Permission>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match check(&req, |ctx| authorize(ctx.principal(), &required)) {
        Ok(()) => next.run(req).await,
        Err(resp) => resp,
    }
}

pub async fn require_role(State(required): State<Role>, req: Request<Body>, next: Next) -> Response {
    match check(&req, |ctx| authorize_role(ctx.principal(), &required)) {
        Ok(()) => next.run(req).await,
        Err(resp) => resp,
    }
}

fn check<F>(req: &Request<Body>, decide: F) -> Result<(), Response>
where
    F: FnOnce(&PrincipalContext) -> Result<(), AuthzError>,
{
    let ctx = req
        .extensions()
        .get::<PrincipalContext>()
        .ok_or_else(|| errors::unauthenticated("authentication required"))?;

    decide(ctx).map_err(|e| {
        info!(user_id = %ctx.user_id(), error = %e, "request forbidden");
        errors::forbidden(e.to_string())
    })
}
