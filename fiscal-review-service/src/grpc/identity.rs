//! Caller identity from trusted gateway metadata.
//!
//! The gateway authenticates the user and forwards `x-user-id`,
//! `x-user-name` and `x-user-role`. This service does not re-authenticate.

#![allow(clippy::result_large_err)]

use crate::models::{Actor, Role};
use tonic::{Request, Status};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a, T>(request: &'a Request<T>, key: &str) -> Option<&'a str> {
    request
        .metadata()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn extract_actor<T>(request: &Request<T>) -> Result<Actor, Status> {
    let user_id = header(request, USER_ID_HEADER)
        .ok_or_else(|| Status::unauthenticated("Missing caller identity"))?;

    let role = header(request, USER_ROLE_HEADER)
        .and_then(Role::parse)
        .ok_or_else(|| Status::permission_denied("Missing or unknown caller role"))?;

    let display_name = header(request, USER_NAME_HEADER).map(String::from);

    Ok(Actor::new(user_id, display_name, role))
}

/// Extract the caller and check it holds one of `allowed`.
pub fn require_role<T>(request: &Request<T>, allowed: &[Role]) -> Result<Actor, Status> {
    let actor = extract_actor(request)?;
    if !allowed.contains(&actor.role) {
        tracing::warn!(
            user_id = %actor.user_id,
            role = actor.role.as_str(),
            "Caller role not permitted"
        );
        return Err(Status::permission_denied(format!(
            "Role '{}' may not perform this action",
            actor.role.as_str()
        )));
    }
    Ok(actor)
}
