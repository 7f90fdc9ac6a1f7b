use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use charybdis::types::Uuid;
use serde::Serialize;

use crate::constants::USER_ID_HEADER;
use crate::errors::EngagementError;

/// Caller identity as forwarded by the upstream identity layer. The header is trusted
/// as is; this service does no authentication of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
}

impl FromRequest for CurrentUser {
    type Error = EngagementError;
    type Future = Ready<Result<CurrentUser, EngagementError>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(get_current_user(req))
    }
}

pub fn get_current_user(req: &HttpRequest) -> Result<CurrentUser, EngagementError> {
    let header = req
        .headers()
        .get(USER_ID_HEADER)
        .ok_or(EngagementError::Unauthorized("Missing caller id"))?;

    header
        .to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .map(|id| CurrentUser { id })
        .ok_or(EngagementError::Unauthorized("Malformed caller id"))
}
