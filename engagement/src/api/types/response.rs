use actix_web::HttpResponse;

use crate::errors::EngagementError;

pub type Response = Result<HttpResponse, EngagementError>;
