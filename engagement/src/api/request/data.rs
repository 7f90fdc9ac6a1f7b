use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};

use crate::api::request::current_user::{get_current_user, CurrentUser};
use crate::app::App;
use crate::errors::EngagementError;
use crate::services::counter::CounterEngine;

/// It contains the data that is required by endpoints acting on behalf of a caller.
#[derive(Clone)]
pub struct RequestData {
    pub app: web::Data<App>,
    pub current_user: CurrentUser,
}

impl RequestData {
    pub fn counter(&self) -> &CounterEngine {
        &self.app.counter
    }
}

impl FromRequest for RequestData {
    type Error = EngagementError;
    type Future = Ready<Result<RequestData, EngagementError>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let current_user = match get_current_user(req) {
            Ok(current_user) => current_user,
            Err(e) => return ready(Err(e)),
        };

        match req.app_data::<web::Data<App>>() {
            Some(app) => ready(Ok(RequestData {
                app: web::Data::clone(app),
                current_user,
            })),
            None => {
                let err = EngagementError::InternalServerError("Could not get app data".to_string());

                ready(Err(err))
            }
        }
    }
}
