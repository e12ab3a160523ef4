use actix_web::{get, post, put, web, HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::{
    error::Error,
    models::{
        accident::{Accident, AccidentQuery},
        auth::AccountKind,
        volunteer::{
            Volunteer, VolunteerAccidentQueryParams, VolunteerLocationRequest, VolunteerRequest,
            VolunteerResponse,
        },
    },
};

use super::issuer;

#[derive(Serialize)]
struct SignupResponse {
    message: &'static str,
    _id: String,
}

#[post("/volunteers")]
pub async fn create_volunteer(payload: web::Json<VolunteerRequest>) -> HttpResponse {
    let payload: VolunteerRequest = payload.into_inner();
    if let Err(error) = payload.validate() {
        return error.error_response();
    }

    let mut volunteer: Volunteer = Volunteer::from(payload);

    match Volunteer::find_by_email(&volunteer.email).await {
        Ok(Some(_)) => Error::AlreadyExist("VOLUNTEER").error_response(),
        Ok(None) => match volunteer.save().await {
            Ok(_id) => {
                tracing::info!(volunteer = %_id, "volunteer signed up");
                HttpResponse::Created().json(SignupResponse {
                    message: "User created",
                    _id: _id.to_hex(),
                })
            }
            Err(error) => error.error_response(),
        },
        Err(error) => error.error_response(),
    }
}
#[get("/volunteers/verify/{token}")]
pub async fn verify_volunteer(token: web::Path<String>) -> HttpResponse {
    match Volunteer::verify(&token).await {
        Ok(_id) => HttpResponse::Ok().body(_id.to_hex()),
        Err(error) => error.error_response(),
    }
}
#[get("/volunteers/me")]
pub async fn get_volunteer_me(req: HttpRequest) -> HttpResponse {
    let issuer = match issuer(&req, AccountKind::Volunteer) {
        Ok(issuer) => issuer,
        Err(error) => return error.error_response(),
    };

    match Volunteer::find_by_id(&issuer._id).await {
        Ok(Some(volunteer)) => HttpResponse::Ok().json(VolunteerResponse::from(volunteer)),
        Ok(None) => HttpResponse::NotFound().body("VOLUNTEER_NOT_FOUND"),
        Err(error) => error.error_response(),
    }
}
#[put("/volunteers/me/location")]
pub async fn update_volunteer_location(
    payload: web::Json<VolunteerLocationRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match issuer(&req, AccountKind::Volunteer) {
        Ok(issuer) => issuer,
        Err(error) => return error.error_response(),
    };
    if let Err(error) = payload.location.validate() {
        return error.error_response();
    }

    match Volunteer::update_location(&issuer._id, &payload.location).await {
        Ok(_id) => HttpResponse::Ok().body(_id.to_hex()),
        Err(error) => error.error_response(),
    }
}
#[get("/volunteers/me/accidents")]
pub async fn get_volunteer_accidents(
    query: web::Query<VolunteerAccidentQueryParams>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match issuer(&req, AccountKind::Volunteer) {
        Ok(issuer) => issuer,
        Err(error) => return error.error_response(),
    };

    let volunteer = match Volunteer::find_by_id(&issuer._id).await {
        Ok(Some(volunteer)) => volunteer,
        Ok(None) => return HttpResponse::NotFound().body("VOLUNTEER_NOT_FOUND"),
        Err(error) => return error.error_response(),
    };

    let query: AccidentQuery = AccidentQuery {
        _id: Some(volunteer.accident_ids(&query.state).to_vec()),
        ..AccidentQuery::default()
    };

    match Accident::find_many(&query).await {
        Ok(accidents) => HttpResponse::Ok().json(accidents),
        Err(error) => error.error_response(),
    }
}
