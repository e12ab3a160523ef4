use actix_web::{get, post, web, HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::{
    error::Error,
    models::{
        accident::{Accident, AccidentQuery, AccidentQueryParams},
        auth::AccountKind,
        hospital::{Hospital, HospitalRequest, HospitalResponse},
    },
};

use super::issuer;

#[derive(Serialize)]
struct SignupResponse {
    message: &'static str,
    _id: String,
}

#[post("/hospitals")]
pub async fn create_hospital(payload: web::Json<HospitalRequest>) -> HttpResponse {
    let payload: HospitalRequest = payload.into_inner();
    if let Err(error) = payload.validate() {
        return error.error_response();
    }

    let mut hospital: Hospital = Hospital::from(payload);

    match Hospital::find_by_email(&hospital.email).await {
        Ok(Some(_)) => Error::AlreadyExist("HOSPITAL").error_response(),
        Ok(None) => match hospital.save().await {
            Ok(_id) => {
                tracing::info!(hospital = %_id, "hospital signed up");
                HttpResponse::Created().json(SignupResponse {
                    message: "Hospital created",
                    _id: _id.to_hex(),
                })
            }
            Err(error) => error.error_response(),
        },
        Err(error) => error.error_response(),
    }
}
#[get("/hospitals/me")]
pub async fn get_hospital_me(req: HttpRequest) -> HttpResponse {
    let issuer = match issuer(&req, AccountKind::Hospital) {
        Ok(issuer) => issuer,
        Err(error) => return error.error_response(),
    };

    match Hospital::find_by_id(&issuer._id).await {
        Ok(Some(hospital)) => HttpResponse::Ok().json(HospitalResponse::from(hospital)),
        Ok(None) => HttpResponse::NotFound().body("HOSPITAL_NOT_FOUND"),
        Err(error) => error.error_response(),
    }
}
#[get("/hospitals/me/accidents")]
pub async fn get_hospital_accidents(
    query: web::Query<AccidentQueryParams>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match issuer(&req, AccountKind::Hospital) {
        Ok(issuer) => issuer,
        Err(error) => return error.error_response(),
    };

    let query: AccidentQuery = AccidentQuery {
        _id: None,
        hospital_id: Some(issuer._id),
        status: query.status,
        limit: query.limit,
    };

    match Accident::find_many(&query).await {
        Ok(accidents) => HttpResponse::Ok().json(accidents),
        Err(error) => error.error_response(),
    }
}
