use actix_web::{post, web, HttpResponse, ResponseError};

use crate::models::auth::{Credential, RefreshRequest};

#[post("/auth/login")]
pub async fn login(payload: web::Json<Credential>) -> HttpResponse {
    let payload: Credential = payload.into_inner();

    match payload.authenticate().await {
        Ok(authentication) => HttpResponse::Ok().json(authentication),
        Err(error) => error.error_response(),
    }
}
#[post("/auth/refresh")]
pub async fn refresh(payload: web::Json<RefreshRequest>) -> HttpResponse {
    let payload: RefreshRequest = payload.into_inner();

    match Credential::refresh(&payload.rtk).await {
        Ok(authentication) => HttpResponse::Ok().json(authentication),
        Err(error) => error.error_response(),
    }
}
