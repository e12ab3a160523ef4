use actix_multipart::form::MultipartForm;
use actix_web::{get, post, put, web, HttpMessage, HttpRequest, HttpResponse, ResponseError};

use crate::{
    config::Config,
    error::Error,
    models::{
        accident::{
            Accident, AccidentQuery, AccidentQueryParams, AccidentRequest, AccidentStatusRequest,
        },
        auth::Authentication,
        media::{AccidentMediaMultipartRequest, AccidentMediaResponse, MediaStore},
    },
};

use super::parse_id;

#[post("/accidents")]
pub async fn create_accident(
    payload: web::Json<AccidentRequest>,
    config: web::Data<Config>,
) -> HttpResponse {
    let mut accident = match Accident::from_request(payload.into_inner()) {
        Ok(accident) => accident,
        Err(error) => return error.error_response(),
    };

    match accident.report(&config.dispatch).await {
        Ok(dispatch) => HttpResponse::Created().json(dispatch),
        Err(error) => error.error_response(),
    }
}
#[post("/accidents/media")]
pub async fn upload_accident_media(
    form: MultipartForm<AccidentMediaMultipartRequest>,
    config: web::Data<Config>,
) -> HttpResponse {
    if form.files.is_empty() {
        return Error::MissingField("MEDIA", "FILE").error_response();
    }

    let store = MediaStore::new(&config.files.dir);
    let mut response = AccidentMediaResponse::default();

    for file in form.files.iter() {
        match store.store_upload(file) {
            Ok((kind, url)) => response.push(kind, url),
            Err(error) => return error.error_response(),
        }
    }

    tracing::info!(
        photos = response.photos.len(),
        videos = response.videos.len(),
        "accident media stored"
    );
    HttpResponse::Created().json(response)
}
#[get("/accidents")]
pub async fn get_accidents(query: web::Query<AccidentQueryParams>) -> HttpResponse {
    let query: AccidentQuery = AccidentQuery {
        _id: None,
        hospital_id: None,
        status: query.status,
        limit: query.limit,
    };

    match Accident::find_many(&query).await {
        Ok(accidents) => HttpResponse::Ok().json(accidents),
        Err(error) => error.error_response(),
    }
}
#[get("/accidents/summary")]
pub async fn get_accident_summary() -> HttpResponse {
    match Accident::summary().await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(error) => error.error_response(),
    }
}
#[get("/accidents/{accident_id}")]
pub async fn get_accident(accident_id: web::Path<String>) -> HttpResponse {
    let accident_id = match parse_id(&accident_id) {
        Ok(accident_id) => accident_id,
        Err(error) => return error.error_response(),
    };

    match Accident::find_detail_by_id(&accident_id).await {
        Ok(Some(accident)) => HttpResponse::Ok().json(accident),
        Ok(None) => HttpResponse::NotFound().body("ACCIDENT_NOT_FOUND"),
        Err(error) => error.error_response(),
    }
}
#[put("/accidents/{accident_id}/status")]
pub async fn update_accident_status(
    accident_id: web::Path<String>,
    payload: web::Json<AccidentStatusRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match req.extensions().get::<Authentication>() {
        Some(issuer) => issuer.clone(),
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };

    let accident_id = match parse_id(&accident_id) {
        Ok(accident_id) => accident_id,
        Err(error) => return error.error_response(),
    };

    match Accident::find_by_id(&accident_id).await {
        Ok(Some(mut accident)) => {
            if !accident.is_assigned_to(&issuer._id, &issuer.role) {
                return HttpResponse::Unauthorized().body("UNAUTHORIZED");
            }
            match accident.update_status(payload.into_inner().status).await {
                Ok(accident_id) => HttpResponse::Ok().body(accident_id.to_hex()),
                Err(error) => error.error_response(),
            }
        }
        Ok(None) => HttpResponse::NotFound().body("ACCIDENT_NOT_FOUND"),
        Err(error) => error.error_response(),
    }
}
