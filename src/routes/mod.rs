use actix_web::{get, web, HttpMessage, HttpRequest, HttpResponse, ResponseError};
use mime_guess::from_path;
use serde::Deserialize;
use std::fs;

use crate::{
    config::Config,
    error::Error,
    models::{
        auth::{AccountKind, Authentication},
        media::{MediaKind, MediaStore},
    },
};

#[derive(Deserialize)]
pub struct FileQueryParams {
    pub kind: MediaKind,
    pub name: String,
}

pub mod accident;
pub mod auth;
pub mod hospital;
pub mod volunteer;

/// Register every endpoint. Literal paths go before `{id}` captures.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_file)
        .service(accident::create_accident)
        .service(accident::upload_accident_media)
        .service(accident::get_accidents)
        .service(accident::get_accident_summary)
        .service(accident::get_accident)
        .service(accident::update_accident_status)
        .service(volunteer::create_volunteer)
        .service(volunteer::verify_volunteer)
        .service(volunteer::get_volunteer_me)
        .service(volunteer::update_volunteer_location)
        .service(volunteer::get_volunteer_accidents)
        .service(hospital::create_hospital)
        .service(hospital::get_hospital_me)
        .service(hospital::get_hospital_accidents)
        .service(auth::login)
        .service(auth::refresh);
}

/// The signed-in account, if it has the given role.
pub fn issuer(req: &HttpRequest, role: AccountKind) -> Result<Authentication, Error> {
    match req.extensions().get::<Authentication>() {
        Some(issuer) if issuer.role == role => Ok(issuer.clone()),
        _ => Err(Error::Unauthorized),
    }
}

pub fn parse_id(id: &str) -> Result<mongodb::bson::oid::ObjectId, Error> {
    id.parse().map_err(|_| Error::InvalidId)
}

#[get("/files")]
pub async fn get_file(query: web::Query<FileQueryParams>, config: web::Data<Config>) -> HttpResponse {
    let store = MediaStore::new(&config.files.dir);
    let path = match store.path_for(&query.kind, &query.name) {
        Ok(path) => path,
        Err(error) => return error.error_response(),
    };
    if let Ok(file) = fs::read(&path) {
        let mime = from_path(&path).first_or_octet_stream();
        HttpResponse::Ok().content_type(mime).body(file)
    } else {
        HttpResponse::NotFound().body("CONTENT_NOT_FOUND")
    }
}
