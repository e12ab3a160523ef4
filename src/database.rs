use std::sync::OnceLock;

use mongodb::{
    bson::{doc, Document},
    error::{Error as DriverError, ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Database, IndexModel,
};

use crate::{
    config::DatabaseConfig,
    error::{Error, Result},
};

static DB: OnceLock<Database> = OnceLock::new();

pub const ACCIDENTS: &str = "accidents";
pub const VOLUNTEERS: &str = "volunteers";
pub const HOSPITALS: &str = "hospitals";

const DUPLICATE_KEY: i32 = 11000;

pub async fn connect(config: &DatabaseConfig) -> Result<()> {
    let client = Client::with_uri_str(&config.uri).await.map_err(|error| {
        tracing::error!(%error, "failed to create database client");
        Error::DatabaseUnavailable
    })?;
    // A second connect keeps the first handle.
    let _ = DB.set(client.database(&config.name));
    Ok(())
}

pub fn get_db() -> Result<Database> {
    DB.get().cloned().ok_or(Error::DatabaseUnavailable)
}

/// Whether a write was refused by a unique index.
pub fn is_duplicate_key(error: &DriverError) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Create the geospatial and uniqueness indexes the queries rely on.
///
/// `$near` refuses to run without a `2dsphere` index on the queried field.
pub async fn ensure_indexes() -> Result<()> {
    let db = get_db()?;

    for (collection, keys, unique) in [
        (ACCIDENTS, doc! { "location": "2dsphere" }, false),
        (VOLUNTEERS, doc! { "location": "2dsphere" }, false),
        (VOLUNTEERS, doc! { "email": 1 }, true),
        (HOSPITALS, doc! { "geo_location": "2dsphere" }, false),
        (HOSPITALS, doc! { "email": 1 }, true),
    ] {
        db.collection::<Document>(collection)
            .create_index(index(keys, unique), None)
            .await
            .map_err(|error| {
                tracing::error!(%error, collection, "index creation failed");
                Error::QueryFailed
            })?;
    }

    tracing::info!("database indexes are in place");
    Ok(())
}

fn index(keys: Document, unique: bool) -> IndexModel {
    if unique {
        IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build()
    } else {
        IndexModel::builder().keys(keys).build()
    }
}
