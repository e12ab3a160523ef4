use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    Collection, Database,
};
use pwhash::bcrypt;
use serde::{Deserialize, Serialize};

use crate::{
    database::{get_db, is_duplicate_key, HOSPITALS},
    error::{Error, Result},
};

use super::{
    geo::{near_filter, GeoPoint},
    is_valid_email, MIN_PASSWORD_LENGTH,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct Hospital {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub password: String,
    pub address: HospitalAddress,
    pub contact_number: String,
    pub emergency_contact_number: String,
    pub geo_location: GeoPoint,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct HospitalAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct HospitalRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub address: HospitalAddress,
    pub contact_number: String,
    pub emergency_contact_number: String,
    pub geo_location: GeoPoint,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct HospitalResponse {
    pub _id: String,
    pub name: String,
    pub email: String,
    pub address: HospitalAddress,
    pub contact_number: String,
    pub emergency_contact_number: String,
    pub geo_location: GeoPoint,
}

impl HospitalRequest {
    pub fn validate(&self) -> Result<()> {
        let required = [
            (&self.name, "NAME"),
            (&self.address.street, "STREET"),
            (&self.address.city, "CITY"),
            (&self.address.postal_code, "POSTAL_CODE"),
            (&self.address.country, "COUNTRY"),
            (&self.contact_number, "CONTACT_NUMBER"),
            (&self.emergency_contact_number, "EMERGENCY_CONTACT_NUMBER"),
        ];
        if let Some((_, field)) = required.iter().find(|(value, _)| value.trim().is_empty()) {
            return Err(Error::MissingField("HOSPITAL", *field));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(Error::InvalidEmail);
        }
        if self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::InvalidPassword);
        }
        self.geo_location.validate()
    }
}

impl From<HospitalRequest> for Hospital {
    fn from(payload: HospitalRequest) -> Self {
        let now = DateTime::now();
        Self {
            _id: None,
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_lowercase(),
            password: payload.password,
            address: payload.address,
            contact_number: payload.contact_number,
            emergency_contact_number: payload.emergency_contact_number,
            geo_location: payload.geo_location,
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<Hospital> for HospitalResponse {
    fn from(hospital: Hospital) -> Self {
        Self {
            _id: hospital._id.map(|_id| _id.to_hex()).unwrap_or_default(),
            name: hospital.name,
            email: hospital.email,
            address: hospital.address,
            contact_number: hospital.contact_number,
            emergency_contact_number: hospital.emergency_contact_number,
            geo_location: hospital.geo_location,
        }
    }
}

impl Hospital {
    pub async fn save(&mut self) -> Result<ObjectId> {
        let db: Database = get_db()?;
        let collection: Collection<Hospital> = db.collection::<Hospital>(HOSPITALS);

        self._id = Some(ObjectId::new());

        self.password = bcrypt::hash(&self.password).map_err(|error| {
            tracing::error!(%error, "password hashing failed");
            Error::HashingFailed
        })?;

        collection
            .insert_one(&*self, None)
            .await
            .map_err(|error| {
                if is_duplicate_key(&error) {
                    return Error::AlreadyExist("HOSPITAL");
                }
                tracing::error!(%error, "hospital insert failed");
                Error::InsertingFailed
            })?
            .inserted_id
            .as_object_id()
            .ok_or(Error::InsertingFailed)
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Hospital>> {
        let db: Database = get_db()?;
        let collection: Collection<Hospital> = db.collection::<Hospital>(HOSPITALS);

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| Error::QueryFailed)
    }
    pub async fn find_by_email(email: &str) -> Result<Option<Hospital>> {
        let db: Database = get_db()?;
        let collection: Collection<Hospital> = db.collection::<Hospital>(HOSPITALS);

        collection
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(|_| Error::QueryFailed)
    }
    /// Closest hospital within `max_distance_meters` of `point`.
    pub async fn find_nearest(point: &GeoPoint, max_distance_meters: f64) -> Result<Option<Hospital>> {
        let db: Database = get_db()?;
        let collection: Collection<Hospital> = db.collection::<Hospital>(HOSPITALS);

        collection
            .find_one(near_filter("geo_location", point, max_distance_meters), None)
            .await
            .map_err(|error| {
                tracing::error!(%error, "nearest hospital query failed");
                Error::QueryFailed
            })
    }
}
