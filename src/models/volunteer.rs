use futures::stream::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, to_bson, DateTime, Document},
    options::FindOptions,
    Collection, Database,
};
use pwhash::bcrypt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    database::{get_db, is_duplicate_key, VOLUNTEERS},
    error::{Error, Result},
};

use super::{
    accident::AccidentStatusKind,
    geo::{near_filter, GeoPoint},
    is_valid_email, MIN_PASSWORD_LENGTH,
};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VolunteerAccidentState {
    #[default]
    Live,
    Solved,
    Unsolved,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Volunteer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    pub password: String,
    pub verify_token: String,
    pub verified: bool,
    pub location: GeoPoint,
    pub live_accidents: Vec<ObjectId>,
    pub solved_accidents: Vec<ObjectId>,
    pub unsolved_accidents: Vec<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct VolunteerRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub location: GeoPoint,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct VolunteerLocationRequest {
    pub location: GeoPoint,
}
#[derive(Debug, Deserialize)]
pub struct VolunteerAccidentQueryParams {
    #[serde(default)]
    pub state: VolunteerAccidentState,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct VolunteerResponse {
    pub _id: String,
    pub username: String,
    pub email: String,
    pub verified: bool,
    pub location: GeoPoint,
    pub live_accidents: Vec<String>,
    pub solved_accidents: Vec<String>,
    pub unsolved_accidents: Vec<String>,
}

impl VolunteerRequest {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::MissingField("VOLUNTEER", "USERNAME"));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(Error::InvalidEmail);
        }
        if self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::InvalidPassword);
        }
        self.location.validate()
    }
}

impl From<VolunteerRequest> for Volunteer {
    fn from(payload: VolunteerRequest) -> Self {
        let now = DateTime::now();
        Self {
            _id: None,
            username: payload.username.trim().to_string(),
            email: payload.email.trim().to_lowercase(),
            password: payload.password,
            verify_token: Uuid::new_v4().simple().to_string(),
            verified: false,
            location: payload.location,
            live_accidents: Vec::new(),
            solved_accidents: Vec::new(),
            unsolved_accidents: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<Volunteer> for VolunteerResponse {
    fn from(volunteer: Volunteer) -> Self {
        let to_hex = |ids: Vec<ObjectId>| ids.into_iter().map(|_id| _id.to_hex()).collect();
        Self {
            _id: volunteer._id.map(|_id| _id.to_hex()).unwrap_or_default(),
            username: volunteer.username,
            email: volunteer.email,
            verified: volunteer.verified,
            location: volunteer.location,
            live_accidents: to_hex(volunteer.live_accidents),
            solved_accidents: to_hex(volunteer.solved_accidents),
            unsolved_accidents: to_hex(volunteer.unsolved_accidents),
        }
    }
}

/// Update moving `accident_id` out of the live list once the accident settles.
/// `None` when `outcome` does not settle an accident.
fn settle_update(accident_id: &ObjectId, outcome: &AccidentStatusKind) -> Option<Document> {
    let target = match outcome {
        AccidentStatusKind::Resolved => "solved_accidents",
        AccidentStatusKind::Cancelled => "unsolved_accidents",
        _ => return None,
    };
    let mut add = Document::new();
    add.insert(target, accident_id);
    Some(doc! {
        "$pull": { "live_accidents": accident_id },
        "$addToSet": add,
        "$set": { "updated_at": DateTime::now() },
    })
}

impl Volunteer {
    pub async fn save(&mut self) -> Result<ObjectId> {
        let db: Database = get_db()?;
        let collection: Collection<Volunteer> = db.collection::<Volunteer>(VOLUNTEERS);

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
                    return Error::AlreadyExist("VOLUNTEER");
                }
                tracing::error!(%error, "volunteer insert failed");
                Error::InsertingFailed
            })?
            .inserted_id
            .as_object_id()
            .ok_or(Error::InsertingFailed)
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Volunteer>> {
        let db: Database = get_db()?;
        let collection: Collection<Volunteer> = db.collection::<Volunteer>(VOLUNTEERS);

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| Error::QueryFailed)
    }
    pub async fn find_by_email(email: &str) -> Result<Option<Volunteer>> {
        let db: Database = get_db()?;
        let collection: Collection<Volunteer> = db.collection::<Volunteer>(VOLUNTEERS);

        collection
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(|_| Error::QueryFailed)
    }
    /// Volunteers within `max_distance_meters` of `point`, nearest first.
    pub async fn find_nearest(
        point: &GeoPoint,
        max_distance_meters: f64,
        limit: i64,
    ) -> Result<Vec<Volunteer>> {
        let db: Database = get_db()?;
        let collection: Collection<Volunteer> = db.collection::<Volunteer>(VOLUNTEERS);

        let options = FindOptions::builder().limit(limit).build();
        let mut cursor = collection
            .find(near_filter("location", point, max_distance_meters), options)
            .await
            .map_err(|error| {
                tracing::error!(%error, "nearest volunteer query failed");
                Error::QueryFailed
            })?;

        let mut volunteers: Vec<Volunteer> = Vec::new();
        while let Some(volunteer) = cursor.next().await {
            volunteers.push(volunteer.map_err(|_| Error::QueryFailed)?);
        }
        Ok(volunteers)
    }
    pub async fn verify(token: &str) -> Result<ObjectId> {
        let db: Database = get_db()?;
        let collection: Collection<Volunteer> = db.collection::<Volunteer>(VOLUNTEERS);

        let volunteer = collection
            .find_one(doc! { "verify_token": token }, None)
            .await
            .map_err(|_| Error::QueryFailed)?
            .ok_or(Error::NotFound("VOLUNTEER"))?;
        let _id = volunteer._id.ok_or(Error::NotFound("VOLUNTEER"))?;

        collection
            .update_one(
                doc! { "_id": _id },
                doc! { "$set": { "verified": true, "updated_at": DateTime::now() } },
                None,
            )
            .await
            .map_err(|_| Error::UpdateFailed)
            .map(|_| _id)
    }
    /// Record `accident_id` among this volunteer's live accidents.
    pub async fn attach_accident(&mut self, accident_id: &ObjectId) -> Result<ObjectId> {
        let db: Database = get_db()?;
        let collection: Collection<Volunteer> = db.collection::<Volunteer>(VOLUNTEERS);
        let _id = self._id.ok_or(Error::NotFound("VOLUNTEER"))?;

        collection
            .update_one(
                doc! { "_id": _id },
                doc! {
                    "$addToSet": { "live_accidents": accident_id },
                    "$set": { "updated_at": DateTime::now() },
                },
                None,
            )
            .await
            .map_err(|error| {
                tracing::error!(%error, volunteer = %_id, "attaching accident failed");
                Error::UpdateFailed
            })?;

        if !self.live_accidents.contains(accident_id) {
            self.live_accidents.push(*accident_id);
        }
        Ok(_id)
    }
    /// Move `accident_id` from the live list of every volunteer in `ids` into
    /// the solved or unsolved list, depending on `outcome`.
    pub async fn settle_accident(
        ids: &[ObjectId],
        accident_id: &ObjectId,
        outcome: &AccidentStatusKind,
    ) -> Result<u64> {
        let update = match settle_update(accident_id, outcome) {
            Some(update) => update,
            None => return Ok(0),
        };
        if ids.is_empty() {
            return Ok(0);
        }

        let db: Database = get_db()?;
        let collection: Collection<Volunteer> = db.collection::<Volunteer>(VOLUNTEERS);

        collection
            .update_many(
                doc! { "_id": { "$in": to_bson(ids).map_err(|_| Error::UpdateFailed)? } },
                update,
                None,
            )
            .await
            .map_err(|error| {
                tracing::error!(%error, accident = %accident_id, "settling accident failed");
                Error::UpdateFailed
            })
            .map(|result| result.modified_count)
    }
    pub async fn update_location(_id: &ObjectId, location: &GeoPoint) -> Result<ObjectId> {
        let db: Database = get_db()?;
        let collection: Collection<Volunteer> = db.collection::<Volunteer>(VOLUNTEERS);

        collection
            .update_one(
                doc! { "_id": _id },
                doc! { "$set": { "location": location.to_document(), "updated_at": DateTime::now() } },
                None,
            )
            .await
            .map_err(|_| Error::UpdateFailed)
            .and_then(|result| {
                if result.matched_count == 0 {
                    Err(Error::NotFound("VOLUNTEER"))
                } else {
                    Ok(*_id)
                }
            })
    }
    pub fn accident_ids(&self, state: &VolunteerAccidentState) -> &[ObjectId] {
        match state {
            VolunteerAccidentState::Live => &self.live_accidents,
            VolunteerAccidentState::Solved => &self.solved_accidents,
            VolunteerAccidentState::Unsolved => &self.unsolved_accidents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VolunteerRequest {
        VolunteerRequest {
            username: "  rina ".to_string(),
            email: " Rina@Example.COM".to_string(),
            password: "correct-horse".to_string(),
            location: GeoPoint::new(77.5946, 12.9716),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_request_validation_failures() {
        let mut payload = request();
        payload.username = "   ".to_string();
        assert_eq!(
            payload.validate(),
            Err(Error::MissingField("VOLUNTEER", "USERNAME"))
        );

        let mut payload = request();
        payload.email = "not-an-email".to_string();
        assert_eq!(payload.validate(), Err(Error::InvalidEmail));

        let mut payload = request();
        payload.password = "short".to_string();
        assert_eq!(payload.validate(), Err(Error::InvalidPassword));

        let mut payload = request();
        payload.location = GeoPoint::new(0.0, 95.0);
        assert_eq!(payload.validate(), Err(Error::InvalidLocation));
    }

    #[test]
    fn test_new_volunteer_is_normalized_and_unverified() {
        let volunteer = Volunteer::from(request());

        assert_eq!(volunteer.username, "rina");
        assert_eq!(volunteer.email, "rina@example.com");
        assert!(!volunteer.verified);
        assert_eq!(volunteer.verify_token.len(), 32);
        assert!(volunteer.verify_token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(volunteer.live_accidents.is_empty());
    }

    #[test]
    fn test_verify_tokens_differ() {
        assert_ne!(
            Volunteer::from(request()).verify_token,
            Volunteer::from(request()).verify_token
        );
    }

    #[test]
    fn test_response_hides_password_and_stringifies_ids() {
        let mut volunteer = Volunteer::from(request());
        let _id = ObjectId::new();
        let accident_id = ObjectId::new();
        volunteer._id = Some(_id);
        volunteer.live_accidents.push(accident_id);

        let response = VolunteerResponse::from(volunteer);
        assert_eq!(response._id, _id.to_hex());
        assert_eq!(response.live_accidents, vec![accident_id.to_hex()]);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("verify_token").is_none());
    }

    #[test]
    fn test_accident_ids_by_state() {
        let mut volunteer = Volunteer::from(request());
        let live = ObjectId::new();
        let solved = ObjectId::new();
        volunteer.live_accidents.push(live);
        volunteer.solved_accidents.push(solved);

        assert_eq!(volunteer.accident_ids(&VolunteerAccidentState::Live), &[live]);
        assert_eq!(
            volunteer.accident_ids(&VolunteerAccidentState::Solved),
            &[solved]
        );
        assert!(volunteer
            .accident_ids(&VolunteerAccidentState::Unsolved)
            .is_empty());
    }

    #[test]
    fn test_settle_update_targets() {
        let accident_id = ObjectId::new();

        let resolved = settle_update(&accident_id, &AccidentStatusKind::Resolved).unwrap();
        assert_eq!(
            resolved
                .get_document("$addToSet")
                .unwrap()
                .get_object_id("solved_accidents")
                .unwrap(),
            accident_id
        );
        assert_eq!(
            resolved
                .get_document("$pull")
                .unwrap()
                .get_object_id("live_accidents")
                .unwrap(),
            accident_id
        );

        let cancelled = settle_update(&accident_id, &AccidentStatusKind::Cancelled).unwrap();
        assert!(cancelled
            .get_document("$addToSet")
            .unwrap()
            .contains_key("unsolved_accidents"));

        assert!(settle_update(&accident_id, &AccidentStatusKind::InProgress).is_none());
        assert!(settle_update(&accident_id, &AccidentStatusKind::Pending).is_none());
    }

    #[test]
    fn test_state_query_defaults_to_live() {
        let params: VolunteerAccidentQueryParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.state, VolunteerAccidentState::Live);
    }
}
