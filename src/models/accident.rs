use futures::stream::StreamExt;
use mongodb::{
    bson::{doc, from_bson, from_document, oid::ObjectId, to_bson, Bson, DateTime, Document},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::DispatchConfig,
    database::{get_db, ACCIDENTS},
    error::{Error, Result},
};

use super::{
    auth::AccountKind,
    geo::GeoPoint,
    hospital::Hospital,
    volunteer::Volunteer,
};

pub const DEFAULT_DESCRIPTION: &str = "No description provided";
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%LZ";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccidentStatusKind {
    #[default]
    Pending,
    InProgress,
    Resolved,
    Cancelled,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Accident {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub description: String,
    pub reporters: Vec<String>,
    pub photos: Vec<String>,
    pub videos: Vec<String>,
    pub location: GeoPoint,
    pub hospital_id: Option<ObjectId>,
    pub nearest_volunteers: Vec<ObjectId>,
    pub status: AccidentStatusKind,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AccidentRequest {
    pub description: Option<String>,
    pub reporters: Option<Vec<String>>,
    pub photos: Option<Vec<String>>,
    pub videos: Option<Vec<String>>,
    pub location: Option<GeoPoint>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct AccidentStatusRequest {
    pub status: AccidentStatusKind,
}
#[derive(Debug, Default)]
pub struct AccidentQuery {
    pub _id: Option<Vec<ObjectId>>,
    pub hospital_id: Option<ObjectId>,
    pub status: Option<AccidentStatusKind>,
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize)]
pub struct AccidentQueryParams {
    pub status: Option<AccidentStatusKind>,
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct AccidentResponse {
    pub _id: String,
    pub description: String,
    pub reporters: Vec<String>,
    pub photos: Vec<String>,
    pub videos: Vec<String>,
    pub location: GeoPoint,
    pub hospital_id: Option<String>,
    pub nearest_volunteers: Vec<String>,
    pub status: AccidentStatusKind,
    pub created_at: String,
    pub updated_at: String,
}
/// Outcome of a report: the stored accident and who it was dispatched to.
#[derive(Debug, Serialize)]
pub struct AccidentDispatch {
    pub message: String,
    pub accident_id: String,
    pub nearest_volunteers: Vec<String>,
    pub hospital_id: Option<String>,
}
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AccidentSummary {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub resolved: u64,
    pub cancelled: u64,
}

impl AccidentStatusKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled)
    }
    pub fn can_transition_to(&self, next: &AccidentStatusKind) -> bool {
        match self {
            Self::Pending => matches!(
                next,
                Self::InProgress | Self::Resolved | Self::Cancelled
            ),
            Self::InProgress => matches!(next, Self::Resolved | Self::Cancelled),
            Self::Resolved | Self::Cancelled => false,
        }
    }
}

impl AccidentSummary {
    fn tally(&mut self, status: AccidentStatusKind, count: u64) {
        self.total += count;
        match status {
            AccidentStatusKind::Pending => self.pending += count,
            AccidentStatusKind::InProgress => self.in_progress += count,
            AccidentStatusKind::Resolved => self.resolved += count,
            AccidentStatusKind::Cancelled => self.cancelled += count,
        }
    }
}

impl AccidentQuery {
    pub fn pipeline(&self) -> Result<Vec<Document>> {
        let mut pipeline: Vec<Document> = Vec::new();
        let mut filter = Document::new();

        if let Some(ids) = &self._id {
            filter.insert(
                "_id",
                doc! { "$in": to_bson(ids).map_err(|_| Error::QueryFailed)? },
            );
        }
        if let Some(hospital_id) = &self.hospital_id {
            filter.insert("hospital_id", hospital_id);
        }
        if let Some(status) = &self.status {
            filter.insert("status", to_bson(status).map_err(|_| Error::QueryFailed)?);
        }
        if !filter.is_empty() {
            pipeline.push(doc! { "$match": filter });
        }

        pipeline.push(doc! { "$sort": { "created_at": -1 } });

        if let Some(limit) = self.limit {
            let limit = i64::try_from(limit)
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or(Error::InvalidLimit)?;
            pipeline.push(doc! { "$limit": limit });
        }

        pipeline.push(doc! {
            "$project": {
                "_id": { "$toString": "$_id" },
                "description": "$description",
                "reporters": "$reporters",
                "photos": "$photos",
                "videos": "$videos",
                "location": "$location",
                "hospital_id": {
                    "$cond": [
                        "$hospital_id",
                        { "$toString": "$hospital_id" },
                        Bson::Null
                    ]
                },
                "nearest_volunteers": {
                    "$map": {
                        "input": "$nearest_volunteers",
                        "in": { "$toString": "$$this" }
                    }
                },
                "status": "$status",
                "created_at": { "$dateToString": { "format": DATE_FORMAT, "date": "$created_at" } },
                "updated_at": { "$dateToString": { "format": DATE_FORMAT, "date": "$updated_at" } },
            }
        });

        Ok(pipeline)
    }
}

impl Accident {
    /// Build a new, pending accident from a report. Missing fields fall back
    /// to their defaults; the location is mandatory.
    pub fn from_request(payload: AccidentRequest) -> Result<Self> {
        let location = payload
            .location
            .ok_or(Error::MissingField("ACCIDENT", "LOCATION"))?;
        location.validate()?;

        let description = payload
            .description
            .map(|description| description.trim().to_string())
            .filter(|description| !description.is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
        let reporters = payload
            .reporters
            .unwrap_or_default()
            .into_iter()
            .map(|reporter| reporter.trim().to_string())
            .filter(|reporter| !reporter.is_empty())
            .collect();

        let now = DateTime::now();
        Ok(Self {
            _id: None,
            description,
            reporters,
            photos: payload.photos.unwrap_or_default(),
            videos: payload.videos.unwrap_or_default(),
            location,
            hospital_id: None,
            nearest_volunteers: Vec::new(),
            status: AccidentStatusKind::Pending,
            created_at: now,
            updated_at: now,
        })
    }
    /// Store the accident and dispatch it to the nearest volunteers.
    ///
    /// Volunteer back-references are written one by one after the accident is
    /// inserted; a failed write is reported but earlier writes stay in place.
    pub async fn report(&mut self, dispatch: &DispatchConfig) -> Result<AccidentDispatch> {
        self.location.validate()?;

        let mut volunteers = Volunteer::find_nearest(
            &self.location,
            dispatch.volunteer_radius_meters,
            dispatch.volunteer_limit,
        )
        .await?;
        let hospital =
            Hospital::find_nearest(&self.location, dispatch.hospital_radius_meters).await?;

        self.nearest_volunteers = volunteers
            .iter()
            .filter_map(|volunteer| volunteer._id)
            .collect();
        self.hospital_id = hospital.and_then(|hospital| hospital._id);

        let accident_id = self.save().await?;

        for volunteer in volunteers.iter_mut() {
            volunteer.attach_accident(&accident_id).await?;
        }

        tracing::info!(
            accident = %accident_id,
            volunteers = self.nearest_volunteers.len(),
            hospital = ?self.hospital_id,
            "accident dispatched"
        );

        Ok(AccidentDispatch {
            message: "Accident reported successfully!".to_string(),
            accident_id: accident_id.to_hex(),
            nearest_volunteers: self
                .nearest_volunteers
                .iter()
                .map(|_id| _id.to_hex())
                .collect(),
            hospital_id: self.hospital_id.map(|_id| _id.to_hex()),
        })
    }
    pub async fn save(&mut self) -> Result<ObjectId> {
        let db: Database = get_db()?;
        let collection: Collection<Accident> = db.collection::<Accident>(ACCIDENTS);

        self._id = Some(ObjectId::new());

        collection
            .insert_one(&*self, None)
            .await
            .map_err(|error| {
                tracing::error!(%error, "accident insert failed");
                Error::InsertingFailed
            })?
            .inserted_id
            .as_object_id()
            .ok_or(Error::InsertingFailed)
    }
    /// Whether `account` may act on this accident: one of the matched
    /// volunteers or the assigned hospital.
    pub fn is_assigned_to(&self, account: &ObjectId, role: &AccountKind) -> bool {
        match role {
            AccountKind::Volunteer => self.nearest_volunteers.contains(account),
            AccountKind::Hospital => self.hospital_id.as_ref() == Some(account),
        }
    }
    pub async fn update_status(&mut self, next: AccidentStatusKind) -> Result<ObjectId> {
        if !self.status.can_transition_to(&next) {
            return Err(Error::InvalidStatusTransition);
        }
        let _id = self._id.ok_or(Error::NotFound("ACCIDENT"))?;

        let db: Database = get_db()?;
        let collection: Collection<Accident> = db.collection::<Accident>(ACCIDENTS);

        let now = DateTime::now();
        let current = to_bson(&self.status).map_err(|_| Error::UpdateFailed)?;
        let result = collection
            .update_one(
                doc! { "_id": _id, "status": current },
                doc! {
                    "$set": {
                        "status": to_bson(&next).map_err(|_| Error::UpdateFailed)?,
                        "updated_at": now,
                    }
                },
                None,
            )
            .await
            .map_err(|error| {
                tracing::error!(%error, accident = %_id, "status update failed");
                Error::UpdateFailed
            })?;
        // Someone else moved the accident first.
        if result.matched_count == 0 {
            return Err(Error::InvalidStatusTransition);
        }

        tracing::info!(accident = %_id, from = ?self.status, to = ?next, "accident status changed");
        self.status = next;
        self.updated_at = now;

        if next.is_terminal() {
            Volunteer::settle_accident(&self.nearest_volunteers, &_id, &next).await?;
        }
        Ok(_id)
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Accident>> {
        let db: Database = get_db()?;
        let collection: Collection<Accident> = db.collection::<Accident>(ACCIDENTS);

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| Error::QueryFailed)
    }
    pub async fn find_many(query: &AccidentQuery) -> Result<Vec<AccidentResponse>> {
        let pipeline = query.pipeline()?;

        let mut accidents: Vec<AccidentResponse> = Vec::new();
        if matches!(&query._id, Some(ids) if ids.is_empty()) {
            return Ok(accidents);
        }

        let db: Database = get_db()?;
        let collection: Collection<Accident> = db.collection::<Accident>(ACCIDENTS);

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(|error| {
                tracing::error!(%error, "accident query failed");
                Error::QueryFailed
            })?;
        while let Some(Ok(doc)) = cursor.next().await {
            let accident: AccidentResponse =
                from_document::<AccidentResponse>(doc).map_err(|_| Error::QueryFailed)?;
            accidents.push(accident);
        }
        Ok(accidents)
    }
    pub async fn find_detail_by_id(_id: &ObjectId) -> Result<Option<AccidentResponse>> {
        let query = AccidentQuery {
            _id: Some(vec![*_id]),
            limit: Some(1),
            ..AccidentQuery::default()
        };
        Ok(Self::find_many(&query).await?.pop())
    }
    pub async fn summary() -> Result<AccidentSummary> {
        let db: Database = get_db()?;
        let collection: Collection<Accident> = db.collection::<Accident>(ACCIDENTS);

        let pipeline = vec![doc! {
            "$group": { "_id": "$status", "count": { "$sum": 1 } }
        }];

        let mut summary = AccidentSummary::default();
        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(|_| Error::QueryFailed)?;
        while let Some(Ok(doc)) = cursor.next().await {
            let status = match doc.get("_id").cloned().map(from_bson::<AccidentStatusKind>) {
                Some(Ok(status)) => status,
                _ => continue,
            };
            let count = match doc.get("count") {
                Some(Bson::Int32(count)) => *count as u64,
                Some(Bson::Int64(count)) => *count as u64,
                _ => 0,
            };
            summary.tally(status, count);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AccidentRequest {
        AccidentRequest {
            description: Some("  Two cars collided at the junction ".to_string()),
            reporters: Some(vec!["witness@example.com".to_string(), " ".to_string()]),
            photos: Some(vec!["/files?kind=accident_photo&name=a.jpg".to_string()]),
            videos: None,
            location: Some(GeoPoint::new(72.8777, 19.0760)),
        }
    }

    #[test]
    fn test_from_request() {
        let accident = Accident::from_request(request()).unwrap();

        assert_eq!(accident.description, "Two cars collided at the junction");
        assert_eq!(accident.reporters, vec!["witness@example.com"]);
        assert_eq!(accident.photos.len(), 1);
        assert!(accident.videos.is_empty());
        assert_eq!(accident.status, AccidentStatusKind::Pending);
        assert!(accident.nearest_volunteers.is_empty());
        assert!(accident.hospital_id.is_none());
    }

    #[test]
    fn test_from_request_defaults_description() {
        let mut payload = request();
        payload.description = None;
        assert_eq!(
            Accident::from_request(payload).unwrap().description,
            DEFAULT_DESCRIPTION
        );

        let mut payload = request();
        payload.description = Some("   ".to_string());
        assert_eq!(
            Accident::from_request(payload).unwrap().description,
            DEFAULT_DESCRIPTION
        );
    }

    #[test]
    fn test_from_request_requires_location() {
        let mut payload = request();
        payload.location = None;
        assert_eq!(
            Accident::from_request(payload).unwrap_err(),
            Error::MissingField("ACCIDENT", "LOCATION")
        );

        let mut payload = request();
        payload.location = Some(GeoPoint::new(190.0, 0.0));
        assert_eq!(
            Accident::from_request(payload).unwrap_err(),
            Error::InvalidLocation
        );
    }

    #[test]
    fn test_status_transitions() {
        use AccidentStatusKind::*;

        assert!(Pending.can_transition_to(&InProgress));
        assert!(Pending.can_transition_to(&Resolved));
        assert!(Pending.can_transition_to(&Cancelled));
        assert!(InProgress.can_transition_to(&Resolved));
        assert!(InProgress.can_transition_to(&Cancelled));

        assert!(!Pending.can_transition_to(&Pending));
        assert!(!InProgress.can_transition_to(&Pending));
        assert!(!InProgress.can_transition_to(&InProgress));
        for terminal in [Resolved, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Pending, InProgress, Resolved, Cancelled] {
                assert!(!terminal.can_transition_to(&next));
            }
        }
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&AccidentStatusKind::InProgress).unwrap(),
            "\"in_progress\""
        );
        let request: AccidentStatusRequest =
            serde_json::from_str(r#"{"status":"cancelled"}"#).unwrap();
        assert_eq!(request.status, AccidentStatusKind::Cancelled);
    }

    #[test]
    fn test_is_assigned_to() {
        let mut accident = Accident::from_request(request()).unwrap();
        let volunteer = ObjectId::new();
        let hospital = ObjectId::new();
        accident.nearest_volunteers = vec![volunteer];
        accident.hospital_id = Some(hospital);

        assert!(accident.is_assigned_to(&volunteer, &AccountKind::Volunteer));
        assert!(accident.is_assigned_to(&hospital, &AccountKind::Hospital));
        assert!(!accident.is_assigned_to(&hospital, &AccountKind::Volunteer));
        assert!(!accident.is_assigned_to(&ObjectId::new(), &AccountKind::Volunteer));

        accident.hospital_id = None;
        assert!(!accident.is_assigned_to(&hospital, &AccountKind::Hospital));
    }

    #[test]
    fn test_summary_tally() {
        let mut summary = AccidentSummary::default();
        summary.tally(AccidentStatusKind::Pending, 3);
        summary.tally(AccidentStatusKind::Resolved, 5);
        summary.tally(AccidentStatusKind::Cancelled, 1);

        assert_eq!(
            summary,
            AccidentSummary {
                total: 9,
                pending: 3,
                in_progress: 0,
                resolved: 5,
                cancelled: 1,
            }
        );
    }

    #[test]
    fn test_pipeline_without_filters() {
        let pipeline = AccidentQuery::default().pipeline().unwrap();

        assert_eq!(pipeline.len(), 2);
        assert!(pipeline[0].contains_key("$sort"));
        assert!(pipeline[1].contains_key("$project"));
    }

    #[test]
    fn test_pipeline_with_filters() {
        let hospital_id = ObjectId::new();
        let query = AccidentQuery {
            _id: Some(vec![ObjectId::new(), ObjectId::new()]),
            hospital_id: Some(hospital_id),
            status: Some(AccidentStatusKind::InProgress),
            limit: Some(10),
        };
        let pipeline = query.pipeline().unwrap();

        let filter = pipeline[0].get_document("$match").unwrap();
        assert_eq!(
            filter
                .get_document("_id")
                .unwrap()
                .get_array("$in")
                .unwrap()
                .len(),
            2
        );
        assert_eq!(filter.get_object_id("hospital_id").unwrap(), hospital_id);
        assert_eq!(filter.get_str("status").unwrap(), "in_progress");
        assert_eq!(pipeline[2].get_i64("$limit").unwrap(), 10);
    }

    #[test]
    fn test_pipeline_rejects_non_positive_limit() {
        for limit in [0, usize::MAX] {
            let query = AccidentQuery {
                limit: Some(limit),
                ..AccidentQuery::default()
            };
            assert_eq!(query.pipeline().unwrap_err(), Error::InvalidLimit);
        }

        let query = AccidentQuery {
            limit: Some(1),
            ..AccidentQuery::default()
        };
        assert_eq!(query.pipeline().unwrap()[1].get_i64("$limit").unwrap(), 1);
    }

    #[test]
    fn test_dispatch_response_shape() {
        let dispatch = AccidentDispatch {
            message: "Accident reported successfully!".to_string(),
            accident_id: ObjectId::new().to_hex(),
            nearest_volunteers: vec![ObjectId::new().to_hex()],
            hospital_id: None,
        };
        let json = serde_json::to_value(&dispatch).unwrap();

        assert_eq!(json["message"], "Accident reported successfully!");
        assert_eq!(json["nearest_volunteers"].as_array().unwrap().len(), 1);
        assert!(json["hospital_id"].is_null());
    }
}
