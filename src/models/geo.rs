use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum GeoKind {
    #[default]
    Point,
}

/// GeoJSON point, `coordinates` is `[longitude, latitude]`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub kind: GeoKind,
    pub coordinates: Vec<f64>,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: GeoKind::Point,
            coordinates: vec![longitude, latitude],
        }
    }
    pub fn validate(&self) -> Result<()> {
        match self.coordinates.as_slice() {
            [longitude, latitude]
                if longitude.is_finite()
                    && latitude.is_finite()
                    && (-180.0..=180.0).contains(longitude)
                    && (-90.0..=90.0).contains(latitude) =>
            {
                Ok(())
            }
            _ => Err(Error::InvalidLocation),
        }
    }
    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.first().copied()
    }
    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.get(1).copied()
    }
    pub fn to_document(&self) -> Document {
        doc! {
            "type": "Point",
            "coordinates": self.coordinates.clone(),
        }
    }
}

/// Proximity filter on a `2dsphere`-indexed field. Matches come back nearest
/// first.
pub fn near_filter(field: &str, point: &GeoPoint, max_distance_meters: f64) -> Document {
    let mut filter = Document::new();
    filter.insert(
        field,
        doc! {
            "$near": {
                "$geometry": point.to_document(),
                "$maxDistance": max_distance_meters,
            }
        },
    );
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{from_document, to_document, Bson};

    #[test]
    fn test_valid_point() {
        let point = GeoPoint::new(106.8456, -6.2088);
        assert!(point.validate().is_ok());
        assert_eq!(point.longitude(), Some(106.8456));
        assert_eq!(point.latitude(), Some(-6.2088));
    }

    #[test]
    fn test_origin_is_a_valid_point() {
        assert!(GeoPoint::new(0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn test_out_of_range_point_is_rejected() {
        assert_eq!(
            GeoPoint::new(181.0, 0.0).validate(),
            Err(Error::InvalidLocation)
        );
        assert_eq!(
            GeoPoint::new(0.0, -90.5).validate(),
            Err(Error::InvalidLocation)
        );
        assert_eq!(
            GeoPoint::new(f64::NAN, 10.0).validate(),
            Err(Error::InvalidLocation)
        );
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        let point = GeoPoint {
            kind: GeoKind::Point,
            coordinates: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(point.validate(), Err(Error::InvalidLocation));

        let point = GeoPoint {
            kind: GeoKind::Point,
            coordinates: vec![1.0],
        };
        assert_eq!(point.validate(), Err(Error::InvalidLocation));
    }

    #[test]
    fn test_geojson_shape() {
        let point = GeoPoint::new(-73.9857, 40.7484);
        let document = to_document(&point).unwrap();

        assert_eq!(document.get_str("type").unwrap(), "Point");
        assert_eq!(
            document.get_array("coordinates").unwrap(),
            &vec![Bson::Double(-73.9857), Bson::Double(40.7484)]
        );
        assert_eq!(document, point.to_document());
        assert_eq!(from_document::<GeoPoint>(document).unwrap(), point);
    }

    #[test]
    fn test_non_point_type_fails_to_deserialize() {
        let document = doc! { "type": "Polygon", "coordinates": [0.0, 0.0] };
        assert!(from_document::<GeoPoint>(document).is_err());
    }

    #[test]
    fn test_near_filter() {
        let point = GeoPoint::new(2.2945, 48.8584);
        let filter = near_filter("location", &point, 5_000.0);

        let near = filter
            .get_document("location")
            .unwrap()
            .get_document("$near")
            .unwrap();
        assert_eq!(near.get_f64("$maxDistance").unwrap(), 5_000.0);
        assert_eq!(near.get_document("$geometry").unwrap(), &point.to_document());
    }
}
