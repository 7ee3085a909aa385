use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::user::DeviceInfo;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// One play, download or view of a media item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAccessLog {
    pub id: i64,
    pub user_id: i64,
    pub media_id: i64,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_duration: Option<Duration>,
    pub access_time: DateTime<Utc>,
}

impl MediaAccessLog {
    pub fn new(user_id: i64, media_id: i64, action: impl Into<String>) -> Self {
        Self {
            id: 0,
            user_id,
            media_id,
            action: action.into(),
            device_info: None,
            location: None,
            ip_address: None,
            user_agent: None,
            playback_duration: None,
            access_time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: i64,
    pub user_id: i64,
    pub event_type: String,
    pub event_category: String,
    /// Free-form payload, usually a JSON document
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(
        user_id: i64,
        event_type: impl Into<String>,
        event_category: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            event_type: event_type.into(),
            event_category: event_category.into(),
            data: data.into(),
            device_info: None,
            location: None,
            ip_address: None,
            user_agent: None,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaAccessCount {
    pub media_id: i64,
    pub access_count: i64,
}

/// Users registered on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserGrowthPoint {
    pub date: NaiveDate,
    pub user_count: i64,
}

/// A user's activity span on one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAccess {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub access_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeographicData {
    pub locations: Vec<LocationAccess>,
    pub countries: HashMap<String, i64>,
}

impl GeographicData {
    /// Record accesses from one location, rolling them up by country
    pub fn add(&mut self, location: Location, access_count: i64) {
        if let Some(country) = &location.country {
            *self.countries.entry(country.clone()).or_insert(0) += access_count;
        }
        self.locations.push(LocationAccess {
            latitude: location.latitude,
            longitude: location.longitude,
            country: location.country,
            city: location.city,
            access_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located(country: Option<&str>) -> Location {
        Location {
            latitude: 52.5,
            longitude: 13.4,
            country: country.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn countries_accumulate_across_locations() {
        let mut geo = GeographicData::default();
        geo.add(located(Some("DE")), 3);
        geo.add(located(Some("DE")), 2);
        geo.add(located(None), 7);

        assert_eq!(geo.locations.len(), 3);
        assert_eq!(geo.countries.get("DE"), Some(&5));
        assert_eq!(geo.countries.len(), 1);
    }

    #[test]
    fn location_without_country_parses() {
        let location: Location = serde_json::from_str(r#"{"latitude":1.5,"longitude":-2.0}"#).unwrap();
        assert!(location.country.is_none());
        assert_eq!(location.longitude, -2.0);
    }
}
