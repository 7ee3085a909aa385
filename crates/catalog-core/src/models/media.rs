use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of catalog entry (movie, tv_show, song, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub detection_patterns: Vec<String>,
    pub metadata_providers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A detected media entity with its aggregated descriptive metadata
///
/// Items form a hierarchy through `parent_id`: seasons belong to shows,
/// episodes to seasons, songs to albums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub media_type_id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genre: Vec<String>,
    pub director: Option<String>,
    pub cast_crew: Option<CastCrew>,
    pub rating: Option<f64>,
    pub runtime: Option<i32>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub status: String,
    pub parent_id: Option<i64>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub track_number: Option<i32>,
    pub first_detected: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl MediaItem {
    /// A fresh, unsaved item of the given type. Timestamps are left unset and
    /// filled in when the item is stored.
    pub fn new(media_type_id: i64, title: impl Into<String>) -> Self {
        Self {
            id: 0,
            media_type_id,
            title: title.into(),
            original_title: None,
            year: None,
            description: None,
            genre: Vec::new(),
            director: None,
            cast_crew: None,
            rating: None,
            runtime: None,
            language: None,
            country: None,
            status: "detected".to_string(),
            parent_id: None,
            season_number: None,
            episode_number: None,
            track_number: None,
            first_detected: DateTime::<Utc>::default(),
            last_updated: DateTime::<Utc>::default(),
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CastCrew {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub writers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<Actor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub producers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub musicians: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub developers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub character: String,
    #[serde(default)]
    pub order: i32,
}

/// Items sharing a title and media type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DuplicateGroup {
    pub title: String,
    pub media_type_id: i64,
    #[serde(rename = "media_type")]
    pub media_type_name: String,
    pub count: i64,
}

/// Items sharing title, media type and year, with the member ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateEntityGroup {
    pub title: String,
    pub media_type: String,
    pub year: Option<i32>,
    pub count: i64,
    pub entity_ids: Vec<i64>,
}

/// Row of the media item / file junction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaFileRecord {
    pub id: i64,
    pub media_item_id: i64,
    pub file_id: i64,
    pub quality_info: Option<String>,
    pub language: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// A file linked to more than one media item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateFileGroup {
    pub file_id: i64,
    pub item_count: i64,
    pub item_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaCollection {
    pub id: i64,
    pub name: String,
    pub collection_type: String,
    pub description: Option<String>,
    pub total_items: i32,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub external_ids: HashMap<String, String>,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaCollection {
    pub fn new(name: impl Into<String>, collection_type: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            collection_type: collection_type.into(),
            description: None,
            total_items: 0,
            external_ids: HashMap::new(),
            cover_url: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }
}

/// Metadata fetched from an external provider (tmdb, imdb, musicbrainz, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ExternalMetadata {
    pub id: i64,
    pub media_item_id: i64,
    pub provider: String,
    pub external_id: String,
    /// Raw provider payload
    pub data: String,
    pub rating: Option<f64>,
    pub review_url: Option<String>,
    pub cover_url: Option<String>,
    pub trailer_url: Option<String>,
    pub last_fetched: DateTime<Utc>,
}

impl ExternalMetadata {
    pub fn new(
        media_item_id: i64,
        provider: impl Into<String>,
        external_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            media_item_id,
            provider: provider.into(),
            external_id: external_id.into(),
            data: data.into(),
            rating: None,
            review_url: None,
            cover_url: None,
            trailer_url: None,
            last_fetched: DateTime::<Utc>::default(),
        }
    }
}

/// Per-user rating, watch state and notes for a media item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetadata {
    pub id: i64,
    pub media_item_id: i64,
    pub user_id: i64,
    pub user_rating: Option<f64>,
    pub watched_status: Option<String>,
    pub watched_date: Option<DateTime<Utc>>,
    pub personal_notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserMetadata {
    pub fn new(media_item_id: i64, user_id: i64) -> Self {
        Self {
            id: 0,
            media_item_id,
            user_id,
            user_rating: None,
            watched_status: None,
            watched_date: None,
            personal_notes: None,
            tags: Vec::new(),
            favorite: false,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }
}

/// Evidence gathered while deciding what a directory holds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisData {
    pub matched_patterns: Vec<String>,
    pub file_types: HashMap<String, i64>,
    pub size_distribution: HashMap<String, i64>,
    pub detected_languages: Vec<String>,
    pub quality_indicators: Vec<String>,
    pub structure_score: f64,
    pub filename_score: f64,
    pub metadata_score: f64,
    pub alternative_titles: Vec<String>,
}

/// Detection result for one directory on a storage root
///
/// `media_item_id` stays empty until the directory is linked to a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryAnalysis {
    pub id: i64,
    pub directory_path: String,
    pub storage_root: String,
    pub media_item_id: Option<i64>,
    pub confidence_score: f64,
    pub detection_method: String,
    pub analysis_data: Option<AnalysisData>,
    pub last_analyzed: DateTime<Utc>,
    pub files_count: i64,
    pub total_size: i64,
}

impl DirectoryAnalysis {
    pub fn new(directory_path: impl Into<String>, storage_root: impl Into<String>) -> Self {
        Self {
            id: 0,
            directory_path: directory_path.into(),
            storage_root: storage_root.into(),
            media_item_id: None,
            confidence_score: 0.0,
            detection_method: String::new(),
            analysis_data: None,
            last_analyzed: DateTime::<Utc>::default(),
            files_count: 0,
            total_size: 0,
        }
    }
}
