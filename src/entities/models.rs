//! Entity records and their create/update payloads.
//!
//! Patch types skip unset fields when serialized, so the backend merges only
//! what the caller provided.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;

// == City ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCity {
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Entity for City {
    type New = NewCity;
    type Patch = CityPatch;
    const KEY: &'static str = "city";
    const LIST_KEY: &'static str = "cities";
    const TABLE: &'static str = "cities";

    fn id(&self) -> i64 {
        self.id
    }
}

// == Location ==
/// A venue in a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub city_id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewLocation {
    pub city_id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

impl Entity for Location {
    type New = NewLocation;
    type Patch = LocationPatch;
    const KEY: &'static str = "location";
    const LIST_KEY: &'static str = "locations";
    const TABLE: &'static str = "locations";
    const SCOPE_COLUMN: Option<&'static str> = Some("city_id");

    fn id(&self) -> i64 {
        self.id
    }
}

// == Event ==
/// A scheduled game night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub city_id: i64,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub project_id: Option<i64>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub price: Option<u32>,
    #[serde(default)]
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub city_id: i64,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub project_id: Option<i64>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub price: Option<u32>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

impl Entity for Event {
    type New = NewEvent;
    type Patch = EventPatch;
    const KEY: &'static str = "event";
    const LIST_KEY: &'static str = "events";
    const TABLE: &'static str = "events";
    const SCOPE_COLUMN: Option<&'static str> = Some("city_id");

    fn id(&self) -> i64 {
        self.id
    }
}

// == Registration ==
/// A team signed up for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default = "default_guests")]
    pub guests: u32,
    pub created_at: DateTime<Utc>,
}

fn default_guests() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRegistration {
    pub event_id: i64,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default = "default_guests")]
    pub guests: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests: Option<u32>,
}

impl Entity for Registration {
    type New = NewRegistration;
    type Patch = RegistrationPatch;
    const KEY: &'static str = "registration";
    const LIST_KEY: &'static str = "registrations";
    const TABLE: &'static str = "registrations";
    const SCOPE_COLUMN: Option<&'static str> = Some("event_id");

    fn id(&self) -> i64 {
        self.id
    }
}

// == Project ==
/// A music-bingo game: rounds of tracks played at events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rounds: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rounds: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<u32>,
}

impl Entity for Project {
    type New = NewProject;
    type Patch = ProjectPatch;
    const KEY: &'static str = "project";
    const LIST_KEY: &'static str = "projects";
    const TABLE: &'static str = "projects";

    fn id(&self) -> i64 {
        self.id
    }
}

// == Track ==
/// One cell of a project's track grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub position: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTrack {
    pub project_id: i64,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub position: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl Entity for Track {
    type New = NewTrack;
    type Patch = TrackPatch;
    const KEY: &'static str = "track";
    const LIST_KEY: &'static str = "tracks";
    const TABLE: &'static str = "tracks";
    const SCOPE_COLUMN: Option<&'static str> = Some("project_id");

    fn id(&self) -> i64 {
        self.id
    }
}
