//! Request and Response models for the MuzLoto API
//!
//! DTOs for the cache administration endpoints. Entity endpoints serialize
//! the entity types from [`crate::entities`] directly.

pub mod requests;
pub mod responses;

pub use requests::{InvalidateRequest, ListQuery};
pub use responses::{
    CacheValueResponse, ClearResponse, DeleteResponse, HealthResponse, InvalidateResponse,
    StatsResponse,
};
