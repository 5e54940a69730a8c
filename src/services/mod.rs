//! # Services
//!
//! Application-facing service layer: roster CRUD over the write pipeline,
//! and the upstream content search that consumes the resilient client.

pub mod person_service;
pub mod remote_content_service;

pub use person_service::PersonService;
pub use remote_content_service::{
    ContentItem, ContentPage, RemoteContentError, RemoteContentService,
};
