//! HTTP API for emotrack-ingest

pub mod buildinfo;
pub mod health;
pub mod sse;
pub mod ws;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use sse::event_stream;
pub use ws::video_stream;
