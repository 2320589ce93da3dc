pub mod batch;
pub mod cancel;
pub mod error;
pub mod manifest;
pub mod render;
pub mod video;
