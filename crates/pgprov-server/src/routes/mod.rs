pub mod jobs;
pub mod lifecycle;
pub mod status;
