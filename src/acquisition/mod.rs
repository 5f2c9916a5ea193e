pub mod downloader;
pub mod error;
pub mod planner;
pub mod request;
pub mod scheduler;
