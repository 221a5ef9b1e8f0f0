#![forbid(unsafe_code)]

pub mod error;
pub mod problem_service;

pub use tracker_core::Clock;

pub use error::ProblemServiceError;
pub use problem_service::ProblemService;
