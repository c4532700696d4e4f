//! Business logic services layer

pub mod converter;
pub mod in_memory;
pub mod job_service;
pub mod properties;

pub use converter::{DefaultJobParametersConverter, JobParametersConverter};
pub use in_memory::{DelayJob, InMemoryJobService, Job, NoopJob};
pub use job_service::{JobService, JobServiceResult};
