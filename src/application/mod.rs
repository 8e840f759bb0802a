pub mod interfaces;
pub mod jobs;
pub mod usecases;
