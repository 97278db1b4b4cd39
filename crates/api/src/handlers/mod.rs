pub mod jobs;
pub mod train;
