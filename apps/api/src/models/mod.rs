pub mod analysis;
pub mod candidate;
pub mod pipeline;
pub mod project;
pub mod report;
pub mod status;
