pub mod ai;
pub mod journal;
pub mod mood;
