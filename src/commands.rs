pub mod clean;
pub mod convert;
pub mod doctor;
pub mod merge;
pub mod order;
