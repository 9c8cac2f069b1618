pub mod api;
pub mod profile;
pub mod wait;
