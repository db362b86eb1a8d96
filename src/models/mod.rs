pub mod api;
pub mod evidence;
pub mod mission;
pub mod profile;
