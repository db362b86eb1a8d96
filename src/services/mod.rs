pub mod camera;
pub mod catalog;
pub mod encryption;
pub mod gateway;
pub mod lifecycle;
pub mod passkey;
pub mod session;
pub mod store;
pub mod workbench;
