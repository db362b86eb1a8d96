//! AuditGig vehicle inspection client
//!
//! A single-operator service for gig inspectors: sign in, accept an
//! inspection mission, capture the required photos, have defects and the
//! registration card checked by a Gemini vision model, and submit the
//! completed audit to collect the reward into the worker's wallet.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
