//! HTTP route handlers grouped by resource domain.
//!
//! Each submodule corresponds to a logical area of the API
//! (catalog, practice, dashboard, admin, etc.) and exposes typed Rocket
//! handlers annotated with `#[openapi]` so `rocket_okapi` can derive
//! an OpenAPI document automatically.

pub mod admin;
pub mod admin_users;
pub mod catalog;
pub mod chatbot;
pub mod dashboard;
pub mod health;
pub(crate) mod helpers;
pub mod params;
pub mod practice;
pub mod uploads;
