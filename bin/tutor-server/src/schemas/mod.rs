//! Request / response bodies for the `/api` routes.

pub mod render;
pub mod solve;
