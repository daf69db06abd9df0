pub mod app;
mod routes;
