//! Prerequisite playground: a concept-graph prerequisite resolver and an
//! adaptive yes/no diagnostic session engine served over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod diagnostic;
pub mod graph;
pub mod models;
pub mod questions;
