pub mod alerts;
pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod decode;
pub mod discovery;
pub mod error;
pub mod ingest;
pub mod mqtt;
pub mod repositories;
pub mod ws;
