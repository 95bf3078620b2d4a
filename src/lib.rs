pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod email_client;
pub mod ingest;
pub mod render;
pub mod routes;
pub mod social;
pub mod startup;
pub mod storage;
pub mod telemetry;
