pub mod config;
pub mod db;
pub mod events;
pub mod fold;
pub mod ingest;
pub mod init;
pub mod log;
pub mod readings;
pub mod series;
pub mod status;
