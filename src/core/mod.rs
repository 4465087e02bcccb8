pub mod fold;
pub mod history;
pub mod ingest;
pub mod live;
pub mod log;
pub mod resolve;
pub mod series;
pub mod verify;
pub mod worker;
