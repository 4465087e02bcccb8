pub mod episode;
pub mod pin;
pub mod reading;
pub mod status;
