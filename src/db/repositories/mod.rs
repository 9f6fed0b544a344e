pub mod days;
pub mod preferences;
