pub mod family;
pub mod profile;
