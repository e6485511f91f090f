pub mod cache;
pub mod digest;
pub mod gzip;
pub mod object;
pub mod poll;
