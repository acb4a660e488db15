pub mod complete;
pub mod info;
