pub mod asset;
pub mod blob;
pub mod health;
