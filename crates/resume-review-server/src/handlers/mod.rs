pub mod health;
pub mod query;
pub mod storage;
pub mod upload;
