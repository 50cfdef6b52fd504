pub mod domain;
pub mod reports;
pub mod shared;
pub mod storage;
