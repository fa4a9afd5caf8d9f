pub mod aggregate;
pub mod classifier;
pub mod dictionary;
pub mod inference;
pub mod normalize;
pub mod profile;
pub mod script;
pub mod storage;
