pub mod coordinator;
pub mod worker;
pub mod writer;
