pub type JobId = u64;
pub type JobType = u64;
pub type Seconds = u64;
pub type OutputBlob = bytes::Bytes;
