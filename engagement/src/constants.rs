pub const MAX_PARALLEL_REQUESTS: usize = 25;
pub const BATCH_CHUNK_SIZE: usize = 100;
pub const USER_ID_HEADER: &str = "X-User-Id";
