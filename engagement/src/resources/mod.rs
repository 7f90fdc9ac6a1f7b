#[cfg(test)]
pub mod memory_lock;
pub mod resource;
pub mod resource_locker;
