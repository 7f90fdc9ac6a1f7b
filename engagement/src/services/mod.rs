pub mod counter;
pub mod reconciler;
pub mod retry;
