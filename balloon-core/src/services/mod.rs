// Business logic services layer
//
// Each service wraps its read-then-write critical section in a single
// transaction against the shared store; the store's serializable isolation
// is the only concurrency control. No in-process locks.

pub mod budget;
pub mod lifecycle;
pub mod scheduler;
