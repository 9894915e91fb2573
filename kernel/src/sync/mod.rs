//! Kernel synchronisation

pub mod kernel_lock;

pub use kernel_lock::Kernel;
