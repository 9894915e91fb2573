// src/lib.rs
// Point d'entrée de la bibliothèque du noyau: ordonnanceur multiprocesseur
#![cfg_attr(not(test), no_std)] // Pas de bibliothèque standard hors tests

// Modules du noyau
pub mod arch;
pub mod config;
pub mod logger;
pub mod processor;
pub mod scheduler;
pub mod sync;

pub use config::SchedulerConfig;
pub use processor::{CpuId, Drivers, Processor, ProcessorPool};
pub use scheduler::{Job, Priority, Scheduler, SchedulerError, SchedulerResult};
pub use sync::Kernel;
