//! Background job scheduler and job implementations.

mod reconcile;
mod scheduler;

pub use reconcile::ReconcileJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
