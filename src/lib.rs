pub mod config;
pub mod decision;
pub mod delay_updater;
pub mod executor;
pub mod id_allocator;
pub mod lockfile;
pub mod metrics_client;
pub mod metrics_collector;
pub mod process_manager;
pub mod store;
pub mod supervisor;
pub mod surveyor;
pub mod types;
