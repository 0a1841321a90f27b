pub mod external_initiators;
pub mod head_tracker;
pub mod run_executor;
pub mod store;
pub mod synchronization;
pub mod tx_manager;
