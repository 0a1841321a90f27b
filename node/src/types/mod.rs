pub mod assets;
pub mod bridge;
pub mod error;
pub mod external_initiator;
pub mod job_run;
pub mod job_spec;
pub mod key;
pub mod pagination;
pub mod params;
pub mod run_result;
pub mod status;
pub mod sync_event;
pub mod tx;

pub use error::TypeError;
