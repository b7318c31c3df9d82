pub mod execution_log;
pub mod job;
pub mod job_status;
pub mod job_type;
