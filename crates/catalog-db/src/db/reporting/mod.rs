pub mod crash;
pub mod error;
pub mod log_management;

pub use crash::CrashReportingRepository;
pub use error::ErrorReportingRepository;
pub use log_management::LogManagementRepository;
