pub mod conversion;
pub mod sync;

pub use conversion::ConversionRepository;
pub use stress_test::StressTestRepository;
pub use sync::SyncRepository;
