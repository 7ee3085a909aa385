pub mod collection;
pub mod directory_analysis;
pub mod duplicate;
pub mod external_metadata;
pub mod file;
pub mod media_file;
pub mod media_item;
pub mod stats;
pub mod user_metadata;

pub use collection::MediaCollectionRepository;
pub use directory_analysis::DirectoryAnalysisRepository;
pub use duplicate::DuplicateEntityRepository;
pub use external_metadata::ExternalMetadataRepository;
pub use file::{escape_like, rebase_path, split_parent, FileRepository};
pub use media_file::MediaFileRepository;
pub use media_item::MediaItemRepository;
pub use stats::StatsRepository;
pub use user_metadata::UserMetadataRepository;
