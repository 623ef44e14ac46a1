//! Error types, one enum per concern.

pub mod cache_error;
pub mod checksum_error;
pub mod class_error;
pub mod cpio_error;
pub mod download_error;
pub mod elf_error;
pub mod extract_error;
pub mod load_error;
pub mod repomd_error;
pub mod rpm_error;
pub mod storage_error;
pub mod zip_error;

pub use cache_error::CacheError;
pub use checksum_error::ChecksumError;
pub use class_error::JavaClassError;
pub use cpio_error::CpioError;
pub use download_error::DownloadError;
pub use elf_error::ElfError;
pub use extract_error::ExtractError;
pub use load_error::LoadError;
pub use repomd_error::RepomdError;
pub use rpm_error::RpmError;
pub use storage_error::StorageError;
pub use zip_error::ZipError;
