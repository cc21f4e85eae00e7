pub mod asset;
pub mod category;
pub mod metadata;
pub mod reference;
pub mod scan;

pub use asset::ProcessedAsset;
pub use category::UploadCategory;
pub use metadata::SanitizedMetadata;
pub use reference::RemoteReference;
pub use scan::{ScanPosture, ScanVerdict};
