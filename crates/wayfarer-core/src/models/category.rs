use serde::{Deserialize, Serialize};

/// Upload category for a photo. Fixed at request time, immutable thereafter.
///
/// The category determines the raw byte-size ceiling, the compression target,
/// and the folder the asset lands in on the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadCategory {
    Location,
    Avatar,
    Banner,
}

impl UploadCategory {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "location" => Ok(UploadCategory::Location),
            "avatar" => Ok(UploadCategory::Avatar),
            "banner" => Ok(UploadCategory::Banner),
            other => Err(format!(
                "Invalid upload type: {} (expected location, avatar, or banner)",
                other
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadCategory::Location => "location",
            UploadCategory::Avatar => "avatar",
            UploadCategory::Banner => "banner",
        }
    }

    /// Remote storage folder for this category.
    pub fn folder(&self) -> &'static str {
        match self {
            UploadCategory::Location => "locations",
            UploadCategory::Avatar => "avatars",
            UploadCategory::Banner => "banners",
        }
    }
}

impl std::fmt::Display for UploadCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            UploadCategory::parse("location").unwrap(),
            UploadCategory::Location
        );
        assert_eq!(
            UploadCategory::parse("AVATAR").unwrap(),
            UploadCategory::Avatar
        );
        assert_eq!(
            UploadCategory::parse("banner").unwrap(),
            UploadCategory::Banner
        );
        assert!(UploadCategory::parse("gallery").is_err());
    }

    #[test]
    fn test_folder() {
        assert_eq!(UploadCategory::Location.folder(), "locations");
        assert_eq!(UploadCategory::Avatar.folder(), "avatars");
        assert_eq!(UploadCategory::Banner.folder(), "banners");
    }
}
