use opendal::services::S3;
use opendal::Operator;

use crate::config::StorageConfig;

/// Time a presigned upload URL stays valid.
pub const UPLOAD_URL_TTL: std::time::Duration = std::time::Duration::from_secs(300);

pub fn init_operator(config: &StorageConfig) -> anyhow::Result<Operator> {
    let op = Operator::new(
        S3::default()
            .endpoint(&config.endpoint)
            .bucket(&config.bucket)
            .region(&config.region)
            .access_key_id(&config.access_key)
            .secret_access_key(&config.secret_key),
    )?
    .finish();
    Ok(op)
}

/// Public URL under which an uploaded object is served. Records store these
/// URLs, never raw file bytes.
pub fn object_url(config: &StorageConfig, key: &str) -> String {
    format!(
        "{}/{}",
        config.public_base_url.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

/// Maps an incoming content type onto the file extension used in object keys.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_urls_join_cleanly() {
        let config = StorageConfig {
            endpoint: "https://storage.example".to_string(),
            bucket: "lifther".to_string(),
            region: "ap-south-1".to_string(),
            access_key: "k".to_string(),
            secret_key: "s".to_string(),
            public_base_url: "https://cdn.example/lifther/".to_string(),
        };
        assert_eq!(
            object_url(&config, "/stories/u1/a.jpg"),
            "https://cdn.example/lifther/stories/u1/a.jpg"
        );
    }

    #[test]
    fn only_supported_upload_types_map() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("application/pdf"), Some("pdf"));
        assert_eq!(extension_for("image/gif"), None);
    }
}
