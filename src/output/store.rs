//! Object store construction
//!
//! Credentials are the embedding application's problem: the S3 backend
//! reads them from the environment the way the SDK tooling sets them up.

use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::ObjectStore;

use crate::config::OutputConfig;

use super::WriteError;

/// Build the output backend from configuration. When both sinks are
/// configured the local directory wins; a run writes one canonical tree.
pub fn build_store(output: &OutputConfig) -> Result<(Arc<dyn ObjectStore>, Path), WriteError> {
    if let Some(dir) = &output.local_directory {
        std::fs::create_dir_all(dir)?;
        let store = LocalFileSystem::new_with_prefix(dir)?;
        return Ok((Arc::new(store), Path::default()));
    }

    if let Some(s3) = &output.s3 {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(&s3.bucket)
            .with_region(&s3.region)
            .build()?;
        let prefix = s3
            .prefix
            .as_deref()
            .map(Path::from)
            .unwrap_or_default();
        return Ok((Arc::new(store), prefix));
    }

    Err(WriteError::Config(
        "neither output.local_directory nor output.s3 is configured".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_store_builds_and_creates_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/nested");
        let output = OutputConfig {
            local_directory: Some(target.clone()),
            s3: None,
        };
        let (_store, prefix) = build_store(&output).unwrap();
        assert!(target.is_dir());
        assert_eq!(prefix, Path::default());
    }

    #[test]
    fn empty_output_is_a_config_error() {
        let output = OutputConfig {
            local_directory: None,
            s3: None,
        };
        assert!(matches!(
            build_store(&output),
            Err(WriteError::Config(_))
        ));
    }
}
