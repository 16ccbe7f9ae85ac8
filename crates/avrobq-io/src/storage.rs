use anyhow::Context;
use async_trait::async_trait;
use avrobq_core::{LoaderError, ObjectReader, SourceSpec};
use object_store::{
    gcp::GoogleCloudStorageBuilder, local::LocalFileSystem, path::Path as ObjectPath, ObjectStore,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Reads whole objects from any `object_store` backend
pub struct ObjectStoreReader {
    location: String,
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreReader {
    pub fn new(location: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            location: location.into(),
            store,
        }
    }
}

#[async_trait]
impl ObjectReader for ObjectStoreReader {
    fn location(&self) -> &str {
        &self.location
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, LoaderError> {
        // Object names are taken verbatim, without percent-encoding
        let fetch = async {
            let path = ObjectPath::parse(name)?;
            let result = self.store.get(&path).await?;
            let bytes = result.bytes().await?;
            Ok::<_, anyhow::Error>(bytes.to_vec())
        };
        let bytes = fetch.await.map_err(|source| LoaderError::Fetch {
            name: name.to_string(),
            location: self.location.clone(),
            source,
        })?;
        debug!(object = name, size = bytes.len(), "Read object");
        Ok(bytes)
    }
}

/// Builds the reader for the configured source
///
/// GCS credentials are picked up from the environment by the builder.
pub fn build_reader(spec: &SourceSpec) -> Result<ObjectStoreReader, LoaderError> {
    match spec {
        SourceSpec::Gcs { bucket } => {
            info!("Creating GCS object store for bucket: {}", bucket);
            let store = GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket)
                .build()
                .with_context(|| format!("gcs bucket {}", bucket))
                .map_err(|e| LoaderError::Config(format!("{:#}", e)))?;
            Ok(ObjectStoreReader::new(format!("gs://{}", bucket), Arc::new(store)))
        }
        SourceSpec::Local { root } => {
            info!("Creating local object store rooted at: {}", root);
            let store = LocalFileSystem::new_with_prefix(root)
                .with_context(|| format!("local root {}", root))
                .map_err(|e| LoaderError::Config(format!("{:#}", e)))?;
            Ok(ObjectStoreReader::new(format!("file://{}", root), Arc::new(store)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[test_log::test(tokio::test)]
    async fn reads_whole_object() {
        let store = Arc::new(InMemory::new());
        store
            .put(&ObjectPath::from("dir/file.avro"), vec![1u8, 2, 3].into())
            .await
            .unwrap();
        let reader = ObjectStoreReader::new("memory://test", store);
        assert_eq!(reader.read("dir/file.avro").await.unwrap(), vec![1, 2, 3]);
    }

    #[test_log::test(tokio::test)]
    async fn names_are_not_percent_encoded() {
        let store = Arc::new(InMemory::new());
        let names = [
            "exports/run#1.avro",
            "exports/~tmp.avro",
            "exports/a%20b.avro",
        ];
        for (i, name) in names.iter().enumerate() {
            store
                .put(&ObjectPath::parse(name).unwrap(), vec![i as u8].into())
                .await
                .unwrap();
        }
        let reader = ObjectStoreReader::new("memory://test", store);
        for (i, name) in names.iter().enumerate() {
            assert_eq!(reader.read(name).await.unwrap(), vec![i as u8], "{}", name);
        }
    }

    #[test_log::test(tokio::test)]
    async fn unparseable_name_is_a_fetch_error() {
        let reader = ObjectStoreReader::new("memory://test", Arc::new(InMemory::new()));
        assert!(matches!(
            reader.read("exports//empty-segment.avro").await,
            Err(LoaderError::Fetch { .. })
        ));
    }

    #[test_log::test(tokio::test)]
    async fn missing_object_is_a_fetch_error() {
        let reader = ObjectStoreReader::new("memory://test", Arc::new(InMemory::new()));
        match reader.read("nope.avro").await {
            Err(LoaderError::Fetch { name, location, .. }) => {
                assert_eq!(name, "nope.avro");
                assert_eq!(location, "memory://test");
            }
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[test_log::test(tokio::test)]
    async fn local_source_reads_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("incoming")).unwrap();
        std::fs::write(dir.path().join("incoming/a.avro"), b"abc").unwrap();

        let reader = build_reader(&SourceSpec::Local {
            root: dir.path().display().to_string(),
        })
        .unwrap();
        assert_eq!(reader.read("incoming/a.avro").await.unwrap(), b"abc".to_vec());
    }
}
