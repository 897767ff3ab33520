//! Store a model in an in-memory registry and search for it.
//!
//! Run with: RUST_LOG=debug cargo run -p registry-store --example walkthrough

use registry_store::{
    BlobContent, BlobStore, Descriptor, Digest, IndexStore, Manifest, ManifestStore,
    RegistryConfig, MEDIA_TYPE_CONFIG, MEDIA_TYPE_MANIFEST,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = RegistryConfig::from_toml(r#"storage = "memory""#)?
        .build()
        .await?;

    let config = b"name: net\nframework: onnx\n";
    let digest = Digest::sha256(config);
    store
        .put_blob("alice/net", &digest, BlobContent::from_bytes(&config[..]))
        .await?;

    let manifest = Manifest {
        config: Descriptor {
            name: "modelx.yaml".into(),
            media_type: MEDIA_TYPE_CONFIG.into(),
            digest,
            size: config.len() as u64,
            ..Default::default()
        },
        ..Default::default()
    };
    store
        .put_manifest("alice/net", "v1", MEDIA_TYPE_MANIFEST, &manifest)
        .await?;

    for repository in store.get_global_index("net").await?.manifests {
        tracing::info!(name = %repository.name, digest = %repository.digest, "found repository");
        for reference in store.get_index(&repository.name, "").await?.manifests {
            tracing::info!(reference = %reference.name, size = reference.size, "  reference");
        }
    }

    Ok(())
}
