//! Requires Docker: `cargo test -p repolens-memory -- --ignored`.

use std::collections::HashMap;

use repolens_memory::{FieldValue, QdrantOps, VectorFilter, VectorPoint, VectorStore};
use testcontainers::ContainerAsync;
use testcontainers::GenericImage;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

async fn setup() -> (QdrantOps, ContainerAsync<GenericImage>) {
    let container = qdrant_image().start().await.unwrap();
    let grpc_port = container.get_host_port_ipv4(6334).await.unwrap();
    let ops = QdrantOps::new(&format!("http://127.0.0.1:{grpc_port}")).unwrap();
    (ops, container)
}

fn point(id: &str, vector: Vec<f32>, kind: &str) -> VectorPoint {
    VectorPoint {
        id: id.into(),
        vector,
        payload: HashMap::from([("type".into(), serde_json::json!(kind))]),
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn ensure_collection_is_idempotent() {
    let (ops, _container) = setup().await;
    ops.ensure_collection("repo_1", 4).await.unwrap();
    ops.ensure_collection("repo_1", 4).await.unwrap();
    assert!(ops.collection_exists("repo_1").await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn upsert_search_and_exclude_commits() {
    let (ops, _container) = setup().await;
    ops.ensure_collection("repo_2", 4).await.unwrap();
    ops.upsert(
        "repo_2",
        vec![
            point(
                "0b4f4a76-4d0a-5c1a-9d5e-2f6f3b0f8a11",
                vec![1.0, 0.0, 0.0, 0.0],
                "commit",
            ),
            point(
                "7c9e6679-7425-40de-944b-e07fc1f90ae7",
                vec![0.9, 0.1, 0.0, 0.0],
                "function",
            ),
        ],
    )
    .await
    .unwrap();

    assert_eq!(ops.count("repo_2").await.unwrap(), 2);

    let filter = VectorFilter::exclude("type", FieldValue::Text("commit".into()));
    let hits = ops
        .search("repo_2", vec![1.0, 0.0, 0.0, 0.0], 3, Some(filter))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "7c9e6679-7425-40de-944b-e07fc1f90ae7");
    assert_eq!(hits[0].payload["type"], "function");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn delete_collection_then_missing() {
    let (ops, _container) = setup().await;
    ops.ensure_collection("repo_3", 4).await.unwrap();
    ops.delete_collection("repo_3").await.unwrap();
    assert!(!ops.collection_exists("repo_3").await.unwrap());
    ops.delete_collection("repo_3").await.unwrap();
}
