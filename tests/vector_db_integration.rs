use anyhow::Result;
use csv_insights::domain::exchange::EmbeddingRecord;
use csv_insights::qdrant_client::Qdrant;
use csv_insights::{VectorDb, VectorRepository};
use std::time::Duration;
use testcontainers::core::{ContainerAsync, ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::GenericImage;
use uuid::Uuid;

const VECTOR_SIZE: u64 = 3;

// Starts a throwaway Qdrant and returns a VectorDb bound to a fresh collection name.
async fn setup_qdrant() -> Result<(VectorDb, ContainerAsync<GenericImage>)> {
    let image = GenericImage::new("qdrant/qdrant", "latest")
        .with_exposed_port(ContainerPort::Tcp(6334))
        .with_wait_for(WaitFor::message_on_stdout("Qdrant gRPC listening on 6334"));

    let container = image.start().await?;
    let grpc_port = container.get_host_port_ipv4(6334).await?;
    let qdrant_url = format!("http://localhost:{}", grpc_port);

    let collection_name = format!("test_coll_{}", Uuid::new_v4().as_simple());
    let vector_db = VectorDb::connect(&qdrant_url, collection_name, VECTOR_SIZE)?;
    Ok((vector_db, container))
}

fn record(vector: Vec<f32>, question: &str, answer: &str) -> EmbeddingRecord {
    EmbeddingRecord {
        id: Uuid::new_v4().to_string(),
        vector,
        question: question.to_string(),
        answer: answer.to_string(),
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_collection_lifecycle() -> Result<()> {
    let (vector_db, _container) = setup_qdrant().await?;
    vector_db.health_check().await?;

    assert!(!vector_db.collection_exists().await?);
    vector_db.create_collection().await?;
    assert!(vector_db.collection_exists().await?);
    assert_eq!(vector_db.count().await?, 0);

    vector_db.delete_collection().await?;
    assert!(!vector_db.collection_exists().await?);
    Ok(())
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_insert_and_search() -> Result<()> {
    let (vector_db, _container) = setup_qdrant().await?;
    vector_db.create_collection().await?;

    vector_db
        .insert(record(vec![0.1, 0.2, 0.7], "Quale anno ha venduto di più?", "Il 2020."))
        .await?;
    vector_db
        .insert(record(vec![0.8, 0.1, 0.1], "Quanti titoli ci sono?", "Tre."))
        .await?;
    vector_db
        .insert(record(vec![0.1, 0.2, 0.7], "Quale anno ha venduto di più?", "Il 2020."))
        .await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(vector_db.count().await?, 3);

    let results = vector_db.search(vec![0.15, 0.25, 0.6], 2).await?;
    assert_eq!(results.len(), 2);
    assert!(results[0].score >= results[1].score);
    for exchange in &results {
        assert_eq!(exchange.question, "Quale anno ha venduto di più?");
        assert_eq!(exchange.answer, "Il 2020.");
    }

    let results = vector_db.search(vec![0.7, 0.15, 0.15], 1).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].answer, "Tre.");
    Ok(())
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_search_wrong_dimension() -> Result<()> {
    let (vector_db, _container) = setup_qdrant().await?;
    vector_db.create_collection().await?;

    let error_string = vector_db.search(vec![0.1, 0.2], 5).await.unwrap_err().to_string();
    assert!(
        error_string.contains("Query vector dimension (2) does not match collection dimension (3)"),
        "Error message should indicate wrong dimension: {}",
        error_string
    );
    Ok(())
}

#[tokio::test]
async fn test_vector_db_new_invalid_params() -> Result<()> {
    let client1 = Qdrant::from_url("http://dummy-url1").build()?;
    assert!(VectorDb::new(Box::new(client1), "".to_string(), 3).is_err());
    let client2 = Qdrant::from_url("http://dummy-url2").build()?;
    assert!(VectorDb::new(Box::new(client2), "test".to_string(), 0).is_err());
    Ok(())
}
