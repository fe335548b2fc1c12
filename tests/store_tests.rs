use tripplanner::core::models::{ActivityPreference, TripRecord, TripRequest};
use tripplanner::store::{JsonlTripStore, MemoryTripStore, TripStore};

fn record(destination: &str, itinerary: &str) -> TripRecord {
    let request = TripRequest::new(destination, 2, 10000.0, 2, ActivityPreference::Outdoor).unwrap();
    TripRecord::from_generation(&request, itinerary.to_string())
}

#[tokio::test]
async fn test_memory_store_keeps_insertion_order() {
    let store = MemoryTripStore::new();
    store.append(record("Tokyo", "one")).await.unwrap();
    store.append(record("Kyoto", "two")).await.unwrap();

    let records = store.list().await.unwrap();
    let destinations: Vec<&str> = records.iter().map(|r| r.destination.as_str()).collect();
    assert_eq!(destinations, vec!["Tokyo", "Kyoto"]);
}

#[tokio::test]
async fn test_jsonl_store_round_trips_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlTripStore::new(dir.path().join("trips.jsonl"));

    let first = record("Seoul", "Day 1\nMorning: palace");
    let second = record("Paris", "Day 1");
    store.append(first.clone()).await.unwrap();
    store.append(second.clone()).await.unwrap();

    let records = store.list().await.unwrap();
    assert_eq!(records, vec![first, second]);
}

#[tokio::test]
async fn test_jsonl_store_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlTripStore::new(dir.path().join("absent.jsonl"));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_jsonl_store_skips_corrupt_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trips.jsonl");
    let store = JsonlTripStore::new(&path);
    store.append(record("Taipei", "ok")).await.unwrap();

    let mut contents = std::fs::read_to_string(&path).unwrap();
    contents.push_str("{not a record\n");
    std::fs::write(&path, contents).unwrap();
    store.append(record("Kyoto", "also ok")).await.unwrap();

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].destination, "Kyoto");
}
