use std::sync::Arc;

use anyhow::Result;
use imgrec::Error;
use imgrec::db::{NewItem, SqliteLedger};
use imgrec::index::{SimilarityIndex, StateKind, encode_descriptor};
use rand::Rng;
use rstest::*;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    ledger: Arc<SqliteLedger>,
    index: SimilarityIndex<Arc<SqliteLedger>>,
}

#[fixture]
async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(SqliteLedger::open(dir.path().join("test.db")).await.unwrap());
    let index = SimilarityIndex::new(ledger.clone());
    Fixture { _dir: dir, ledger, index }
}

async fn add(ledger: &SqliteLedger, item: &str, filename: &str, v: &[f32]) -> Result<i64> {
    let new = NewItem { id: item, name: None, meta_text: None };
    let key = format!("{item}/{filename}");
    let (_, id) = ledger.add_image(new, filename, &key, b"", &encode_descriptor(v)).await?;
    Ok(id)
}

#[rstest]
#[tokio::test]
async fn nearest_item(#[future] fixture: Fixture) -> Result<()> {
    let f = fixture.await;
    add(&f.ledger, "A", "a.jpg", &[0.0, 0.0]).await?;
    add(&f.ledger, "B", "b.jpg", &[3.0, 4.0]).await?;
    f.index.rebuild().await?;

    let result = f.index.search(&[0.0, 1.0], 1).await?;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].item_id, "A");
    assert_eq!(result[0].distance, 1.0);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn best_image_per_item(#[future] fixture: Fixture) -> Result<()> {
    let f = fixture.await;
    add(&f.ledger, "X", "1.jpg", &[1.0, 2.0, 0.0]).await?;
    let best = add(&f.ledger, "X", "2.jpg", &[1.0, 1.0, 0.0]).await?;
    add(&f.ledger, "X", "3.jpg", &[3.0, 0.0, 0.0]).await?;
    add(&f.ledger, "Y", "1.jpg", &[1.0, 1.0, 1.0]).await?;
    f.index.rebuild().await?;

    let result = f.index.search(&[0.0, 0.0, 0.0], 2).await?;
    let pairs = result.iter().map(|m| (m.item_id.as_str(), m.distance)).collect::<Vec<_>>();
    assert_eq!(pairs, vec![("X", 2.0), ("Y", 3.0)]);
    assert_eq!(result[0].image_id, best);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn empty_ledger(#[future] fixture: Fixture) -> Result<()> {
    let f = fixture.await;
    f.index.rebuild().await?;
    assert_eq!(f.index.status().await.state, StateKind::Empty);
    for k in [1, 5, 100] {
        assert!(f.index.search(&[1.0, 2.0, 3.0], k).await?.is_empty());
    }
    Ok(())
}

#[rstest]
#[tokio::test]
async fn query_dimension_mismatch(#[future] fixture: Fixture) -> Result<()> {
    let f = fixture.await;
    add(&f.ledger, "A", "a.jpg", &vec![0.5; 2048]).await?;
    f.index.rebuild().await?;

    let err = f.index.search(&vec![0.5; 512], 3).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2048, got: 512 }));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn mixed_dimensions_keep_previous_snapshot(#[future] fixture: Fixture) -> Result<()> {
    let f = fixture.await;
    add(&f.ledger, "A", "a.jpg", &[0.0, 0.0]).await?;
    f.index.rebuild().await?;

    add(&f.ledger, "B", "b.jpg", &[0.0, 0.0, 0.0]).await?;
    assert!(matches!(f.index.rebuild().await, Err(Error::DimensionMismatch { .. })));

    let status = f.index.status().await;
    assert_eq!(status.vector_count, 1);
    assert_eq!(status.dimension, Some(2));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn deleted_item_never_returned(#[future] fixture: Fixture) -> Result<()> {
    let f = fixture.await;
    add(&f.ledger, "X", "x.jpg", &[0.0]).await?;
    add(&f.ledger, "Y", "y.jpg", &[5.0]).await?;
    f.index.rebuild().await?;

    assert_eq!(f.ledger.delete_image("X", "x.jpg").await?.as_deref(), Some("X/x.jpg"));
    f.index.rebuild().await?;

    let result = f.index.search(&[0.0], 10).await?;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].item_id, "Y");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn replacing_image_keeps_one_vector(#[future] fixture: Fixture) -> Result<()> {
    let f = fixture.await;
    let first = add(&f.ledger, "A", "a.jpg", &[0.0]).await?;
    let second = add(&f.ledger, "A", "a.jpg", &[7.0]).await?;
    assert_eq!(first, second);
    f.index.rebuild().await?;

    assert_eq!(f.index.status().await.vector_count, 1);
    assert_eq!(f.index.search(&[7.0], 1).await?[0].distance, 0.0);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn rebuild_is_idempotent(#[future] fixture: Fixture) -> Result<()> {
    let f = fixture.await;
    let mut rng = rand::rng();
    for i in 0..50 {
        let v = (0..16).map(|_| rng.random_range(-1.0..1.0)).collect::<Vec<f32>>();
        add(&f.ledger, &format!("item{}", i % 17), &format!("{i}.jpg"), &v).await?;
    }
    let query = (0..16).map(|_| rng.random_range(-1.0..1.0)).collect::<Vec<f32>>();

    f.index.rebuild().await?;
    let first = f.index.search(&query, 10).await?;
    f.index.rebuild().await?;
    let second = f.index.search(&query, 10).await?;
    assert_eq!(first, second);
    Ok(())
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(17)]
#[case(100)]
#[tokio::test]
async fn result_properties(#[future] fixture: Fixture, #[case] k: usize) -> Result<()> {
    let f = fixture.await;
    let mut rng = rand::rng();
    for i in 0..60 {
        let v = (0..8).map(|_| rng.random_range(-10.0..10.0)).collect::<Vec<f32>>();
        add(&f.ledger, &format!("item{}", i % 17), &format!("{i}.jpg"), &v).await?;
    }
    f.index.rebuild().await?;

    let query = (0..8).map(|_| rng.random_range(-10.0..10.0)).collect::<Vec<f32>>();
    let result = f.index.search(&query, k).await?;
    assert_eq!(result.len(), k.min(17));
    assert!(result.windows(2).all(|w| w[0].distance <= w[1].distance));

    let mut ids = result.iter().map(|m| m.item_id.as_str()).collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), result.len());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn concurrent_rebuilds_and_queries(#[future] fixture: Fixture) -> Result<()> {
    let f = fixture.await;
    for i in 0..20 {
        add(&f.ledger, &format!("item{i}"), "a.jpg", &[i as f32, 0.0]).await?;
    }
    f.index.rebuild().await?;

    let index = Arc::new(f.index);
    let mut tasks = vec![];
    for i in 0..8 {
        let index = index.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                index.rebuild().await.map(|_| ())
            } else {
                index.search(&[3.0, 0.0], 5).await.map(|r| assert_eq!(r[0].item_id, "item3"))
            }
        }));
    }
    for t in tasks {
        t.await??;
    }
    assert_eq!(index.status().await.vector_count, 20);
    Ok(())
}
