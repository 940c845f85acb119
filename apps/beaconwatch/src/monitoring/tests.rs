/// Integration tests for the monitoring pipeline
///
/// These tests wire real libsql stores, a mock HTTP site and a fake cache
/// into the probes and verify:
/// - Probe construction from configuration
/// - Dedup and retention against the on-disk status store
/// - One full round of every probe through the scheduler
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::database::{StatusRecord, StatusStoreImpl};
use crate::pool::LibsqlPool;
use crate::sources::{RespCache, SqlChainStore};
use crate::test_support::{create_test_pool, create_test_store};

/// Answers every connection with `+PONG`.
async fn spawn_fake_cache() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 14];
                if socket.read_exact(&mut buf).await.is_ok() {
                    let _ = socket.write_all(b"+PONG\r\n").await;
                }
            });
        }
    });
    Ok(addr)
}

/// Chain tables whose newest rows are current as of now.
async fn seed_fresh_chain(pool: &LibsqlPool, config: &Config) -> Result<()> {
    let clock = ChainClock::new(&config.chain);
    let slot = clock.time_to_slot(Utc::now()) as i64;
    let epoch = slot / config.chain.slots_per_epoch as i64;

    let conn = pool.get().await?;
    conn.execute("CREATE TABLE validators (validatorindex INTEGER, lastattestationslot INTEGER)", ())
        .await?;
    conn.execute("CREATE TABLE blocks (slot INTEGER)", ()).await?;
    conn.execute("CREATE TABLE epochs (epoch INTEGER)", ()).await?;
    conn.execute("CREATE TABLE eth1_blocks (number INTEGER, time INTEGER)", ()).await?;
    conn.execute("CREATE TABLE eth1_indexed (block_number INTEGER)", ()).await?;

    conn.execute("INSERT INTO validators VALUES (0, ?)", libsql::params![slot - 1]).await?;
    conn.execute("INSERT INTO blocks VALUES (?)", libsql::params![slot]).await?;
    conn.execute("INSERT INTO epochs VALUES (?)", libsql::params![epoch]).await?;
    conn.execute(
        "INSERT INTO eth1_blocks VALUES (21000000, ?)",
        libsql::params![Utc::now().timestamp() - 12],
    )
    .await?;
    conn.execute("INSERT INTO eth1_indexed VALUES (20999990)", ()).await?;
    Ok(())
}

fn collaborators(
    chain: Arc<SqlChainStore>,
    cache_endpoint: String,
    status_store: Arc<dyn StatusStore>,
) -> Collaborators {
    Collaborators {
        primary: chain.clone(),
        secondary: chain,
        cache: Arc::new(RespCache::new(cache_endpoint)),
        status_store,
    }
}

#[tokio::test]
async fn test_build_probes_from_default_config() -> Result<()> {
    let (status_store, _status_dir) = create_test_store().await?;
    let (chain_pool, _chain_dir) = create_test_pool("chain.db").await?;
    let config = Config::default();

    let probes = build_probes(
        &config,
        collaborators(
            Arc::new(SqlChainStore::new_from_pool(chain_pool)),
            config.cache.endpoint.clone(),
            Arc::new(status_store),
        ),
    )?;

    let names: Vec<_> = probes.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            BEACON_DATA_PROBE,
            EXECUTION_DATA_PROBE,
            CACHE_PROBE,
            API_PROBE,
            APP_PROBE,
            SERVICES_PROBE
        ]
    );
    assert!(probes.iter().all(|p| p.interval == Duration::from_secs(60)));
    Ok(())
}

#[tokio::test]
async fn test_invalid_site_url_is_fatal() -> Result<()> {
    let (status_store, _status_dir) = create_test_store().await?;
    let (chain_pool, _chain_dir) = create_test_pool("chain.db").await?;
    let mut config = Config::default();
    config.frontend.site_url = "not a url".into();

    let result = build_probes(
        &config,
        collaborators(
            Arc::new(SqlChainStore::new_from_pool(chain_pool)),
            config.cache.endpoint.clone(),
            Arc::new(status_store),
        ),
    );
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_services_probe_against_libsql() -> Result<()> {
    let (store, _dir) = create_test_store().await?;
    let store: Arc<dyn StatusStore> = Arc::new(store);
    let now = Utc::now();

    // t1 < t2 < t3 inside the window
    let t3 = now - TimeDelta::minutes(1);
    let t2 = now - TimeDelta::minutes(2);
    let t1 = now - TimeDelta::minutes(3);
    store.insert(&StatusRecord::new("A", "Stopped", t1)).await?;
    store.insert(&StatusRecord::new("B", "Running", t2)).await?;
    store.insert(&StatusRecord::new("A", "Running", t3)).await?;
    store.insert(&StatusRecord::new("A", "Running", now - TimeDelta::days(8))).await?;
    store.insert(&StatusRecord::new("B", "Running", now - TimeDelta::days(6))).await?;

    let timeout = Duration::from_secs(30);
    let check = ServicesCheck::new(
        store.clone(),
        ExpectedServices::new(["A", "B"]),
        Duration::from_secs(15 * 60),
        timeout,
        RetentionSweeper::new(store.clone(), RetentionPolicy::default(), timeout),
    );

    assert_eq!(check.check().await, Verdict::Ok);
    assert_eq!(check.check().await, Verdict::Ok);

    let survivors = store.reported_since(now - TimeDelta::days(30)).await?;
    assert_eq!(survivors.len(), 4);
    assert!(survivors.iter().all(|r| r.reported_at > now - TimeDelta::days(7)));
    Ok(())
}

#[tokio::test]
async fn test_services_check_tolerates_foreign_metadata() -> Result<()> {
    let (pool, _dir) = create_test_pool("status.db").await?;
    crate::database::initialize_database(&*pool.get().await?).await?;
    let store: Arc<dyn StatusStore> = Arc::new(StatusStoreImpl::new_from_pool(pool.clone()));

    // written by a service that does not speak JSON
    pool.get()
        .await?
        .execute(
            "INSERT INTO service_status (name, status, metadata, last_update) VALUES ('A', 'Running', 'pid=42', ?)",
            libsql::params![StatusRecord::timestamp_to_i64(Utc::now())],
        )
        .await?;

    let timeout = Duration::from_secs(30);
    let check = ServicesCheck::new(
        store.clone(),
        ExpectedServices::new(["A"]),
        Duration::from_secs(15 * 60),
        timeout,
        RetentionSweeper::new(store, RetentionPolicy::default(), timeout),
    );
    assert_eq!(check.check().await, Verdict::Ok);
    Ok(())
}

#[tokio::test]
async fn test_one_round_of_every_probe() -> Result<()> {
    let (status_store, _status_dir) = create_test_store().await?;
    let status_store: Arc<dyn StatusStore> = Arc::new(status_store);
    let (chain_pool, _chain_dir) = create_test_pool("chain.db").await?;

    let mut server = mockito::Server::new_async().await;
    let _epoch = server.mock("GET", "/api/v1/epoch/latest").with_status(200).create_async().await;
    let _dashboard =
        server.mock("POST", "/api/v1/app/dashboard").with_status(502).create_async().await;

    let mut config = Config::default();
    config.frontend.site_url = server.url();
    config.monitoring.expected_services = vec!["eth1indexer".into()];
    seed_fresh_chain(&chain_pool, &config).await?;

    status_store.insert(&StatusRecord::new("eth1indexer", "Running", Utc::now())).await?;

    let probes = build_probes(
        &config,
        collaborators(
            Arc::new(SqlChainStore::new_from_pool(chain_pool)),
            spawn_fake_cache().await?,
            status_store.clone(),
        ),
    )?;

    let token = CancellationToken::new();
    let scheduler = MonitoringScheduler::new(
        StatusReporter::new(status_store.clone(), config.database.store_timeout),
        token.clone(),
    );
    let handles = scheduler.start(probes);

    // every probe reports once right away, then sleeps for a minute
    let latest = tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            let records = status_store.reported_since(Utc::now() - TimeDelta::minutes(1)).await?;
            let states = services::latest_states(records);
            if states.len() == 7 {
                return anyhow::Ok(states);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await??;

    token.cancel();
    futures::future::join_all(handles).await;

    for probe in [BEACON_DATA_PROBE, EXECUTION_DATA_PROBE, CACHE_PROBE, API_PROBE, SERVICES_PROBE] {
        assert_eq!(latest[probe], "OK", "{probe}");
    }
    assert_eq!(latest[APP_PROBE], "error: api app endpoint returned a non 200 status: 502");
    Ok(())
}
