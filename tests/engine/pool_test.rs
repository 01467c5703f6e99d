//! Tests for the shared engine pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chesslab_engine::config::EngineConfig;
use chesslab_engine::engine::{EngineError, EngineLauncher, EnginePool, EngineProcess};

use super::{fast_timeouts, scripted_engine, uci_responder};

/// Launches engines that tag every move with the position they were given.
#[derive(Default)]
struct TaggingLauncher {
    launches: Arc<AtomicUsize>,
    /// Launch numbers (0-based) whose engine hangs up on `go`.
    crash_on: Vec<usize>,
}

fn tagging_responder(crash: bool) -> impl FnMut(&str) -> Option<Vec<String>> + Send + 'static {
    let mut handshake = uci_responder(&[]);
    let mut tag = String::new();
    move |command: &str| {
        if let Some(fen) = command.strip_prefix("position fen ") {
            tag = fen.to_string();
            return Some(Vec::new());
        }
        if command.starts_with("go") {
            if crash {
                return None;
            }
            return Some(vec![
                format!("info depth 1 multipv 1 score cp 10 pv {tag}-a1 {tag}-a2"),
                format!("info depth 1 multipv 2 score cp 5 pv {tag}-b1"),
                "info string thinking".to_string(),
                format!("info depth 2 multipv 1 score cp 12 pv {tag}-a1 {tag}-a3"),
                format!("bestmove {tag}-a1"),
            ]);
        }
        handshake(command)
    }
}

#[async_trait]
impl EngineLauncher for TaggingLauncher {
    async fn launch(&self) -> Result<EngineProcess, EngineError> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst);
        let mut engine = scripted_engine(tagging_responder(self.crash_on.contains(&n)), fast_timeouts());
        engine.handshake().await?;
        Ok(engine)
    }
}

/// Launches engines that record every command they receive.
#[derive(Default)]
struct RecordingLauncher {
    commands: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EngineLauncher for RecordingLauncher {
    async fn launch(&self) -> Result<EngineProcess, EngineError> {
        let commands = Arc::clone(&self.commands);
        let mut respond = uci_responder(&["bestmove e2e4"]);
        let mut engine = scripted_engine(
            move |command: &str| {
                commands.lock().unwrap().push(command.to_string());
                respond(command)
            },
            fast_timeouts(),
        );
        engine.handshake().await?;
        Ok(engine)
    }
}

/// Launcher that always fails.
struct MissingLauncher;

#[async_trait]
impl EngineLauncher for MissingLauncher {
    async fn launch(&self) -> Result<EngineProcess, EngineError> {
        Err(EngineError::NotFound {
            binary: "nowhere".to_string(),
        })
    }
}

#[tokio::test]
async fn pool_launches_lazily_and_once() {
    let launcher = TaggingLauncher::default();
    let launches = Arc::clone(&launcher.launches);
    let pool = EnginePool::with_launcher(launcher);

    assert!(!pool.is_running().await);
    assert_eq!(launches.load(Ordering::SeqCst), 0);

    for _ in 0..3 {
        let results = pool.analyse("tag", Some(2), 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    assert!(pool.is_running().await);
    assert_eq!(launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pool_result_reflects_latest_updates() {
    let pool = EnginePool::with_launcher(TaggingLauncher::default());

    let results = pool.analyse("x", None, 2).await.unwrap();

    let best = results.best().unwrap();
    assert_eq!(best.depth, Some(2));
    assert_eq!(best.score_cp(), Some(12));
    assert_eq!(best.pv, vec!["x-a1", "x-a3"]);
    assert_eq!(results.get(2).unwrap().bestmove(), Some("x-b1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_searches_never_interleave() {
    let launcher = TaggingLauncher::default();
    let launches = Arc::clone(&launcher.launches);
    let pool = Arc::new(EnginePool::with_launcher(launcher));

    let mut handles = Vec::new();
    for i in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            let tag = format!("job{i}");
            let results = pool.analyse(&tag, Some(3), 2).await.unwrap();
            (tag, results)
        }));
    }

    for handle in handles {
        let (tag, results) = handle.await.unwrap();
        assert_eq!(results.len(), 2, "{tag} should have two lines");
        for line in &results {
            assert!(!line.pv.is_empty());
            for mv in &line.pv {
                assert!(
                    mv.starts_with(&format!("{tag}-")),
                    "{tag} received foreign move {mv}"
                );
            }
        }
    }

    assert_eq!(launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pool_discards_engine_after_fatal_error() {
    let launcher = TaggingLauncher {
        crash_on: vec![0],
        ..TaggingLauncher::default()
    };
    let launches = Arc::clone(&launcher.launches);
    let pool = EnginePool::with_launcher(launcher);

    let first = pool.analyse("a", Some(1), 1).await;
    assert!(matches!(first, Err(EngineError::Exited)));
    assert!(!pool.is_running().await);

    let second = pool.analyse("b", Some(1), 1).await.unwrap();
    assert_eq!(second.best().unwrap().bestmove(), Some("b-a1"));
    assert_eq!(launches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pool_uses_configured_default_depth() {
    let launcher = RecordingLauncher::default();
    let commands = Arc::clone(&launcher.commands);
    let config = EngineConfig {
        default_depth: 18,
        ..EngineConfig::default()
    };
    let pool = EnginePool::with_launcher(launcher).with_config(config);

    pool.analyse("fen", None, 2).await.unwrap();
    pool.analyse("fen", Some(4), 2).await.unwrap();

    let go: Vec<String> = commands
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.starts_with("go"))
        .cloned()
        .collect();
    assert_eq!(go, vec!["go depth 18", "go depth 4"]);
}

#[tokio::test]
async fn pool_launch_failure_is_propagated() {
    let pool = EnginePool::with_launcher(MissingLauncher);

    let result = pool.analyse("fen", None, 3).await;
    assert!(matches!(result, Err(EngineError::NotFound { .. })));
    assert!(!pool.is_running().await);
}

#[tokio::test]
async fn pool_shutdown_is_idempotent_and_relaunches() {
    let launcher = TaggingLauncher::default();
    let launches = Arc::clone(&launcher.launches);
    let pool = EnginePool::with_launcher(launcher);

    pool.shutdown().await.unwrap();
    pool.analyse("a", None, 1).await.unwrap();
    pool.shutdown().await.unwrap();
    pool.shutdown().await.unwrap();
    assert!(!pool.is_running().await);

    pool.analyse("b", None, 1).await.unwrap();
    assert_eq!(launches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pool_restart_replaces_engine() {
    let launcher = TaggingLauncher::default();
    let launches = Arc::clone(&launcher.launches);
    let pool = EnginePool::with_launcher(launcher);

    pool.restart().await.unwrap();
    assert!(pool.is_running().await);
    pool.restart().await.unwrap();
    pool.analyse("c", None, 1).await.unwrap();

    assert_eq!(launches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pool_with_missing_binary_fails_not_found() {
    let config = EngineConfig {
        binary: "chesslab-definitely-missing-engine".to_string(),
        ..EngineConfig::default()
    };
    let pool = EnginePool::new(config);

    let result = pool.analyse("fen", Some(1), 1).await;
    assert!(matches!(
        result,
        Err(EngineError::NotFound { ref binary }) if binary == "chesslab-definitely-missing-engine"
    ));
}
