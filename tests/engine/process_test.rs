//! Tests against real child processes, using `sh` scripts as engines.
#![cfg(unix)]

use std::time::Duration;

use chesslab_engine::config::EngineConfig;
use chesslab_engine::engine::{
    analyse_once, EngineError, EnginePool, EngineProcess, SearchRequest, UciCommand,
};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

const FEN: &str = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";

const SHELL_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "id name ShellFish"; echo "boot noise" >&2; echo "uciok" ;;
    isready) echo "readyok" ;;
    go)
      echo "info depth 1 multipv 1 score cp 13 pv f1b5 a7a6"
      echo "info depth 1 multipv 2 score mate 3 pv d2d4"
      echo "info depth 2 multipv 1 score cp 21 pv f1b5 g8f6 e1g1"
      echo "bestmove f1b5 ponder g8f6" ;;
    quit) exit 0 ;;
  esac
done
"#;

const CRASHING_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "uciok" ;;
    go) echo "info depth 1 multipv 1 score cp 1 pv e2e4"; exit 3 ;;
  esac
done
"#;

const STUBBORN_ENGINE: &str = r#"
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "uciok" ;;
    quit) sleep 5 ;;
  esac
done
"#;

fn pid_of(id: u32) -> Pid {
    Pid::from_raw(i32::try_from(id).unwrap())
}

/// Whether a process with this ID exists (reaped processes do not).
fn process_exists(id: u32) -> bool {
    kill(pid_of(id), None).is_ok()
}

fn shell_config(script: &str) -> EngineConfig {
    EngineConfig {
        binary: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        handshake_timeout_ms: 2_000,
        read_timeout_ms: 2_000,
        shutdown_grace_ms: 500,
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn start_search_and_shutdown() {
    let mut engine = EngineProcess::start(&shell_config(SHELL_ENGINE))
        .await
        .unwrap();
    assert!(engine.id().is_some());
    assert!(engine.is_alive());

    let results = engine
        .search(&SearchRequest::new(FEN).depth(2).multipv(2))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let best = results.best().unwrap();
    assert_eq!(best.depth, Some(2));
    assert_eq!(best.score_cp(), Some(21));
    assert_eq!(best.pv, vec!["f1b5", "g8f6", "e1g1"]);
    assert_eq!(results.get(2).unwrap().score_mate(), Some(3));

    engine.shutdown().await.unwrap();
    engine.shutdown().await.unwrap();
    assert!(!engine.is_alive());
    assert!(matches!(
        engine.send(&UciCommand::IsReady).await,
        Err(EngineError::StreamClosed)
    ));
}

#[tokio::test]
async fn analyse_once_returns_results() {
    let config = shell_config(SHELL_ENGINE);
    let results = analyse_once(&config, &SearchRequest::new(FEN).multipv(2))
        .await
        .unwrap();
    assert_eq!(results.best().unwrap().bestmove(), Some("f1b5"));
}

#[tokio::test]
async fn pool_with_process_launcher() {
    let pool = EnginePool::new(shell_config(SHELL_ENGINE));

    let first = pool.analyse(FEN, Some(2), 2).await.unwrap();
    let second = pool.analyse(FEN, None, 2).await.unwrap();
    assert_eq!(first, second);
    assert!(pool.is_running().await);

    pool.shutdown().await.unwrap();
    assert!(!pool.is_running().await);
}

#[tokio::test]
async fn handshake_timeout_returns_no_handle() {
    // `cat` echoes `uci` back but never says `uciok`.
    let config = EngineConfig {
        binary: "cat".to_string(),
        handshake_timeout_ms: 300,
        shutdown_grace_ms: 200,
        ..EngineConfig::default()
    };

    let result = EngineProcess::start(&config).await;
    assert!(matches!(
        result,
        Err(EngineError::Timeout { ref waiting_for, .. }) if waiting_for == "uciok"
    ));

    let pool = EnginePool::new(config);
    assert!(pool.analyse(FEN, Some(1), 1).await.is_err());
    assert!(!pool.is_running().await);
}

#[tokio::test]
async fn engine_crash_mid_search_is_exited() {
    let pool = EnginePool::new(shell_config(CRASHING_ENGINE));

    let result = pool.analyse(FEN, Some(1), 1).await;
    assert!(matches!(result, Err(EngineError::Exited)));
    assert!(!pool.is_running().await);
}

#[tokio::test]
async fn terminate_stops_engine_that_ignores_quit() {
    let mut engine = EngineProcess::start(&shell_config(STUBBORN_ENGINE))
        .await
        .unwrap();

    engine.shutdown().await.unwrap();
    engine.terminate(Duration::from_millis(200)).await.unwrap();
    assert!(engine.id().is_none());
}

#[tokio::test]
async fn pool_shutdown_leaves_engine_that_ignores_quit_running() {
    let pool = EnginePool::new(shell_config(STUBBORN_ENGINE));
    pool.restart().await.unwrap();
    let id = pool.engine_id().await.unwrap();

    pool.shutdown().await.unwrap();
    assert!(!pool.is_running().await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(process_exists(id), "shutdown must not kill the engine");

    kill(pid_of(id), Signal::SIGKILL).unwrap();
}

#[tokio::test]
async fn pool_restart_kills_engine_that_ignores_quit() {
    let pool = EnginePool::new(shell_config(STUBBORN_ENGINE));
    pool.restart().await.unwrap();
    let old = pool.engine_id().await.unwrap();

    pool.restart().await.unwrap();
    let new = pool.engine_id().await.unwrap();
    assert_ne!(old, new);
    assert!(!process_exists(old), "restart must kill the old engine");
    assert!(process_exists(new));

    kill(pid_of(new), Signal::SIGKILL).unwrap();
}
