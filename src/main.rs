#![cfg_attr(not(test), deny(clippy::panic))]

use anyhow::Context;
use clap::Parser;
use htttp_peer::config;
use htttp_peer::events::PlayerEvents;
use htttp_peer::logging;
use htttp_peer::peer::GamePeer;
use htttp_peer::protocol::{GameState, PlayerId, Tile};
use htttp_peer::spectator::{Spectator, SpectatorEvents};
use htttp_peer::transport::MemoryBroker;
use std::sync::Arc;
use std::time::Duration;

/// HTTTP peer -- peer-to-peer coordination core for the four-robot maze game
#[derive(Parser, Debug)]
#[command(name = "htttp-peer")]
#[command(about = "Plays a scripted four-robot game over the in-memory broker")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,

    /// Player ids for the demo party (comma separated, party-size many).
    #[arg(long, value_delimiter = ',', default_value = "anna,bert,cleo,dana")]
    players: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Arc::new(config::load());

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&*cfg)?);
        return Ok(());
    }

    let validation = config::validate(&cfg);
    if cli.validate_config {
        match validation {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Game id: {}", cfg.game.game_id);
                println!("  Party size: {}", cfg.game.party_size);
                println!("  Request lifetime: {} ms", cfg.game.request_lifetime_ms);
                println!("  Heartbeat: every {} ms, missing after {} ms",
                    cfg.game.heartbeat_frequency_ms, cfg.game.heartbeat_lifetime_ms);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }
    validation.map_err(|e| anyhow::anyhow!(e))?;

    logging::init_with_config(&cfg.logging);

    if cli.players.len() != cfg.game.party_size {
        anyhow::bail!(
            "need exactly {} player ids, got {}",
            cfg.game.party_size,
            cli.players.len()
        );
    }

    tracing::info!(game_id = %cfg.game.game_id, "starting scripted demo game");
    let broker = MemoryBroker::new();

    let spectator = Spectator::connect(
        Arc::new(broker.endpoint()),
        SpectatorEvents::new()
            .on_player_joined(|id| tracing::info!(%id, "[spectator] player joined"))
            .on_player_disconnected(|id, reason| {
                tracing::info!(%id, %reason, "[spectator] player disconnected");
            })
            .on_game_started(|| tracing::info!("[spectator] game started"))
            .on_game_paused(|| tracing::info!("[spectator] game paused"))
            .on_game_stopped(|| tracing::info!("[spectator] game stopped"))
            .on_seesaw_locked(|number, barcode| {
                tracing::info!(number, barcode, "[spectator] seesaw locked");
            })
            .on_seesaw_unlocked(|number, barcode| {
                tracing::info!(number, barcode, "[spectator] seesaw unlocked");
            })
            .on_player_position(|id, _, x, y, angle, _| {
                tracing::info!(%id, x, y, angle, "[spectator] position");
            })
            .on_game_won(|team| tracing::info!(team, "[spectator] team won")),
    )
    .await
    .context("spectator failed to connect")?;

    let mut peers = Vec::new();
    for name in &cli.players {
        let handlers = PlayerEvents::new()
            .on_game_rolled({
                let name = name.clone();
                move |number, object| {
                    tracing::info!(player = %name, number, object, "rolled");
                }
            })
            .on_team_connected({
                let name = name.clone();
                move |partner| tracing::info!(player = %name, %partner, "team connected")
            });
        let peer = GamePeer::new(
            cfg.game.clone(),
            Arc::new(broker.endpoint()),
            PlayerId::new(name.clone()),
            handlers,
        );
        peer.join().await.with_context(|| format!("{name} failed to join"))?;
        peers.push(peer);
    }

    // Everyone must see the full lobby before the ready flags go out.
    let party_size = cfg.game.party_size;
    wait_for("full lobby on every peer", || {
        let peers = peers.clone();
        async move {
            for peer in &peers {
                if peer.players().await.len() != party_size {
                    return false;
                }
            }
            true
        }
    })
    .await?;

    for peer in &peers {
        peer.set_ready(true).await?;
    }

    wait_for("player numbers agreed and everyone ready", || {
        let peers = peers.clone();
        async move {
            for peer in &peers {
                if peer.game_state().await != GameState::Starting {
                    return false;
                }
                if !peer.party().await.iter().all(|p| p.is_ready) {
                    return false;
                }
            }
            true
        }
    })
    .await?;

    peers[0].start().await?;
    wait_for("everyone playing", || {
        let peers = peers.clone();
        async move {
            for peer in &peers {
                if peer.game_state().await != GameState::Playing {
                    return false;
                }
            }
            true
        }
    })
    .await?;

    // A lap of activity: positions, team channels, the seesaw, a find.
    for (index, peer) in peers.iter().enumerate() {
        peer.update_position(index as f64, 0.5, 90.0).await?;
        peer.join_team((index / 2) as i32).await?;
    }
    peers[0].lock_seesaw(17).await?;
    peers[0].unlock_seesaw().await?;
    peers[0].found_object().await?;
    peers[0].send_tiles(vec![Tile(0, 0, 3), Tile(1, 0, 5)]).await?;

    wait_for("partners connected", || {
        let peers = peers.clone();
        async move {
            for peer in &peers {
                if peer.partner().await.is_none() {
                    return false;
                }
            }
            true
        }
    })
    .await?;

    peers[0].win().await?;
    wait_for("back in the lobby", || {
        let peers = peers.clone();
        async move {
            for peer in &peers {
                // With the lobby still full, the next roll begins at
                // once, so the rest state after a stop is STARTING.
                if !matches!(
                    peer.game_state().await,
                    GameState::Waiting | GameState::Starting
                ) {
                    return false;
                }
            }
            true
        }
    })
    .await?;

    for peer in &peers {
        peer.leave().await?;
    }
    spectator.leave().await;
    tracing::info!("demo finished");
    Ok(())
}

/// Polls `check` until it holds or a generous deadline passes.
async fn wait_for<F, Fut>(what: &str, mut check: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if check().await {
            return Ok(());
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
