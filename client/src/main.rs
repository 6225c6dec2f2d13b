use std::time::{Duration, Instant};

use pool_client::bot::{BotAction, ClientBot};
use pool_client::config::ClientConfig;
use pool_client::connection::{ConnectionState, NetEvent, ServerConnection};
use pool_client::game::NetworkGame;
use pool_client::offline::OfflineGame;
use pool_shared::events::GameEvent;
use pool_shared::shot::ShotIntentResolver;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Offline games are simulated flat out; this caps a runaway one.
const MAX_OFFLINE_TICKS: u64 = 60 * 60 * 30;

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("Invalid client configuration: {}", e);
        std::process::exit(1);
    }

    if config.offline {
        run_offline(&config);
    } else {
        run_networked(&config);
    }
}

fn log_events(events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::BallPocketed { ball, pocket } => {
                tracing::info!(%ball, pocket, "ball pocketed")
            }
            GameEvent::GameOver { winner, reason, .. } => {
                tracing::info!(winner, ?reason, "game over")
            }
            GameEvent::Foul | GameEvent::PassTurn | GameEvent::BallInHand => {
                tracing::info!(?event, "rule event")
            }
            _ => tracing::debug!(?event, "game event"),
        }
    }
}

/// Two bots play hot-seat until the game ends.
fn run_offline(config: &ClientConfig) {
    let dt = 1.0 / config.tick_rate_hz as f32;
    let mut game = OfflineGame::new(config.physics, config.rules, config.shot);
    let mut bots = [ClientBot::with_seed(1), ClientBot::with_seed(2)];

    for _ in 0..MAX_OFFLINE_TICKS {
        let events = game.tick(dt);
        log_events(&events);
        if game.state().game_over {
            tracing::info!(winner = ?game.state().winner, "offline game finished");
            return;
        }

        let slot = game.current_slot();
        let Some(bot) = bots.get_mut(slot as usize) else {
            continue;
        };
        match bot.update(dt, game.state(), slot, game.resolver()) {
            Some(BotAction::PlaceCueBall(pos)) => {
                if let Err(e) = game.place_cue_ball(pos) {
                    tracing::warn!(slot, "bot placement refused: {}", e);
                }
            }
            Some(BotAction::Shoot(cmd)) => {
                if let Err(e) = game.shoot(&cmd) {
                    tracing::warn!(slot, "bot shot refused: {}", e);
                }
            }
            None => {}
        }
    }
    tracing::warn!("offline game did not finish");
}

/// Join the configured room and let the bot play our seat.
fn run_networked(config: &ClientConfig) {
    let url = match config.room_url() {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Invalid room url: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Connecting to {}", url);

    let tick = Duration::from_secs_f64(1.0 / config.tick_rate_hz as f64);
    let dt = tick.as_secs_f32();
    let mut conn = ServerConnection::new(url);
    let mut game = NetworkGame::new(config.physics);
    let resolver = ShotIntentResolver::new(config.shot);
    let mut bot = ClientBot::default();

    loop {
        let frame_start = Instant::now();

        for event in conn.poll_events() {
            match event {
                NetEvent::Message(msg) => log_events(&game.handle_message(msg)),
                NetEvent::Connected => tracing::info!("connected"),
                NetEvent::Disconnected => {
                    bot.reset();
                    tracing::debug!("disconnected")
                }
                NetEvent::ProtocolMismatch { server, client } => {
                    tracing::error!(server, client, "protocol version mismatch");
                }
                NetEvent::Rejected { status } => {
                    tracing::error!(status, "server refused to seat us");
                }
            }
        }
        if conn.state == ConnectionState::Rejected {
            std::process::exit(2);
        }

        log_events(&game.tick(dt));

        if let Some(slot) = game.slot() {
            match bot.update(dt, game.state(), slot, &resolver) {
                Some(BotAction::PlaceCueBall(pos)) => match game.place_cue_ball(pos) {
                    Ok(msg) => conn.send(msg),
                    Err(e) => tracing::debug!("placement not sent: {}", e),
                },
                Some(BotAction::Shoot(cmd)) => match game.try_shoot(&cmd) {
                    Ok(msg) => conn.send(msg),
                    Err(e) => tracing::debug!("shot not sent: {}", e),
                },
                None => {}
            }
        }

        if let Some(rest) = tick.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
