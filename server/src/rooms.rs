//! Registry of live rooms. Each room runs in its own task; the registry only
//! holds the channels to reach it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};

use crate::config::ServerConfig;
use crate::game_loop::{run_room_loop, RoomBroadcast, RoomCommand};
use crate::room::{now_ms, Room};

const ROOM_ID_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";
const ROOM_ID_LEN: usize = 6;

#[derive(Clone)]
pub struct RoomHandle {
    pub cmd_tx: mpsc::Sender<RoomCommand>,
    pub broadcast_tx: broadcast::Sender<RoomBroadcast>,
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("Room limit of {0} reached")]
    TooManyRooms(usize),
}

pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, RoomHandle>>,
    rng: Mutex<ChaCha8Rng>,
    config: ServerConfig,
}

impl RoomRegistry {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let seed = config.rng_seed.unwrap_or_else(rand::random);
        Arc::new(Self {
            rooms: Mutex::new(HashMap::new()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            config,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Create a room and spawn its loop. Must be called inside a tokio runtime.
    pub fn create_room(self: &Arc<Self>) -> Result<String, RegistryError> {
        let mut rooms = self.rooms.lock();
        if rooms.len() >= self.config.max_rooms {
            return Err(RegistryError::TooManyRooms(self.config.max_rooms));
        }
        let room_id = loop {
            let candidate = self.generate_room_id();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::channel::<RoomCommand>(256);
        let (broadcast_tx, _) = broadcast::channel::<RoomBroadcast>(64);
        rooms.insert(
            room_id.clone(),
            RoomHandle {
                cmd_tx,
                broadcast_tx: broadcast_tx.clone(),
            },
        );
        drop(rooms);

        let room = Room::new(room_id.clone(), &self.config, now_ms());
        let config = self.config.clone();
        let registry = Arc::clone(self);
        let id = room_id.clone();
        tokio::spawn(async move {
            run_room_loop(room, cmd_rx, broadcast_tx, config).await;
            registry.remove(&id);
        });

        tracing::info!(room = %room_id, "room created");
        Ok(room_id)
    }

    pub fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.lock().get(room_id).cloned()
    }

    pub fn remove(&self, room_id: &str) {
        if self.rooms.lock().remove(room_id).is_some() {
            tracing::info!(room = %room_id, "room removed");
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn generate_room_id(&self) -> String {
        let mut rng = self.rng.lock();
        (0..ROOM_ID_LEN)
            .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
            .collect()
    }
}
