// rookery_server — authoritative game server for Rookery.
//
// Clients connect over TCP, attach to games as players or observers, and
// send commands (CONNECT, MAKE_MOVE, LEAVE, RESIGN). The server validates
// every move with `rookery_rules`, stores the result in the game directory,
// and broadcasts snapshots and notifications to each game's audience.
//
// Module overview:
// - `config.rs`:     `ServerConfig` (JSON file + defaults) and `provision()`,
//                    which seeds accounts and games at startup.
// - `identity.rs`:   `IdentityService` (auth token → username) and its
//                    in-memory implementation.
// - `directory.rs`:  `GameDirectory` (load/store game records) and
//                    `MemoryGameDirectory`, which assigns IDs from 1.
// - `registry.rs`:   `SessionRegistry`, the per-game audience of live
//                    connections, and `ConnectionId`.
// - `outbox.rs`:     `Outbox` delivery seam: `TcpOutbox` for sockets,
//                    `MemoryOutbox` for tests.
// - `error.rs`:      `CommandError`, the reasons a command is refused.
// - `dispatcher.rs`: `Dispatcher`, the per-command logic and message texts.
// - `worker.rs`:     `GameWorkers`, one serialized worker thread per active
//                    game.
// - `server.rs`:     TCP listener and per-connection reader threads.
// - `client.rs`:     `NetClient`, a small blocking client used by tests.
//
// The server can run as a standalone binary (`main.rs`) or be embedded via
// the library API (`start_server`).

pub mod client;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod outbox;
pub mod registry;
pub mod server;
pub mod worker;

pub use config::{ServerConfig, provision};
pub use directory::{DirectoryError, GameDirectory, MemoryGameDirectory};
pub use dispatcher::Dispatcher;
pub use error::CommandError;
pub use identity::{IdentityService, MemoryIdentityService};
pub use registry::{ConnectionId, SessionRegistry};
pub use server::{ServerHandle, Services, start_server};
