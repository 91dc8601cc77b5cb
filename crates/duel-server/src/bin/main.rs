//! Duel Server Binary
//!
//! Runs the unified HTTP/WebSocket backend: authentication, matchmaking,
//! live match hosting, judging, and ghost races.

use duel_server::Server;

#[tokio::main]
async fn main() {
    duel_core::log();
    duel_core::brb();
    Server::run().await.unwrap();
}
