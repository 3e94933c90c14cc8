//! Admin control surface for the arena game server
//!
//! Talks to the server's HTTP API. Exit codes: 0 success, 2 not-found,
//! 3 conflict.

use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use uuid::Uuid;

use arena_game_server::game::map::MapId;
use arena_game_server::ws::protocol::RoomDescriptor;

#[derive(Parser)]
#[command(name = "arena-admin")]
#[command(about = "Admin CLI for the arena game server")]
#[command(version)]
struct Cli {
    /// Base URL of the server
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new room
    CreateRoom {
        #[arg(long)]
        name: String,
        /// arena, tactical or battlefield
        #[arg(long, default_value = "arena")]
        map: String,
        #[arg(long, default_value_t = 8)]
        max_players: usize,
    },
    /// End a running room
    EndRoom {
        id: Uuid,
    },
    /// List active rooms
    ListRooms,
    /// Kick a player from a room
    KickPlayer {
        room: Uuid,
        player: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let result = match cli.command {
        Commands::CreateRoom {
            name,
            map,
            max_players,
        } => create_room(&client, &cli.server, name, map, max_players).await,
        Commands::EndRoom { id } => end_room(&client, &cli.server, id).await,
        Commands::ListRooms => list_rooms(&client, &cli.server).await,
        Commands::KickPlayer { room, player } => {
            kick_player(&client, &cli.server, room, player).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Translate an HTTP status into the CLI exit contract.
fn exit_for(status: StatusCode) -> ExitCode {
    if status.is_success() {
        ExitCode::SUCCESS
    } else {
        match status {
            StatusCode::NOT_FOUND => ExitCode::from(2),
            StatusCode::CONFLICT => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        }
    }
}

async fn create_room(
    client: &reqwest::Client,
    server: &str,
    name: String,
    map: String,
    max_players: usize,
) -> anyhow::Result<ExitCode> {
    let map = MapId::from_str(&map).map_err(|e| anyhow::anyhow!(e))?;

    let resp = client
        .post(format!("{server}/rooms"))
        .json(&serde_json::json!({
            "name": name,
            "map": map,
            "maxPlayers": max_players,
        }))
        .send()
        .await?;

    let status = resp.status();
    if status.is_success() {
        let room: RoomDescriptor = resp.json().await?;
        println!("{}", room.id);
    } else {
        eprintln!("create-room failed: {}", resp.text().await?);
    }
    Ok(exit_for(status))
}

async fn end_room(client: &reqwest::Client, server: &str, id: Uuid) -> anyhow::Result<ExitCode> {
    let resp = client
        .delete(format!("{server}/rooms/{id}"))
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        eprintln!("end-room failed: {}", resp.text().await?);
    }
    Ok(exit_for(status))
}

async fn list_rooms(client: &reqwest::Client, server: &str) -> anyhow::Result<ExitCode> {
    let resp = client.get(format!("{server}/rooms")).send().await?;
    let status = resp.status();
    if !status.is_success() {
        eprintln!("list-rooms failed: {}", resp.text().await?);
        return Ok(exit_for(status));
    }

    let rooms: Vec<RoomDescriptor> = resp.json().await?;
    for room in rooms {
        println!(
            "{}  {:<24}  {:<11}  {:>2}/{:<2}  {:?}",
            room.id,
            room.name,
            room.map.as_str(),
            room.player_count,
            room.max_players,
            room.status
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn kick_player(
    client: &reqwest::Client,
    server: &str,
    room: Uuid,
    player: String,
) -> anyhow::Result<ExitCode> {
    let resp = client
        .post(format!("{server}/rooms/{room}/kick"))
        .json(&serde_json::json!({ "playerId": player }))
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        eprintln!("kick-player failed: {}", resp.text().await?);
    }
    Ok(exit_for(status))
}
