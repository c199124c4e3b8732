use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use shared::{ClientMessage, Position, ServerEvent};
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

/// Scripted bot that joins the arena, wanders around and attacks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
    url: String,

    /// Address to announce via X-Forwarded-For
    #[arg(long)]
    forwarded_for: Option<String>,

    /// Character to select
    #[arg(short, long, default_value = "knight")]
    character: String,

    /// Number of actions to send before disconnecting
    #[arg(short = 'n', long, default_value = "20")]
    actions: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut request = args.url.as_str().into_client_request()?;
    if let Some(ip) = &args.forwarded_for {
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_str(ip)?);
    }

    let (ws_stream, _) = connect_async(request).await?;
    println!("Connected to {}", args.url);
    let (mut write, mut read) = ws_stream.split();

    // Print everything the server broadcasts
    let reader = tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => match ServerEvent::from_json(&text) {
                    Ok(ServerEvent::Init { id, players, arena }) => println!(
                        "Joined as {} with {} players in {}x{} arena",
                        id,
                        players.len(),
                        arena.width,
                        arena.height
                    ),
                    Ok(event) => println!("Event: {:?}", event),
                    Err(e) => println!("Unparseable event {}: {}", text, e),
                },
                Ok(Message::Close(frame)) => {
                    println!("Server closed connection: {:?}", frame);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    println!("Connection error: {}", e);
                    break;
                }
            }
        }
    });

    let select = ClientMessage::Select {
        character: serde_json::Value::String(args.character.clone()),
    };
    write.send(Message::Text(select.to_json()?)).await?;

    for i in 0..args.actions {
        let action = {
            let mut rng = rand::thread_rng();
            match i % 4 {
                0 | 1 => ClientMessage::Move {
                    position: Position::new(rng.gen_range(0.0..1200.0), rng.gen_range(0.0..800.0)),
                },
                2 => ClientMessage::Attack,
                _ => ClientMessage::Heal,
            }
        };
        write.send(Message::Text(action.to_json()?)).await?;
        sleep(Duration::from_millis(250)).await;
    }

    write.send(Message::Close(None)).await?;
    let _ = tokio::time::timeout(Duration::from_secs(2), reader).await;
    println!("Done");

    Ok(())
}
