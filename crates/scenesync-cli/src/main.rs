//! Scenesync CLI
//!
//! Thin wrapper around scenesync-core for inspecting the scene type catalog
//! and watching a session's wire traffic.
//!
//! ## Usage
//!
//! ```bash
//! # List every built-in scene type
//! scenesync schema
//!
//! # Show the fields of one type
//! scenesync schema Mesh
//!
//! # Build a demo scene, open it and print every wire message
//! scenesync demo
//!
//! # Same, flushing after every write, three animation frames
//! scenesync demo --eager --frames 3
//!
//! # Load sync settings from a JSON file
//! scenesync --config sync.json demo
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scenesync_core::scene::{lights_color, make_text, plain_buffer_geometry};
use scenesync_core::{
    Envelope, FlushPolicy, ObjectGraph, SchemaRegistry, SyncConfig, TypedArray, Value,
    WireMessage,
};
use serde_json::json;
use tokio::sync::mpsc;

/// Scenesync - typed object-state sync for 3D scene widgets
#[derive(Parser)]
#[command(name = "scenesync")]
#[command(version = "0.1.0")]
#[command(about = "Scenesync - typed object-state sync for 3D scene widgets")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Sync configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Flush after every write instead of on each tick
    #[arg(long, global = true)]
    eager: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List scene types, or show the fields of one type
    Schema {
        /// Type name (e.g. Mesh)
        type_name: Option<String>,
    },

    /// Build a demo scene, open it and print the wire messages
    Demo {
        /// Animation frames to flush after the scene opens
        #[arg(short, long, default_value_t = 1)]
        frames: usize,

        /// Print observer events after the run
        #[arg(long)]
        events: bool,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

fn load_config(path: Option<&Path>, eager: bool) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config '{}'", path.display()))?;
            SyncConfig::from_json(&text)
                .with_context(|| format!("Invalid config '{}'", path.display()))?
        }
        None => SyncConfig::default(),
    };
    if eager {
        config.flush_policy = FlushPolicy::Eager;
    }
    Ok(config)
}

fn describe_default(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => format!("{:?}", s),
        Value::List(items) if items.is_empty() => "[]".to_string(),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(describe_default).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Dict(_) => "{}".to_string(),
        Value::Object(obj) => obj.label(),
        Value::Array(arr) => format!("{} {:?}", arr.dtype(), arr.shape()),
    }
}

fn show_schema(type_name: Option<&str>) -> Result<()> {
    let registry = SchemaRegistry::builtin();

    let Some(type_name) = type_name else {
        println!("Scene types ({}):", registry.len());
        for name in registry.type_names() {
            if let Some(schema) = registry.get(name) {
                println!(
                    "  {:<24} {:<32} {} fields",
                    name,
                    schema.model_name(),
                    schema.len()
                );
            }
        }
        return Ok(());
    };

    let schema = registry
        .get(type_name)
        .with_context(|| format!("Unknown type '{}'", type_name))?;

    println!("{} ({})", schema.name(), schema.model_name());
    let capabilities: Vec<String> = schema.capabilities().iter().map(|c| c.to_string()).collect();
    if !capabilities.is_empty() {
        println!("Provides: {}", capabilities.join(", "));
    }
    println!();
    for field in schema.fields() {
        let mut line = format!(
            "  {:<20} {:<36} = {}",
            field.name,
            field.kind.to_string(),
            describe_default(&field.default)
        );
        if let (Some(min), Some(max)) = (field.min, field.max) {
            line.push_str(&format!("  [{}..={}]", min, max));
        }
        if let Some(help) = field.help {
            line.push_str(&format!("  # {}", help));
        }
        println!("{}", line);
    }
    Ok(())
}

/// Print everything the peer has received so far, one header per line.
fn drain(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Result<usize> {
    let mut count = 0;
    while let Ok(envelope) = rx.try_recv() {
        println!("-> {}", envelope.message.to_json()?);
        if !envelope.buffers.is_empty() {
            let sizes: Vec<usize> = envelope.buffers.iter().map(|b| b.len()).collect();
            println!("   buffers: {:?} ({} bytes)", sizes, envelope.payload_len());
        }
        count += 1;
    }
    Ok(count)
}

fn run_demo(config: SyncConfig, frames: usize, show_events: bool) -> Result<()> {
    let graph = ObjectGraph::with_config(config);
    let mut events = graph.subscribe();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tx = Arc::new(tx);

    // Tetrahedron
    let vertices = TypedArray::from_vec(
        vec![4, 3],
        vec![
            1.0f32, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, -1.0,
        ],
    )?;
    let faces = TypedArray::from_vec(vec![4, 3], vec![0u32, 1, 2, 0, 3, 1, 0, 2, 3, 1, 3, 2])?;
    let geometry = plain_buffer_geometry(&graph, vertices, faces)?;

    let material = graph.create_with(
        "MeshLambertMaterial",
        [("color", "#3399ff"), ("side", "DoubleSide")],
    )?;
    graph.register(&material)?;

    let mesh = graph.create("Mesh")?;
    mesh.set("geometry", &geometry)?;
    mesh.set("material", &material)?;
    graph.register(&mesh)?;

    let label = make_text(&graph, "scenesync", [0.0, 1.5, 0.0], 0.5)?;

    let mut children = lights_color(&graph)?;
    children.push(mesh.clone());
    children.push(label);
    let scene = graph.create("Scene")?;
    scene.set("children", children)?;
    graph.register(&scene)?;

    let camera = graph.create_with("PerspectiveCamera", [("position", [0.0, 0.0, 5.0])])?;
    graph.register(&camera)?;

    let renderer = graph.create("Renderer")?;
    renderer.set("scene", &scene)?;
    renderer.set("camera", &camera)?;

    println!("# open");
    graph.open_tree(&renderer, tx.clone())?;
    let opened = drain(&mut rx)?;
    println!("# {} handshakes", opened);

    for frame in 1..=frames {
        println!("# frame {}", frame);
        let angle = 0.1 * frame as f64;
        mesh.set("rotation", [0.0, angle, 0.0])?;
        mesh.set("position", [0.0, 0.0, -0.1 * frame as f64])?;
        material.set("opacity", (1.0 - 0.05 * frame as f64).max(0.0))?;
        material.set("transparent", true)?;
        for (id, outcome) in graph.flush_all() {
            if let Err(err) = outcome {
                tracing::warn!(object_id = %id, error = %err, "Flush failed");
            }
        }
        drain(&mut rx)?;
    }

    // The peer orbits the camera; its update comes back in.
    let orbit = Envelope::new(WireMessage::Update {
        object_identity: camera.id().context("camera is registered")?,
        changed_fields: match json!({"position": [3.0, 0.0, 4.0]}) {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        },
        binary_attachments: Vec::new(),
    });
    let report = camera.apply(&orbit)?;
    println!("<- camera applied {:?}", report.applied);

    println!("# close");
    for obj in graph.reachable_from(&renderer).into_iter().rev() {
        obj.close("demo finished")?;
    }
    drain(&mut rx)?;

    if show_events {
        println!("# events");
        while let Ok(event) = events.try_recv() {
            println!("{:?}", event);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Schema { type_name } => show_schema(type_name.as_deref())?,

        Commands::Demo { frames, events } => {
            let config = load_config(cli.config.as_deref(), cli.eager)?;
            tracing::info!(?config, "Starting demo");
            run_demo(config, frames, events)?;
        }
    }

    Ok(())
}
