mod tcp;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cluster_common::{DVec2, unix_now};
use cluster_kernel::{GeneratorConfig, generate_system};
use cluster_partition::ViewportPartitioner;
use cluster_persist::{EntityStore, MemoryBackend, SnapshotDir};
use cluster_server::{Engine, ServerConfig, handle_session};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::tcp::TcpSession;

#[derive(Parser)]
#[command(name = "cluster-cli", about = "CLI tool for the cluster game server")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and effective configuration
    Info,
    /// Print the home system a player id generates
    Generate {
        /// Player id to hash
        #[arg(short, long)]
        player: String,
        /// Sun x coordinate
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        x: f64,
        /// Sun y coordinate
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        y: f64,
    },
    /// Partition a viewport over a demo world of generated systems
    Voronoi {
        /// Number of systems to generate
        #[arg(short, long, default_value = "4")]
        systems: usize,
        /// Viewport width
        #[arg(long, default_value = "40000")]
        width: f64,
        /// Viewport height
        #[arg(long, default_value = "40000")]
        height: f64,
    },
    /// Accept viewers over newline-delimited JSON on TCP
    Serve {
        /// Listen address, overrides the configuration
        #[arg(short, long)]
        listen: Option<String>,
        /// Snapshot directory, overrides the configuration
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ServerConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("cluster-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "generator: {} planets per system, solar radius {}",
                config.generator.planet_count, config.generator.solar_system_radius
            );
            println!("partition: site margin {}", config.partition.site_margin);
            println!(
                "server: listen {}, mission speed {}, data dir {}",
                config.listen,
                config.mission_speed,
                config
                    .data_dir
                    .as_ref()
                    .map_or("<none>".to_string(), |d| d.display().to_string())
            );
        }
        Commands::Generate { player, x, y } => {
            let system = generate_system(&player, DVec2::new(x, y), &config.generator, unix_now())?;
            println!("sun: {} (home planet #{})", system.sun.key(), system.home_index);
            for planet in &system.planets {
                println!(
                    "  {:<24} size={:<2} texture={} home={}",
                    planet.key(),
                    planet.size,
                    planet.texture,
                    planet.is_home
                );
            }
        }
        Commands::Voronoi {
            systems,
            width,
            height,
        } => {
            let store = EntityStore::open(MemoryBackend::new());
            demo_world(&store, systems, &config.generator)?;
            let partitioner = ViewportPartitioner::new(config.partition.clone());
            let polygons =
                partitioner.partition(&store, DVec2::ZERO, DVec2::new(width, height))?;
            println!("{}", serde_json::to_string_pretty(&polygons)?);
        }
        Commands::Serve { listen, data_dir } => {
            let mut config = config;
            if let Some(listen) = listen {
                config.listen = listen;
            }
            if data_dir.is_some() {
                config.data_dir = data_dir;
            }
            serve(config).await?;
        }
    }

    Ok(())
}

/// Systems laid out on a grid around the origin, each owned by its player.
fn demo_world(
    store: &EntityStore,
    systems: usize,
    generator: &GeneratorConfig,
) -> anyhow::Result<()> {
    let side = (systems as f64).sqrt().ceil().max(1.0) as usize;
    let spacing = 2.0 * generator.solar_system_radius;
    let offset = (side as f64 - 1.0) * spacing / 2.0;
    let now = unix_now();
    for i in 0..systems {
        let username = format!("player{i}");
        let sun = DVec2::new(
            (i % side) as f64 * spacing - offset,
            (i / side) as f64 * spacing - offset,
        );
        let mut system = generate_system(&username, sun, generator, now)?;
        system.home_planet_mut().set_owner(Some(username), now);
        store.save(&system.sun.clone().into())?;
        for planet in system.planets {
            store.save(&planet.into())?;
        }
    }
    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::new(
        EntityStore::open(MemoryBackend::new()),
        config.clone(),
    ));

    let mut snapshots = match &config.data_dir {
        Some(dir) => {
            let snapshots = SnapshotDir::open(dir)
                .with_context(|| format!("opening snapshot dir {}", dir.display()))?;
            let restored = engine.restore_snapshot(&snapshots)?;
            tracing::info!(restored, "world restored");
            Some(snapshots)
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!(addr = %config.listen, "listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "connection accepted");
                    let session = Arc::new(TcpSession::new(stream, peer));
                    tokio::spawn(handle_session(engine.clone(), session));
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    if let Some(snapshots) = snapshots.as_mut() {
        engine.write_snapshot(snapshots)?;
    }
    engine.close();
    Ok(())
}
