//! `takeoff-xdata`: inspect and maintain takeoff metadata in drawing snapshots.

mod logging;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use attrstore::{
    document, ElevationDefinition, EntityAttributeStore, Json, Reconciler, StoreConfig, WorkPoint,
    ELEVATIONS_KEY, WORK_POINT_KEY,
};
use clap::{Parser, Subcommand};
use docfile::{SnapshotReader, SnapshotWriter};
use slotstore::{EntityId, Host};
use tracing::{debug, info};

use crate::logging::{init_logging, LogConfig, LogFormat};

#[derive(Parser)]
#[command(name = "takeoff-xdata", version, about = "Takeoff metadata maintenance tool")]
struct Cli {
    /// Drawing snapshot to operate on
    #[arg(long, short, value_name = "PATH", env = "TAKEOFF_DRAWING")]
    drawing: PathBuf,

    /// TOML file with store settings
    #[arg(long, value_name = "PATH", env = "TAKEOFF_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter; RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-chunk every component's part list under the configured chunk size
    Reconcile(ReconcileArgs),
    /// Print the part list of one entity
    Parts(PartsArgs),
    /// Print the drawing's work point
    WorkPoint,
    /// Replace the drawing's work point
    SetWorkPoint(SetWorkPointArgs),
    /// Print the drawing's elevation definitions
    Elevations,
}

#[derive(Parser)]
struct ReconcileArgs {
    /// Target chunk size in characters (overrides the config file)
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Maximum chunk count per record (overrides the config file)
    #[arg(long)]
    ceiling: Option<usize>,
    /// Run the pass but do not write the snapshot back
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser)]
struct PartsArgs {
    /// Entity handle, hexadecimal
    #[arg(value_parser = parse_handle)]
    handle: EntityId,
}

#[derive(Parser)]
struct SetWorkPointArgs {
    #[arg(allow_negative_numbers = true)]
    x: f64,
    #[arg(allow_negative_numbers = true)]
    y: f64,
    #[arg(allow_negative_numbers = true)]
    z: f64,
}

fn parse_handle(s: &str) -> Result<EntityId, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16)
        .map(EntityId)
        .map_err(|e| format!("invalid handle {s:?}: {e}"))
}

fn load_config(path: Option<&Path>) -> Result<StoreConfig> {
    match path {
        Some(path) => StoreConfig::load(path).context("failed to load store config"),
        None => Ok(StoreConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig {
        level: cli.log_level.clone(),
        format: cli.log_format,
    })?;

    let mut cfg = load_config(cli.config.as_deref())?;
    let mut dwg = SnapshotReader::read_drawing(&cli.drawing)?;
    debug!(
        drawing = %cli.drawing.display(),
        entities = dwg.entities().count(),
        slots = dwg.slot_count(),
        "loaded drawing"
    );

    match cli.command {
        Commands::Reconcile(args) => {
            if let Some(size) = args.chunk_size {
                cfg.chunk_size = size;
            }
            if let Some(ceiling) = args.ceiling {
                cfg.ceiling = ceiling;
            }
            // the drawing's own slot limit is the one that applies
            cfg.slot_capacity = dwg.slot_capacity();

            let pass = Reconciler::from_config(&cfg).context("invalid store settings")?;
            let report = pass.run(&mut dwg)?;
            println!("{report}");

            if args.dry_run {
                info!("dry run, snapshot left unchanged");
            } else {
                SnapshotWriter::write_drawing(&cli.drawing, &dwg)?;
            }
        }
        Commands::Parts(args) => {
            if !dwg.contains_entity(args.handle) {
                bail!("no entity with handle {}", args.handle);
            }
            let store = EntityAttributeStore::new(cfg.codec()?);
            let text = dwg.transaction(|tx| store.read_text(tx, args.handle, &cfg.parts_namespace))?;
            match text {
                Some(text) => {
                    let value: serde_json::Value = serde_json::from_str(&text)?;
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                None => println!("entity {} has no parts", args.handle),
            }
        }
        Commands::WorkPoint => match document::load::<_, WorkPoint>(&mut dwg, WORK_POINT_KEY)? {
            Some(wp) => println!("{} {} {}", wp.x, wp.y, wp.z),
            None => println!("no work point"),
        },
        Commands::SetWorkPoint(args) => {
            let wp = WorkPoint {
                x: args.x,
                y: args.y,
                z: args.z,
            };
            document::save(&mut dwg, WORK_POINT_KEY, &wp)?;
            SnapshotWriter::write_drawing(&cli.drawing, &dwg)?;
        }
        Commands::Elevations => {
            let levels =
                document::load::<_, Json<Vec<ElevationDefinition>>>(&mut dwg, ELEVATIONS_KEY)?;
            match levels {
                Some(Json(levels)) => {
                    for level in levels {
                        println!("{}\t{}", level.name, level.elevation);
                    }
                }
                None => println!("no elevations"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use slotstore::Drawing;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn handles_parse_as_hex() {
        assert_eq!(parse_handle("2A"), Ok(EntityId(0x2A)));
        assert_eq!(parse_handle("0x1f"), Ok(EntityId(0x1F)));
        assert!(parse_handle("zz").is_err());
    }

    #[test]
    fn reconcile_flags_parse() {
        let cli = Cli::try_parse_from([
            "takeoff-xdata",
            "--drawing",
            "plan.xdw",
            "reconcile",
            "--chunk-size",
            "250",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Reconcile(args) => {
                assert_eq!(args.chunk_size, Some(250));
                assert_eq!(args.ceiling, None);
                assert!(args.dry_run);
            }
            _ => panic!("expected reconcile"),
        }
    }

    #[test]
    fn negative_work_point_coordinates_parse() {
        let cli = Cli::try_parse_from([
            "takeoff-xdata",
            "-d",
            "plan.xdw",
            "set-work-point",
            "1.5",
            "-2",
            "0",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::SetWorkPoint(SetWorkPointArgs { y, .. }) if y == -2.0));
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.chunk_size, 1000);
        assert_eq!(cfg.ceiling, 20);
    }

    #[test]
    fn work_point_survives_a_snapshot_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.xdw");
        let mut dwg = Drawing::new();
        let wp = WorkPoint {
            x: 3.0,
            y: -1.0,
            z: 0.5,
        };
        document::save(&mut dwg, WORK_POINT_KEY, &wp).unwrap();
        SnapshotWriter::write_drawing(&path, &dwg).unwrap();

        let mut back = SnapshotReader::read_drawing(&path).unwrap();
        let loaded = document::load::<_, WorkPoint>(&mut back, WORK_POINT_KEY).unwrap();
        assert_eq!(loaded, Some(wp));
    }
}
