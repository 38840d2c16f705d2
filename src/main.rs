use anyhow::{anyhow, Result};
use std::path::PathBuf;

use camtrap::config::Config;
use camtrap::db::{Database, GalleryFilter};
use camtrap::detect::HttpDetector;
use camtrap::export::{export_photos, ExportFormat};
use camtrap::logging;
use camtrap::pipeline::Pipeline;
use camtrap::recognition::HttpOcr;
use camtrap::store::MediaStore;

struct Args {
    config_path: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut command = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("camtrap {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            other => command.push(other.to_string()),
        }
        i += 1;
    }

    Args {
        config_path,
        command,
    }
}

fn print_help() {
    println!(
        r#"camtrap - trail-camera photo metadata pipeline

USAGE:
    camtrap [OPTIONS] <COMMAND>

COMMANDS:
    ingest <FILE>                Register an image and create a staging photo
    analyze <ID>                 Run overlay + detection analysis on a photo
    publish <ID>                 Publish a photo (redacts person regions)
    unpublish <ID>               Move a published photo back to staging
    delete <ID>                  Delete a photo and its stored image
    staging                      List photos awaiting review
    gallery                      List published photos
    cameras [QUERY]              List cameras, optionally filtered
    camera-add <NAME> <LAT> <LON> [DESC]
                                 Create a camera explicitly
    camera-deactivate <ID>       Stop a camera matching overlay tokens
    export <FILE> [csv|json]     Export all photo records

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    CAMTRAP_LOG         Log level (debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/camtrap/config.toml"#
    );
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let db = Database::open(&config.db_path)?;
    db.initialize()?;

    let store = MediaStore::new(&config.media.root)?;
    let recognizer = Box::new(HttpOcr::from_config(&config.engines));
    let detector = Box::new(HttpDetector::from_config(&config.engines));

    Ok(Pipeline::new(db, store, recognizer, detector, config))
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| anyhow!("{raw:?} is not a numeric id"))
}

fn run(args: Args) -> Result<()> {
    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let command: Vec<&str> = args.command.iter().map(String::as_str).collect();
    let pipeline = build_pipeline(&config)?;

    match command.as_slice() {
        ["ingest", file] => {
            let bytes = std::fs::read(file)?;
            let photo = pipeline.ingest(&bytes, None)?;
            println!("photo {} staged at {}", photo.id, photo.image_path);
        }
        ["analyze", id] => {
            let outcome = pipeline.analyze(parse_id(id)?)?;
            println!(
                "camera: {}  date: {}  time: {}  temp: {}  pressure: {}",
                outcome.fields.camera_token.as_deref().unwrap_or("-"),
                outcome
                    .fields
                    .date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into()),
                outcome
                    .fields
                    .time
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".into()),
                outcome
                    .fields
                    .temperature_c
                    .map(|t| format!("{t}C"))
                    .unwrap_or_else(|| "-".into()),
                outcome
                    .fields
                    .pressure_inhg
                    .map(|p| format!("{p}inHg"))
                    .unwrap_or_else(|| "-".into()),
            );
            for det in &outcome.detections {
                println!(
                    "  {} {:.2} [{:.3} {:.3} {:.3} {:.3}]",
                    det.label, det.confidence, det.x_min, det.y_min, det.x_max, det.y_max
                );
            }
        }
        ["publish", id] => {
            let photo = pipeline.publish(parse_id(id)?, None)?;
            println!("photo {} published", photo.id);
        }
        ["unpublish", id] => {
            let photo = pipeline.unpublish(parse_id(id)?)?;
            println!("photo {} back in staging", photo.id);
        }
        ["delete", id] => {
            pipeline.delete(parse_id(id)?)?;
            println!("photo {id} deleted");
        }
        ["staging"] => print_photos(&pipeline.db().list_staging()?),
        ["gallery"] => {
            print_photos(&pipeline.db().list_published(&GalleryFilter::default())?)
        }
        ["cameras"] => print_cameras(&pipeline.list_cameras(None)?),
        ["cameras", query] => print_cameras(&pipeline.list_cameras(Some(query))?),
        ["camera-add", name, lat, lon] => {
            let camera =
                pipeline.create_camera(name, lat.parse()?, lon.parse()?, "", true)?;
            println!("camera {} created as {}", camera.id, camera.name);
        }
        ["camera-add", name, lat, lon, desc] => {
            let camera =
                pipeline.create_camera(name, lat.parse()?, lon.parse()?, desc, true)?;
            println!("camera {} created as {}", camera.id, camera.name);
        }
        ["camera-deactivate", id] => {
            let camera = pipeline.deactivate_camera(parse_id(id)?)?;
            println!("camera {} deactivated", camera.name);
        }
        ["export", file] => {
            let count = export_photos(pipeline.db(), PathBuf::from(file).as_path(), ExportFormat::Csv)?;
            println!("exported {count} photos");
        }
        ["export", file, format] => {
            let format = ExportFormat::parse(format)
                .ok_or_else(|| anyhow!("unknown export format {format:?}"))?;
            let count = export_photos(pipeline.db(), PathBuf::from(file).as_path(), format)?;
            println!("exported {count} photos");
        }
        [] => {
            print_help();
        }
        other => {
            return Err(anyhow!("unknown command: {}", other.join(" ")));
        }
    }

    Ok(())
}

fn print_photos(photos: &[camtrap::db::Photo]) {
    if photos.is_empty() {
        println!("no photos");
        return;
    }
    for photo in photos {
        println!(
            "{:>4}  {:<9}  {}  {}  {}",
            photo.id,
            photo.status.as_str(),
            photo
                .date_taken
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            photo
                .time_taken
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".into()),
            photo.image_path,
        );
    }
}

fn print_cameras(cameras: &[camtrap::db::Camera]) {
    if cameras.is_empty() {
        println!("no cameras");
        return;
    }
    for camera in cameras {
        println!(
            "{:>4}  {:<16} {:>10.6} {:>11.6}  {}{}",
            camera.id,
            camera.name,
            camera.base_latitude,
            camera.base_longitude,
            if camera.is_active { "active" } else { "inactive" },
            if camera.description.is_empty() {
                String::new()
            } else {
                format!("  {}", camera.description)
            },
        );
    }
}

fn main() {
    let args = parse_args();

    let _ = logging::init(Some(Config::config_dir().join("logs")));

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
