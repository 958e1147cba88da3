//! Multi-camera acquisition node binary

use argh::FromArgs;
use multicam_node::config::{Config, SourceConfig};
use multicam_node::orchestrator::{NodeSettings, Orchestrator, RunSummary};
use multicam_node::shutdown::{install_signal_handler, Shutdown};
use multicam_node::source::{CameraRuntime, SimulatedRuntime};
use multicam_node::transport::{LogTransport, Transport, ZenohTransport};
use multicam_node::zenoh_session::{open_zenoh_session, resolve_machine_id};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Publish frames, time references and exposure metadata from all attached cameras
struct Args {
    /// path to the configuration file
    #[argh(option, short = 'c', default = "PathBuf::from(\"config.yaml\")")]
    config: PathBuf,

    /// zenoh endpoint to connect to
    #[argh(option, short = 'e')]
    endpoint: Option<String>,

    /// capture and encode without publishing to Zenoh
    #[argh(switch)]
    dry_run: bool,
}

async fn run_with<R: CameraRuntime, T: Transport>(
    runtime: R,
    transport: T,
    settings: NodeSettings,
    shutdown: Shutdown,
) -> anyhow::Result<RunSummary> {
    let summary = Orchestrator::new(runtime, transport, settings)
        .run(shutdown)
        .await?;
    Ok(summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();

    let config = match Config::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            log::error!(
                "Failed to load config from '{}': {}",
                args.config.display(),
                e
            );
            std::process::exit(1);
        }
    };
    log::info!("Loaded configuration from {}", args.config.display());

    let machine_id = resolve_machine_id();
    let settings = NodeSettings::from_config(&config, machine_id.clone());
    log::info!("Machine ID: {}, skip: {}", machine_id, settings.skip);

    let shutdown = Shutdown::new();
    install_signal_handler(&shutdown)?;

    // Connect before touching the cameras so a failed connection leaves nothing to release
    let session = if args.dry_run {
        None
    } else {
        Some(open_zenoh_session(args.endpoint.as_deref()).await?)
    };

    let runtime = match config.source {
        SourceConfig::Simulated(sim) => SimulatedRuntime::acquire(sim),
    };

    let result = match session {
        None => {
            log::info!("Dry run, messages are encoded and dropped");
            let transport = LogTransport::new();
            let result = run_with(runtime, transport.clone(), settings, shutdown).await;
            log::info!(
                "Dry run would have sent {} messages ({} bytes)",
                transport.messages(),
                transport.bytes()
            );
            result
        }
        Some(session) => {
            let transport = ZenohTransport::new(session.clone());
            let result = run_with(runtime, transport, settings, shutdown).await;
            if let Err(e) = session.close().await {
                log::warn!("Failed to close Zenoh session: {}", e);
            }
            result
        }
    };

    match result {
        Ok(summary) => {
            for camera in &summary.cameras {
                log::info!(
                    "[{}] {} published, {} skipped, {} failed grabs",
                    camera.frame_id,
                    camera.published,
                    camera.skipped,
                    camera.failed_grabs
                );
            }
            log::info!("All cameras released, exiting");
            Ok(())
        }
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
