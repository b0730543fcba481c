use anyhow::Context;
use clap::Parser;
use noisecore::color::PaletteName;
use noisecore::driver::DriverClock;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator {
    pub mod profile;
}
mod workflow {
    pub mod config;
    pub mod runner;
}

#[derive(Parser)]
#[command(author, version, about = "Synthetic driver for the noise-field pipeline")]
struct Args {
    /// Run a single offline cycle and append a summary report
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 50)]
    cols: usize,
    #[arg(long, default_value_t = 50)]
    rows: usize,
    /// IDW exponent, 0.5 to 5.0
    #[arg(long, default_value_t = 2.0)]
    power: f64,
    #[arg(long, default_value_t = PaletteName::Plasma)]
    palette: PaletteName,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Stream synthetic batches through the live driver until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.cols, args.rows, args.power, args.palette, args.seed)
    };
    let runner = Runner::new(workflow_config.clone());

    if args.offline {
        let mut generator = runner.generator();
        let update = generator.sensor_update(0.0)?;
        let authoritative = generator.authoritative(0.0);
        let result = runner.execute(&update, authoritative)?;

        let epicenter = result
            .epicenter
            .as_ref()
            .map(|candidate| {
                format!(
                    "({:.3}, {:.3}) via {}",
                    candidate.position.x,
                    candidate.position.y,
                    candidate.source.tag()
                )
            })
            .unwrap_or_else(|| "none".to_string());
        let hottest = result
            .hottest
            .as_ref()
            .map(|sensor| format!("{} {:.1} dB ({})", sensor.id, sensor.value, sensor.level.label()))
            .unwrap_or_else(|| "none".to_string());

        let mean = result
            .mean_db
            .map(|mean| format!("{:.1} dB", mean))
            .unwrap_or_else(|| "none".to_string());

        println!(
            "Offline run -> samples {}/{}, raster {:?}, range {:?}, epicenter {}",
            result.samples, result.readings, result.raster_dims, result.value_range, epicenter
        );

        let report = format!(
            "readings={} samples={} raster={:?} range={:?} epicenter={} hottest={} mean={} metrics={}\n",
            result.readings,
            result.samples,
            result.raster_dims,
            result.value_range,
            epicenter,
            hottest,
            mean,
            serde_json::to_string(&result.metrics).context("encoding metrics")?
        );
        let report_path = PathBuf::from("tools/data/offline_report.log");
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(report_path)?;
        file.write_all(report.as_bytes())?;
    }
    if args.serve {
        log::info!("live pipeline running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("creating runtime for the live driver")?;
        let last = runtime.block_on(async {
            let shutdown = async {
                if let Err(err) = signal::ctrl_c().await {
                    log::warn!("awaiting Ctrl+C failed: {}", err);
                }
            };
            runner.serve(DriverClock::system(), shutdown).await
        })?;
        println!(
            "Live run stopped at generation {} ({} cycles)",
            last.generation, last.metrics.cycles
        );
    }

    Ok(())
}
