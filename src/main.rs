mod backend;
mod config;
mod runtime;

use anyhow::Result;

use backend::{build_executive, DeviceExecutive};
use config::Config;
use runtime::bench_loop::{BenchmarkLoop, LoopSettings};
use runtime::report::{build_report, summarize};
use runtime::ui::{error, info, init_logging, startup_banner};
use runtime::RuntimeContext;

fn main() {
    init_logging();
    let cfg = Config::parse().unwrap_or_else(|err| err.exit());
    if let Err(err) = run(cfg) {
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn run(cfg: Config) -> Result<()> {
    let mut executive = build_executive(&cfg);

    if cfg.list_devices {
        list_devices(executive.as_ref());
        return Ok(());
    }

    let ctx = RuntimeContext::new(cfg.initial_difficulty, cfg.shutdown_policy);
    ctx.install_signal_handler()?;

    startup_banner(
        "argonbench | Argon2id memory-hard benchmark",
        &[
            ("mode", cfg.mode.to_string()),
            ("device", cfg.device_index.to_string()),
            (
                "batch size",
                if cfg.batch_size == 0 {
                    "auto (free memory)".to_string()
                } else {
                    cfg.batch_size.to_string()
                },
            ),
            ("kernel", cfg.kernel_type.to_string()),
            ("precompute refs", cfg.precompute_refs.to_string()),
            ("cpu threads", cfg.threads.to_string()),
            ("difficulty file", cfg.difficulty_file.display().to_string()),
            ("poll interval", format!("{}s", cfg.poll_interval.as_secs())),
            ("max iterations", cfg.max_iterations.to_string()),
        ],
    );

    ctx.start_poller(cfg.difficulty_file.clone(), cfg.poll_interval)?;

    let outcome =
        BenchmarkLoop::new(&ctx, executive.as_mut(), LoopSettings::from_config(&cfg)).run();

    ctx.stop_poller();

    let report = build_report(
        executive.name(),
        cfg.device_index,
        outcome.iterations,
        outcome.skipped,
        ctx.difficulty().get(),
        outcome.stop_reason,
        outcome.completed,
    );
    summarize(&report, cfg.report.as_deref())?;
    info("MAIN", "argonbench stopped");
    Ok(())
}

fn list_devices(executive: &dyn DeviceExecutive) {
    match executive.list_devices() {
        Ok(devices) if devices.is_empty() => {
            info("DEVICES", format!("no {} devices found", executive.name()));
        }
        Ok(devices) => {
            for device in devices {
                println!(
                    "Device #{}: {} ({} MiB)",
                    device.index,
                    device.name,
                    device.total_bytes / (1024 * 1024)
                );
            }
        }
        Err(err) => error("DEVICES", format!("{err}")),
    }
}
