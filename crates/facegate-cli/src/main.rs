use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate_hw::Camera;
use facegate_session::{
    spawn_session, CameraScanner, ProcedureError, SessionConfig, SessionError, SessionHandle,
    Verification,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "facegate", about = "Camera face check-in demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive scan session (register, then check in)
    Scan {
        /// V4L2 device path (overrides FACEGATE_CAMERA_DEVICE)
        #[arg(short, long)]
        device: Option<String>,
        /// Directory containing the ONNX models (overrides FACEGATE_MODEL_DIR)
        #[arg(long)]
        model_dir: Option<PathBuf>,
        /// Write annotated debug snapshots into this directory
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// List available capture devices
    Devices {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            device,
            model_dir,
            snapshot_dir,
        } => {
            let mut config = SessionConfig::from_env();
            if let Some(device) = device {
                config.camera_device = device;
            }
            if let Some(model_dir) = model_dir {
                config.model_dir = model_dir;
            }
            if let Some(snapshot_dir) = snapshot_dir {
                config.snapshot_dir = Some(snapshot_dir);
            }
            run_scan(config).await
        }
        Commands::Devices { json } => {
            list_devices(json);
            Ok(())
        }
    }
}

async fn run_scan(config: SessionConfig) -> Result<()> {
    println!(
        "Loading models from {} and opening {}...",
        config.model_dir.display(),
        config.camera_device
    );
    let scanner = CameraScanner::open(&config)
        .with_context(|| format!("failed to start capture on {}", config.camera_device))?;
    let handle = spawn_session(scanner, config.policy.clone());
    tracing::info!(
        device = %config.camera_device,
        max_attempts = config.policy.max_attempts,
        "scan session started"
    );

    println!("First register, then try checking in. State is lost on exit.");
    println!("Commands: register, checkin, status, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                handle.cancel_scan();
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break; // stdin closed
        };

        match line.trim() {
            "" => continue,
            "register" => run_register(&handle).await,
            "checkin" => run_checkin(&handle).await,
            "status" => match handle.status().await {
                Ok(status) => println!("{}", serde_json::to_string_pretty(&status)?),
                Err(e) => println!("Status unavailable: {e}"),
            },
            "quit" | "exit" => break,
            other => println!("Unknown command: {other} (try register, checkin, status, quit)"),
        }
    }

    println!("Session ended; nothing was persisted.");
    Ok(())
}

/// Run an enrollment scan, cancellable with Ctrl-C.
async fn run_register(handle: &SessionHandle) {
    println!("Scanning... look at the camera.");
    let result = tokio::select! {
        result = handle.enroll() => result,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel_scan();
            println!("Registration cancelled.");
            return;
        }
    };

    match result {
        Ok(summary) => println!(
            "Face registered successfully (confidence {:.2}).",
            summary.confidence
        ),
        Err(SessionError::Procedure(ProcedureError::NoQualifyingFace { .. })) => {
            println!("No satisfactory face detected for registration.");
        }
        Err(SessionError::Busy) => println!("Another scan is already in progress."),
        Err(e) => println!("Registration failed: {e}"),
    }
}

/// Run a verification scan, cancellable with Ctrl-C.
async fn run_checkin(handle: &SessionHandle) {
    println!("Scanning... look at the camera.");
    let result = tokio::select! {
        result = handle.verify() => result,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel_scan();
            println!("Check-in cancelled.");
            return;
        }
    };

    match result {
        Ok(verification) => report_checkin(&verification),
        Err(SessionError::Busy) => println!("Another scan is already in progress."),
        Err(e) => println!("Check-in failed: {e}"),
    }
}

fn report_checkin(verification: &Verification) {
    if verification.matched {
        println!(
            "Satisfactory match found (distance {:.2}, attempt {}).",
            verification.best_distance.unwrap_or(0.0),
            verification.attempts
        );
    } else {
        match verification.best_distance {
            Some(d) => println!(
                "No satisfactory face match found for check-in (closest distance {d:.2})."
            ),
            None => println!(
                "No satisfactory face match found for check-in (is a face registered?)."
            ),
        }
    }
}

fn print_prompt() {
    use std::io::Write;
    print!("facegate> ");
    let _ = std::io::stdout().flush();
}

fn list_devices(json: bool) {
    let devices = Camera::list_devices();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&devices).unwrap_or_else(|_| "[]".into())
        );
        return;
    }

    if devices.is_empty() {
        println!("No capture devices found.");
        return;
    }
    for device in devices {
        println!("{}  {} ({})", device.path, device.name, device.driver);
    }
}
