use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[zbus::proxy(
    interface = "org.freedesktop.Likeness1",
    default_service = "org.freedesktop.Likeness1",
    default_path = "/org/freedesktop/Likeness1"
)]
trait Likeness {
    fn enroll(&self, name: &str) -> zbus::Result<String>;
    fn enroll_image(&self, name: &str, paths: &[String]) -> zbus::Result<String>;
    fn cancel_enroll(&self) -> zbus::Result<bool>;
    fn identify(&self) -> zbus::Result<String>;
    fn identify_image(&self, path: &str) -> zbus::Result<String>;
    fn list_identities(&self) -> zbus::Result<String>;
    fn remove_identity(&self, name: &str) -> zbus::Result<bool>;
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "likeness", about = "Likeness face enrollment and recognition CLI")]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a person by looking into the camera, or from images
    Enroll {
        /// Name to enroll under
        name: String,
        /// Image files to enroll from instead of using the camera
        #[arg(short, long, num_args = 1..)]
        image: Vec<PathBuf>,
    },
    /// Cancel an enrollment in progress
    Cancel,
    /// Identify the person in front of the camera, or in an image
    Identify {
        /// Image file to identify instead of using the camera
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// List enrolled identities
    List,
    /// Remove an enrolled identity
    Remove {
        name: String,
    },
    /// Show daemon status
    Status,
    /// List local V4L2 capture devices (does not need the daemon)
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Commands::Devices = cli.command {
        let devices = likeness_hw::Camera::list_devices();
        if devices.is_empty() {
            println!("No capture devices found");
        }
        for d in devices {
            println!("{}\t{} ({}, {})", d.path, d.name, d.driver, d.bus);
        }
        return Ok(());
    }

    let conn = if cli.session {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("failed to connect to D-Bus")?;
    tracing::debug!(session = cli.session, "connected to D-Bus");
    let proxy = LikenessProxy::new(&conn)
        .await
        .context("likenessd is not reachable")?;

    match cli.command {
        Commands::Enroll { name, image } => {
            let raw = if image.is_empty() {
                println!("Enrolling {name}: look into the camera...");
                proxy.enroll(&name).await?
            } else {
                let paths = image
                    .iter()
                    .map(|p| absolute(p))
                    .collect::<Result<Vec<_>>>()?;
                proxy.enroll_image(&name, &paths).await?
            };
            let reply: serde_json::Value = serde_json::from_str(&raw)?;
            println!(
                "Enrolled {} from {} samples",
                reply["identity"].as_str().unwrap_or(&name),
                reply["samples"]
            );
        }
        Commands::Cancel => {
            proxy.cancel_enroll().await?;
            println!("Cancellation requested");
        }
        Commands::Identify { image } => {
            let raw = match image {
                Some(path) => proxy.identify_image(&absolute(&path)?).await?,
                None => proxy.identify().await?,
            };
            print_verdict(&serde_json::from_str(&raw)?);
        }
        Commands::List => {
            let identities: serde_json::Value =
                serde_json::from_str(&proxy.list_identities().await?)?;
            match identities.as_array() {
                Some(list) if !list.is_empty() => {
                    for entry in list {
                        println!(
                            "{}\tenrolled {}",
                            entry["name"].as_str().unwrap_or("?"),
                            entry["created_at"].as_str().unwrap_or("?")
                        );
                    }
                }
                _ => println!("No identities enrolled"),
            }
        }
        Commands::Remove { name } => {
            if proxy.remove_identity(&name).await? {
                println!("Removed {name}");
            } else {
                println!("{name} is not enrolled");
            }
        }
        Commands::Status => {
            let status: serde_json::Value = serde_json::from_str(&proxy.status().await?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Devices => {}
    }

    Ok(())
}

/// The daemon resolves paths in its own working directory.
fn absolute(path: &std::path::Path) -> Result<String> {
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;
    Ok(path.to_string_lossy().into_owned())
}

fn print_verdict(verdict: &serde_json::Value) {
    if let Some(reason) = verdict["reason"].as_str() {
        println!("Unknown ({reason})");
        return;
    }
    let score = verdict["score"].as_f64().unwrap_or(f64::NAN);
    match verdict["identity"].as_str() {
        Some(name) => println!("{name} ({:.2}%)", score * 100.0),
        None => println!("Unknown (best {:.2}%)", score * 100.0),
    }
}
