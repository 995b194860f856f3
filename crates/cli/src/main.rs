use clap::Parser;
use eyre::WrapErr;
use jobd_config::loader::ConfigLoader;
use jobd_server::Server;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jobd")]
#[command(about = "Run jobs on behalf of TCP clients and stream their output", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides JOBD_PORT)
    #[arg(long, short)]
    port: Option<u16>,

    /// Maximum number of connected clients
    #[arg(long)]
    max_clients: Option<usize>,

    /// Maximum number of jobs in the job table
    #[arg(long)]
    max_jobs: Option<usize>,

    /// Directory job names are resolved in (overrides JOBD_JOBS_DIR)
    #[arg(long, short)]
    jobs_dir: Option<PathBuf>,

    /// Size in bytes of every line buffer
    #[arg(long)]
    buffer_capacity: Option<usize>,

    /// Ignore JOBD_PORT and JOBD_JOBS_DIR
    #[arg(long)]
    no_env: bool,
}

impl Cli {
    fn loader(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        if self.no_env {
            loader = loader.ignore_env();
        }
        if let Some(path) = self.config {
            loader = loader.file(path);
        }
        if let Some(port) = self.port {
            loader = loader.port(port);
        }
        if let Some(max) = self.max_clients {
            loader = loader.max_clients(max);
        }
        if let Some(max) = self.max_jobs {
            loader = loader.max_jobs(max);
        }
        if let Some(dir) = self.jobs_dir {
            loader = loader.jobs_dir(dir);
        }
        if let Some(capacity) = self.buffer_capacity {
            loader = loader.buffer_capacity(capacity);
        }
        loader
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    jobd_utils::init().map_err(|e| eyre::eyre!(e))?;

    let config = cli.loader().load().wrap_err("invalid configuration")?;
    let mut server = Server::bind(config).wrap_err("failed to start server")?;
    server
        .install_termination_signals()
        .wrap_err("failed to install signal handlers")?;

    server.run().wrap_err("server loop failed")?;
    tracing::info!("server stopped");
    Ok(())
}
