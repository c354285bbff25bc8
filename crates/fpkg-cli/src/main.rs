mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "fpkg", version, about = "Build FreeBSD binary packages")]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a package archive from a directory.
    Build {
        /// Directory containing the files to package.
        #[arg(default_value = ".")]
        directory: PathBuf,
        /// Path to the package configuration file.
        #[arg(short, long, default_value = "fpkg.yaml")]
        config: PathBuf,
        /// Override the version set in the configuration file.
        #[arg(long = "package-version", value_name = "VERSION")]
        package_version: Option<String>,
        /// Directory the package archive is written to.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Also write the manifest to this file.
        #[arg(long, value_name = "PATH")]
        manifest: Option<PathBuf>,
    },
    /// Generate the package manifest without building an archive.
    Manifest {
        /// Directory containing the files to package.
        #[arg(default_value = ".")]
        directory: PathBuf,
        /// Path to the package configuration file.
        #[arg(short, long, default_value = "fpkg.yaml")]
        config: PathBuf,
        /// Override the version set in the configuration file.
        #[arg(long = "package-version", value_name = "VERSION")]
        package_version: Option<String>,
        /// Write the manifest to this file instead of stdout.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FPKG_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;

    let result = match cli.command {
        Commands::Build {
            directory,
            config,
            package_version,
            output_dir,
            manifest,
        } => commands::build::run(
            &directory,
            &config,
            package_version.as_deref(),
            &output_dir,
            manifest,
            json_output,
        ),
        Commands::Manifest {
            directory,
            config,
            package_version,
            output,
        } => commands::manifest::run(
            &directory,
            &config,
            package_version.as_deref(),
            output.as_deref(),
        ),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(commands::exit_code_for(&msg))
        }
    }
}
