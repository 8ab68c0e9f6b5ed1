//! cfio command-line front end.
//!
//! Usage:
//!   cfio cat cf:/var/log/app.log
//!   cfio cp cf:input.bin cf:output.bin --buf-size 65536
//!   cfio stat cf:output.bin
//!   cfio --config cfio.toml cp in.bin out.bin
//!
//! Logging goes to stderr; set `RUST_LOG=cfio=debug` to see handle lifecycle.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use cfio::{Access, CachedFileConfig, OpenMode, ProtocolRegistry, UrlContext};

/// Copy bytes through buffered, URL-addressed file handles.
#[derive(Parser, Debug)]
#[command(name = "cfio")]
#[command(about = "Buffered URL file access")]
struct Args {
    /// Transfer buffer size in bytes (0 disables buffering)
    #[arg(long, global = true)]
    buf_size: Option<String>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a URL's content to stdout
    Cat { url: String },
    /// Copy SRC to DST, truncating DST
    Cp { src: String, dst: String },
    /// Show size and owner access of a URL
    Stat { url: String },
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let registry = ProtocolRegistry::with_defaults(config);

    match &args.command {
        Command::Cat { url } => cmd_cat(&registry, url),
        Command::Cp { src, dst } => cmd_cp(&registry, src, dst),
        Command::Stat { url } => cmd_stat(&registry, url),
    }
}

fn load_config(args: &Args) -> Result<CachedFileConfig> {
    let mut config = match &args.config {
        Some(path) => CachedFileConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CachedFileConfig::default(),
    };
    if let Some(size) = &args.buf_size {
        config.set_option(cfio::config::BUF_SIZE_OPTION, size)?;
    }
    tracing::debug!(buf_size = config.buf_size(), "config loaded");
    Ok(config)
}

fn cmd_cat(registry: &ProtocolRegistry, url: &str) -> Result<()> {
    let mut input = registry
        .open(url, OpenMode::Read)
        .with_context(|| format!("opening {url}"))?;
    let copied = pump(input.as_mut(), |chunk| {
        std::io::stdout().write_all(chunk)?;
        Ok(())
    });
    input.close()?;
    copied?;
    std::io::stdout().flush()?;
    Ok(())
}

fn cmd_cp(registry: &ProtocolRegistry, src: &str, dst: &str) -> Result<()> {
    let mut input = registry
        .open(src, OpenMode::Read)
        .with_context(|| format!("opening {src}"))?;
    let mut output = match registry.open(dst, OpenMode::Write) {
        Ok(output) => output,
        Err(e) => {
            input.close()?;
            return Err(e).with_context(|| format!("opening {dst}"));
        }
    };

    let copied = pump(input.as_mut(), |chunk| {
        output.write_all(chunk)?;
        Ok(())
    });
    let closed_in = input.close();
    // Close the destination even after a failed copy so its buffer is released
    let closed_out = output.close().with_context(|| format!("closing {dst}"));

    let bytes = copied?;
    closed_in?;
    closed_out?;
    tracing::info!(src, dst, bytes, "copied");
    Ok(())
}

fn cmd_stat(registry: &ProtocolRegistry, url: &str) -> Result<()> {
    let access = registry
        .check(url, Access::READ_WRITE)
        .with_context(|| format!("checking {url}"))?;
    let mut handle = registry
        .open(url, OpenMode::Read)
        .with_context(|| format!("opening {url}"))?;
    let size = handle.size();
    handle.close()?;

    println!("url:    {url}");
    println!("size:   {}", size?);
    if access.is_empty() {
        println!("access: -");
    } else {
        println!(
            "access: {}{}",
            if access.read { "r" } else { "" },
            if access.write { "w" } else { "" }
        );
    }
    Ok(())
}

/// Read `input` to the end, handing each chunk to `sink`. Returns bytes moved.
fn pump(input: &mut dyn UrlContext, mut sink: impl FnMut(&[u8]) -> Result<()>) -> Result<u64> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        sink(&buf[..n])?;
        total += n as u64;
    }
}
