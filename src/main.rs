//! Main entry point for the ziprepack CLI application.
//!
//! Opens the source archive (local path or HTTP URL) and the destination,
//! then hands both to the repacking engine.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ziprepack::{
    Cli, ConvertOptions, ConvertSummary, EntryReport, HttpRangeReader, LocalFileReader, Mode,
    ReadAt, TarOptions, ZipRepacker,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    if cli.is_http_url() {
        // Handle remote ZIP file via HTTP Range requests
        let reader = HttpRangeReader::new(cli.file.clone())
            .await
            .with_context(|| format!("cannot open {}", cli.file))?;
        let reader = Arc::new(reader);

        process_zip(reader.clone(), &cli).await?;

        if !cli.quiet {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(reader.transferred_bytes())
            );
        }
    } else {
        let reader = LocalFileReader::new(Path::new(&cli.file))
            .with_context(|| format!("cannot open {}", cli.file))?;
        process_zip(Arc::new(reader), &cli).await?;
    }

    Ok(())
}

/// Dispatch to listing or conversion based on CLI options.
async fn process_zip<R: ReadAt + 'static>(reader: Arc<R>, cli: &Cli) -> Result<()> {
    let options = ConvertOptions {
        tar: TarOptions {
            gz_suffix: cli.gz_suffix,
        },
        verify_crc: cli.verify_crc,
        skip_bad_entries: cli.keep_going,
    };
    let repacker = ZipRepacker::new(reader).with_options(options);

    let Some(mode) = cli.mode() else {
        return list_files(&repacker).await;
    };

    let quiet = cli.quiet;
    let progress = |entry: &EntryReport| {
        if !quiet {
            println!("  adding: {}", entry.output_name);
        }
    };

    let summary = match mode {
        Mode::GzipFiles => {
            let out_dir = PathBuf::from(cli.output.as_deref().unwrap_or("."));
            repacker
                .write_gzip_files(&out_dir, progress)
                .await
                .with_context(|| format!("failed to extract {}", cli.file))?
        }
        Mode::Tar => {
            let Some(output) = cli.output.as_deref() else {
                bail!("an output tarball path is required");
            };
            let mut file = tokio::fs::File::create(output)
                .await
                .with_context(|| format!("cannot create {}", output))?;
            repacker
                .write_tar(&mut file, progress)
                .await
                .with_context(|| format!("failed to convert {} into {}", cli.file, output))?
        }
    };

    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// List central directory records: method, sizes and name.
async fn list_files<R: ReadAt + 'static>(repacker: &ZipRepacker<R>) -> Result<()> {
    let entries = repacker.list_files().await?;

    println!(
        "{:>8}  {:>10}  {:>10}  {:>10}  Name",
        "Method", "Length", "Size", "CRC-32"
    );
    println!("{}", "-".repeat(60));

    for entry in &entries {
        println!(
            "{:>8}  {:>10}  {:>10}  {:08x}  {}",
            entry.compression_method.label(),
            entry.uncompressed_size,
            entry.compressed_size,
            entry.crc32,
            entry.file_name
        );
    }

    println!("{}", "-".repeat(60));
    println!("{} entries", entries.len());

    Ok(())
}

fn print_summary(summary: &ConvertSummary) {
    print!(
        "{} entries, {} payload, {} written",
        summary.entries_written,
        format_size(summary.payload_bytes),
        format_size(summary.output_bytes)
    );
    if summary.entries_skipped > 0 || summary.records_skipped > 0 {
        print!(
            " ({} entries skipped, {} bad records)",
            summary.entries_skipped, summary.records_skipped
        );
    }
    println!();
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
