use clap::Parser;

use crate::transcode::Mode;

#[derive(Parser, Debug)]
#[command(name = "ziprepack")]
#[command(version)]
#[command(about = "Repack a ZIP archive into gzip files or a tarball without recompressing", long_about = None)]
#[command(after_help = "Examples:\n  \
  ziprepack data.zip data.tar            tarball of gzip-wrapped entries\n  \
  ziprepack -z data.zip data.tar         plain tarball, same stream as -c\n  \
  ziprepack -x data.zip outdir           one .gz file per entry under outdir\n  \
  ziprepack -l https://example.com/archive.zip   list entries of a remote ZIP")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "ZIP")]
    pub file: String,

    /// Output tarball (tar modes) or directory (extract mode, default: current)
    #[arg(value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Create a tarball of gzipped files [default]
    #[arg(short = 'c', group = "mode")]
    pub tar: bool,

    /// Create a plain tarball (same output as -c)
    #[arg(short = 'z', visible_short_alias = 't', group = "mode")]
    pub plain_tar: bool,

    /// Extract each entry to its own gzip file
    #[arg(short = 'x', group = "mode")]
    pub extract: bool,

    /// List entries without converting
    #[arg(short = 'l', group = "mode")]
    pub list: bool,

    /// Append .gz to the names of gzip-wrapped tar members
    #[arg(long)]
    pub gz_suffix: bool,

    /// Check stored entries against their CRC-32
    #[arg(long)]
    pub verify_crc: bool,

    /// Skip entries that cannot be converted instead of aborting
    #[arg(long)]
    pub keep_going: bool,

    /// Verbose logging (-vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    /// Conversion mode, or `None` for listing.
    pub fn mode(&self) -> Option<Mode> {
        if self.list {
            None
        } else if self.extract {
            Some(Mode::GzipFiles)
        } else {
            Some(Mode::Tar)
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
