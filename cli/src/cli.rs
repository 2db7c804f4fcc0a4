use std::path::PathBuf;

use clap::{Parser, Subcommand};
use image_suite_core::TargetFormat;

/// Background removal and image format conversion for batches of images
#[derive(Debug, Parser)]
#[command(name = "image_suite", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert images to JPEG, PNG or WebP
    Convert {
        /// Input file or directory
        input: PathBuf,

        /// Output directory (default: current directory)
        #[arg(default_value = ".")]
        output: PathBuf,

        /// Target format (jpeg, jpg, png, webp)
        #[arg(long, short = 't', value_name = "FORMAT", value_parser = parse_target)]
        to: TargetFormat,

        /// Process directories recursively
        #[arg(short, long)]
        recursive: bool,
    },

    /// Remove image backgrounds through a rembg server
    RemoveBg {
        /// Input file or directory
        input: PathBuf,

        /// Output directory (default: current directory)
        #[arg(default_value = ".")]
        output: PathBuf,

        /// Base URL of the rembg server
        #[arg(long, default_value = image_suite_core::removal::rembg::DEFAULT_REMBG_URL)]
        endpoint: String,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,

        /// Process directories recursively
        #[arg(short, long)]
        recursive: bool,
    },
}

fn parse_target(s: &str) -> Result<TargetFormat, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert() {
        let cli = Cli::parse_from(["image_suite", "convert", "photos", "out", "--to", "jpg", "-r"]);
        match cli.command {
            Command::Convert {
                input,
                output,
                to,
                recursive,
            } => {
                assert_eq!(input, PathBuf::from("photos"));
                assert_eq!(output, PathBuf::from("out"));
                assert_eq!(to, TargetFormat::Jpeg);
                assert!(recursive);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_remove_bg_defaults() {
        let cli = Cli::parse_from(["image_suite", "remove-bg", "cat.png"]);
        match cli.command {
            Command::RemoveBg {
                output,
                endpoint,
                timeout,
                ..
            } => {
                assert_eq!(output, PathBuf::from("."));
                assert_eq!(endpoint, "http://127.0.0.1:7000");
                assert_eq!(timeout, 120);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["image_suite", "convert", "a.png", "--to", "tga"]).is_err());
    }
}
