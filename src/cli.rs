use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::correspondence::{CornerLayout, OutputSize};
use crate::error::Result;
use crate::params::DetectorParams;
use crate::pipeline::RectifyOptions;

/// `-h` is taken by the horizontal resolution, so help is `--help` only
#[derive(Parser, Debug)]
#[command(name = "whiteboard-warp")]
#[command(
    version,
    about = "Rectify a photo of a surface framed by four ArUco markers",
    disable_help_flag = true
)]
pub struct Cli {
    /// Input image
    #[arg(short = 'i', long, default_value = "../markers/input.jpg")]
    pub input: PathBuf,

    /// Output image, format taken from the extension
    #[arg(short = 'o', long, default_value = "./output.jpg")]
    pub output: PathBuf,

    /// Horizontal output resolution, at least 2
    #[arg(
        short = 'h',
        long = "horizontal",
        default_value_t = 1920,
        value_parser = clap::value_parser!(u32).range(2..)
    )]
    pub horizontal: u32,

    /// Vertical output resolution, at least 2
    #[arg(
        short = 'v',
        long = "vertical",
        default_value_t = 1080,
        value_parser = clap::value_parser!(u32).range(2..)
    )]
    pub vertical: u32,

    /// Detector parameters (JSON)
    #[arg(short = 'p', long)]
    pub params: Option<PathBuf>,

    /// Also write the source image with detected markers drawn on it
    #[arg(long, value_name = "PATH")]
    pub markers_out: Option<PathBuf>,

    /// More log output (repeatable)
    #[arg(long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

impl Cli {
    pub fn output_size(&self) -> OutputSize {
        OutputSize::new(self.horizontal, self.vertical)
    }

    /// Resolve the parameter file and assemble pipeline options
    pub fn options(&self) -> Result<RectifyOptions> {
        let params = match &self.params {
            Some(path) => DetectorParams::from_file(path)?,
            None => DetectorParams::default(),
        };
        Ok(RectifyOptions {
            input: self.input.clone(),
            output: self.output.clone(),
            size: self.output_size(),
            layout: CornerLayout::default(),
            params,
            markers_out: self.markers_out.clone(),
        })
    }
}
