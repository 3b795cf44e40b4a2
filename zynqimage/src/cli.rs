//! Command line interface for zynqimage

use crate::arch::Target;
use crate::headers::image::NAME_LEN;
use crate::inspect::{self, ImageInfo, PartitionInfo};
use crate::loader::bitstream;
use crate::manifest::Manifest;
use crate::VERSION;
use anyhow::{Result, anyhow, bail};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::warn;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Command line arguments for zynqimage
#[derive(Parser, Debug)]
#[command(name = "zynqimage")]
#[command(version = VERSION)]
#[command(about = "Boot image assembler for Zynq-7000 and Zynq UltraScale+ MPSoC", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - only output errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble a boot image from a TOML manifest
    Create(CreateArgs),
    /// List the partitions of a boot image
    List(ListArgs),
    /// Write the partitions of a boot image to a directory
    Extract(ExtractArgs),
}

/// Arguments for creating an image
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Manifest describing the partitions
    pub manifest: PathBuf,

    /// Output image file
    #[arg(short, long, default_value = "BOOT.BIN")]
    pub output: PathBuf,

    /// Chip family, overrides the manifest
    #[arg(short, long, value_enum)]
    pub target: Option<TargetArg>,
}

/// Arguments for listing image information
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Boot image to examine
    pub image: PathBuf,

    /// Chip family the image was built for
    #[arg(short, long, value_enum)]
    pub target: TargetArg,
}

/// Arguments for extracting partitions
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Boot image to unpack
    pub image: PathBuf,

    /// Partitions to extract, all of them if none are given
    pub names: Vec<String>,

    /// Chip family the image was built for
    #[arg(short, long, value_enum)]
    pub target: TargetArg,

    /// Output directory
    #[arg(short = 'd', long, default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite existing files
    #[arg(short, long)]
    pub force: bool,

    /// Swap bitstream bytes back to file order
    #[arg(short, long)]
    pub swap: bool,

    /// Rebuild the .bit header of bitstreams, implies --swap
    #[arg(short = 'b', long, value_name = "DESIGN,PART", value_parser = parse_bitstream_header)]
    pub bitstream_header: Option<BitstreamHeader>,
}

/// Design and part name of a rebuilt bitstream header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitstreamHeader {
    pub design: String,
    pub part: String,
}

fn parse_bitstream_header(value: &str) -> std::result::Result<BitstreamHeader, String> {
    match value.split_once(',') {
        Some((design, part)) if !design.is_empty() && !part.is_empty() => Ok(BitstreamHeader {
            design: design.to_string(),
            part: part.to_string(),
        }),
        _ => Err(format!("expected DESIGN,PART, got {value:?}")),
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetArg {
    Zynq,
    Zynqmp,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Zynq => Self::Zynq,
            TargetArg::Zynqmp => Self::ZynqMp,
        }
    }
}

/// Main CLI handler
pub fn run_cli(args: Args) -> Result<()> {
    let verbose = args.verbose && !args.quiet;
    let quiet = args.quiet;

    match args.command {
        Commands::Create(create_args) => handle_create(create_args, verbose, quiet),
        Commands::List(list_args) => handle_list(list_args, verbose),
        Commands::Extract(extract_args) => handle_extract(extract_args, verbose, quiet),
    }
}

fn handle_create(args: CreateArgs, verbose: bool, quiet: bool) -> Result<()> {
    if verbose {
        eprintln!("Reading manifest: {}", args.manifest.display());
    }

    let manifest = Manifest::load(&args.manifest)?;
    let builder = manifest.builder(args.target.map(Target::from))?;

    if verbose {
        for component in builder.get_components().iter().filter(|c| c.is_file()) {
            eprintln!("  {}", component.path.display());
        }
    }

    let size = builder.write_to_file(&args.output)?;

    if !quiet {
        eprintln!(
            "{} {} image: {}",
            "Created".green(),
            builder.target(),
            args.output.display()
        );
        eprintln!("Image size: {size} bytes");
    }
    Ok(())
}

fn read_image(path: &Path, target: TargetArg, verbose: bool) -> Result<(Vec<u8>, ImageInfo)> {
    if verbose {
        eprintln!("Reading image: {}", path.display());
    }
    let data =
        std::fs::read(path).map_err(|e| anyhow!("could not read {}: {e}", path.display()))?;
    let info = inspect::inspect(target.into(), &data)?;
    Ok((data, info))
}

fn handle_list(args: ListArgs, verbose: bool) -> Result<()> {
    let (_, info) = read_image(&args.image, args.target, verbose)?;

    println!("Target:      {}", info.target);
    println!(
        "Bootloader:  {:#010x}, {} bytes",
        info.bootloader_offset, info.bootloader_len
    );
    println!("Partitions:  {}", info.partitions.len());
    for (i, partition) in info.partitions.iter().enumerate() {
        println!();
        println!("  [{i}] {}", partition.name.bold());
        println!("      Offset:     {:#010x}", partition.offset);
        println!("      Size:       {} bytes", partition.len);
        println!("      Load:       {:#010x}", partition.load);
        println!("      Exec:       {:#010x}", partition.exec);
        println!("      Attributes: {:#010x}", partition.attributes);
    }
    Ok(())
}

/// File name a partition is extracted to
///
/// Names come from the image; only the last path component is kept.
fn output_name(index: usize, partition: &PartitionInfo) -> PathBuf {
    match Path::new(&partition.name).file_name() {
        Some(name) => PathBuf::from(name),
        None => {
            let fallback = PathBuf::from(format!("partition{index}.bin"));
            warn!(
                "partition {index} has no usable name ({:?}), writing {}",
                partition.name,
                fallback.display()
            );
            fallback
        }
    }
}

/// Bytes written for one partition
fn extracted_contents(
    args: &ExtractArgs,
    partition: &PartitionInfo,
    image: &[u8],
) -> Result<Vec<u8>> {
    let payload = partition.payload(image)?;
    if !partition.is_bitstream() || !(args.swap || args.bitstream_header.is_some()) {
        return Ok(payload.to_vec());
    }

    let mut contents = match &args.bitstream_header {
        Some(header) => {
            let length = u32::try_from(payload.len())
                .map_err(|_| anyhow!("bitstream {} is too large", partition.name))?;
            bitstream::write_header(
                &header.design,
                &header.part,
                Local::now().naive_local(),
                length,
            )?
        }
        None => Vec::new(),
    };
    contents.extend(bitstream::swap_words(payload));
    Ok(contents)
}

fn handle_extract(args: ExtractArgs, verbose: bool, quiet: bool) -> Result<()> {
    let (data, info) = read_image(&args.image, args.target, verbose)?;

    for name in &args.names {
        if !info.partitions.iter().any(|p| &p.name == name) {
            bail!("no partition named {name} in {}", args.image.display());
        }
    }

    // Decide every output path before writing anything
    let mut selected = Vec::new();
    let mut owners: HashMap<PathBuf, &str> = HashMap::new();
    for (i, partition) in info.partitions.iter().enumerate() {
        if !args.names.is_empty() && !args.names.contains(&partition.name) {
            continue;
        }
        let path = args.dir.join(output_name(i, partition));

        if let Some(previous) = owners.insert(path.clone(), &partition.name) {
            let truncated = partition.name.len() >= NAME_LEN;
            if !args.force {
                bail!(
                    "partitions {previous} and {} both extract to {}{}, use --force to keep the last one",
                    partition.name,
                    path.display(),
                    if truncated { " (names are cut to 32 bytes)" } else { "" }
                );
            }
            warn!(
                "{} is written by more than one partition, keeping {}",
                path.display(),
                partition.name
            );
        } else if !args.force && path.exists() {
            bail!("file {} already exists, use --force to overwrite", path.display());
        }
        selected.push((partition, path));
    }

    std::fs::create_dir_all(&args.dir)
        .map_err(|e| anyhow!("could not create {}: {e}", args.dir.display()))?;

    for (partition, path) in &selected {
        let contents = extracted_contents(&args, partition, &data)?;
        std::fs::write(path, &contents)
            .map_err(|e| anyhow!("could not write {}: {e}", path.display()))?;
        if verbose {
            eprintln!("  {} ({} bytes)", path.display(), contents.len());
        }
    }

    if !quiet {
        eprintln!(
            "{} {} partitions to {}",
            "Extracted".green(),
            selected.len(),
            args.dir.display()
        );
    }
    Ok(())
}
