//! Decode a TRE region (consecutive TAG/LENGTH/PAYLOAD frames) and print it.
//!
//! Usage:
//!   tre_dump [OPTIONS] <FILE>      (`-` reads stdin)
//!
//! Log verbosity follows `RUST_LOG`, e.g. `RUST_LOG=nitf_tre=debug`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use nitf_tre::codec::{CodecOptions, MalformedPolicy};
use nitf_tre::{dump, frame, Codec, Registry, SegmentKind};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tre_dump", version, about = "Decode and print NITF TREs")]
struct Args {
    /// File holding the TRE region, or `-` for stdin.
    input: PathBuf,

    /// Descriptor files or directories, registered after the built-ins.
    #[arg(short, long, env = "NITF_TRE_DESCRIPTORS", value_delimiter = ',')]
    descriptors: Vec<PathBuf>,

    /// Segment the region came from: file, image, graphic, symbol, label, text or des.
    #[arg(short, long, default_value = "image")]
    segment: SegmentKind,

    /// Keep malformed TREs as raw bytes instead of failing.
    #[arg(long)]
    lenient: bool,

    /// Print `KEY=VALUE` lines instead of a tree.
    #[arg(long)]
    flat: bool,

    /// Re-encode the decoded TREs and verify the bytes match the input.
    #[arg(long)]
    check: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut registry = Registry::with_builtins().context("built-in descriptors")?;
    for path in &args.descriptors {
        registry
            .register_path(path)
            .with_context(|| format!("loading descriptors from {}", path.display()))?;
    }
    tracing::debug!(tags = ?registry.tags(), "registry ready");

    let bytes = read_input(&args.input)?;
    let options = CodecOptions {
        on_malformed: if args.lenient { MalformedPolicy::Raw } else { MalformedPolicy::Fail },
    };
    let codec = Codec::with_options(&registry, options);
    let tres = frame::decode_region(&codec, &bytes, args.segment)
        .with_context(|| format!("decoding {}", args.input.display()))?;

    for tre in &tres {
        if args.flat {
            for (key, value) in dump::flatten(tre, &registry) {
                println!("{}.{}={}", tre.name, key, value);
            }
        } else {
            print!("{}", dump::format_tre(tre, &registry));
        }
    }

    if args.check {
        let encoded = frame::serialize_all(&codec, &tres, args.segment).context("re-encoding")?;
        if encoded != bytes {
            bail!("re-encoded region differs from input ({} vs {} bytes)", encoded.len(), bytes.len());
        }
        eprintln!("round trip OK: {} TREs, {} bytes", tres.len(), bytes.len());
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("reading stdin")?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))
    }
}
