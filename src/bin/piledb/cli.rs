use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use piledb::{Attribute, Checksum, Compression};

#[derive(Parser, Debug)]
#[command(name = "piledb", version, about = "Embedded data pile tool")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Create an empty pile (separate form: <base>, <base>.pm, <base>.pi)
    Init {
        /// Pile base path
        #[arg(long)]
        path: PathBuf,
    },
    /// Store one entry
    Add {
        #[arg(long)]
        path: PathBuf,
        /// Attribute in name=value form; repeatable
        #[arg(short = 'a', long = "attr")]
        attrs: Vec<String>,
        /// Attribute names to index; repeatable
        #[arg(short = 'i', long = "index")]
        indexed: Vec<String>,
        /// none | gzip | bzip2
        #[arg(long, default_value = "none")]
        compression: String,
        /// none | crc32 | md5 | sha1
        #[arg(long, default_value = "none")]
        checksum: String,
        /// Literal entry content
        #[arg(long, conflicts_with = "data_file")]
        data: Option<String>,
        /// Read entry content from a file
        #[arg(long)]
        data_file: Option<PathBuf>,
    },
    /// Look up entries by an indexed attribute value
    Find {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        value: String,
        #[arg(long)]
        json: bool,
    },
    /// Print one entry's content
    Cat {
        #[arg(long)]
        path: PathBuf,
        /// Metadata offset of the entry
        #[arg(long, conflicts_with_all = ["name", "value"])]
        offset: Option<u64>,
        /// Indexed attribute to resolve the entry by (first match wins)
        #[arg(long, requires = "value")]
        name: Option<String>,
        #[arg(long, requires = "name")]
        value: Option<String>,
        /// Write content here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List every entry
    List {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Pile summary
    Status {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Recompute chunk checksums of every entry
    Verify {
        #[arg(long)]
        path: PathBuf,
    },
    /// Pack the separate files into one read-only compound file
    Compound {
        #[arg(long)]
        path: PathBuf,
    },
}

pub fn parse_compression(s: &str) -> Result<Compression> {
    match s {
        "none" => Ok(Compression::None),
        "gzip" => Ok(Compression::Gzip),
        "bzip2" => Ok(Compression::Bzip2),
        _ => Err(anyhow!("unknown compression '{}' (none|gzip|bzip2)", s)),
    }
}

pub fn parse_checksum(s: &str) -> Result<Checksum> {
    match s {
        "none" => Ok(Checksum::None),
        "crc32" => Ok(Checksum::Crc32),
        "md5" => Ok(Checksum::Md5),
        "sha1" => Ok(Checksum::Sha1),
        _ => Err(anyhow!("unknown checksum '{}' (none|crc32|md5|sha1)", s)),
    }
}

/// `name=value` attribute arguments; names listed in `indexed` get indexed.
pub fn parse_attrs(raw: &[String], indexed: &[String]) -> Result<Vec<Attribute>> {
    let mut out = Vec::with_capacity(raw.len());
    for spec in raw {
        let (name, value) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("attribute '{}' is not name=value", spec))?;
        out.push(Attribute::new(
            name,
            value.as_bytes().to_vec(),
            indexed.iter().any(|n| n == name),
        ));
    }
    Ok(out)
}
