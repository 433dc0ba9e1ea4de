mod cli;
mod cmd_add;
mod cmd_cat;
mod cmd_compound;
mod cmd_find;
mod cmd_init;
mod cmd_list;
mod cmd_status;
mod cmd_verify;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Cmd};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Init { path } => cmd_init::exec(&path),
        Cmd::Add {
            path,
            attrs,
            indexed,
            compression,
            checksum,
            data,
            data_file,
        } => cmd_add::exec(&path, &attrs, &indexed, &compression, &checksum, data, data_file),
        Cmd::Find {
            path,
            name,
            value,
            json,
        } => cmd_find::exec(&path, &name, &value, json),
        Cmd::Cat {
            path,
            offset,
            name,
            value,
            out,
        } => cmd_cat::exec(&path, offset, name.as_deref(), value.as_deref(), out),
        Cmd::List { path, json } => cmd_list::exec(&path, json),
        Cmd::Status { path, json } => cmd_status::exec(&path, json),
        Cmd::Verify { path } => cmd_verify::exec(&path),
        Cmd::Compound { path } => cmd_compound::exec(&path),
    }
}
