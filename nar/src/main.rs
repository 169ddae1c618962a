use std::path::PathBuf;

use structopt::clap::AppSettings::*;
use structopt::StructOpt;

mod commands;
mod error;

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "ls", about = "List the entries of a NAR")]
    List {
        #[structopt(short = "R", long, help = "List subdirectories recursively")]
        recursive: bool,

        #[structopt(short, long, help = "Show type, permissions, size and link targets")]
        long: bool,

        #[structopt(name = "narfile", parse(from_os_str), help = "Path to the .nar file")]
        nar: PathBuf,

        #[structopt(default_value = "/", help = "Path inside the NAR")]
        path: String,
    },

    #[structopt(name = "cat", about = "Print the contents of a regular file in a NAR")]
    Cat {
        #[structopt(
            long,
            parse(from_os_str),
            help = "Read only the file's byte range, using offsets from this JSON listing"
        )]
        listing: Option<PathBuf>,

        #[structopt(name = "narfile", parse(from_os_str), help = "Path to the .nar file")]
        nar: PathBuf,

        #[structopt(help = "Path inside the NAR")]
        path: String,
    },

    #[structopt(name = "readlink", about = "Print the target of a symlink in a NAR")]
    ReadLink {
        #[structopt(name = "narfile", parse(from_os_str), help = "Path to the .nar file")]
        nar: PathBuf,

        #[structopt(help = "Path inside the NAR")]
        path: String,
    },

    #[structopt(name = "listing", about = "Print a JSON listing of a NAR")]
    Listing {
        #[structopt(long, help = "Do not descend into subdirectories")]
        shallow: bool,

        #[structopt(name = "narfile", parse(from_os_str), help = "Path to the .nar file")]
        nar: PathBuf,

        #[structopt(default_value = "/", help = "Path inside the NAR")]
        path: String,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "nar",
    about = "Inspect Nix archives without unpacking them.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands]
)]
struct CliOpts {
    #[structopt(short, long, help = "Show verbose output", global = true)]
    verbose: bool,

    #[structopt(subcommand)]
    cmd: Commands,
}

fn main() {
    let opts = CliOpts::from_iter(wild::args_os());

    tracing_subscriber::fmt()
        .with_max_level(if opts.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    let result = match opts.cmd {
        Commands::List {
            recursive,
            long,
            nar,
            path,
        } => commands::ls(&nar, &path, recursive, long),
        Commands::Cat { listing, nar, path } => commands::cat(&nar, &path, listing.as_deref()),
        Commands::ReadLink { nar, path } => commands::readlink(&nar, &path),
        Commands::Listing { shallow, nar, path } => commands::listing(&nar, &path, shallow),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
