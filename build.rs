// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn primary_arg() -> Arg {
    Arg::new("primary")
        .required(true)
        .help("Path to primary.xml (plain, .gz, .zst or .xz)")
}

fn build_cli() -> Command {
    Command::new("repomirror")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Repomirror Contributors")
        .about("Inspect RPM repository metadata: dependencies, retention and sync plans")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Log at debug level"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Print results as JSON"),
        )
        .subcommand(
            Command::new("repomd")
                .about("List the sections of a repomd.xml")
                .arg(Arg::new("path").required(true).help("Path to repomd.xml")),
        )
        .subcommand(
            Command::new("packages")
                .about("List the packages of a primary.xml")
                .arg(primary_arg()),
        )
        .subcommand(
            Command::new("deps")
                .about("Show the dependency closure of packages")
                .arg(primary_arg())
                .arg(
                    Arg::new("names")
                        .required(true)
                        .num_args(1..)
                        .help("Package names; the newest version of each is resolved"),
                ),
        )
        .subcommand(
            Command::new("retain")
                .about("Show which packages a retention policy would remove")
                .arg(primary_arg())
                .arg(
                    Arg::new("keep")
                        .short('k')
                        .long("keep")
                        .value_name("N")
                        .help("Versions to keep per package (defaults to sync.retain_newest)"),
                ),
        )
        .subcommand(
            Command::new("diff")
                .about("Plan a sync of a remote primary.xml into a local one")
                .arg(Arg::new("remote").required(true).help("Remote primary.xml"))
                .arg(Arg::new("local").required(true).help("Local primary.xml")),
        )
        .subcommand(
            Command::new("manifest")
                .about("Validate a manifest list")
                .arg(Arg::new("path").required(true).help("Path to the manifest")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("repomirror.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
