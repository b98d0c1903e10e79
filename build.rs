// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Package name list shared by `check` and `install`
fn packages_arg() -> Arg {
    Arg::new("packages")
        .value_name("PACKAGE")
        .required(true)
        .num_args(1..)
        .help("Package names")
}

/// Build the CLI definition for man page generation
///
/// Mirrors src/cli.rs; build scripts cannot use the crate's own modules.
fn build_cli() -> Command {
    Command::new("pkgbridge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Check and install packages through PackageKit or dnf5daemon")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (default: /etc/pkgbridge/config.toml if present)"),
        )
        .subcommand(Command::new("detect").about("Show which package manager backend this host uses"))
        .subcommand(
            Command::new("refresh").about("Refresh repository metadata").arg(
                Arg::new("force")
                    .short('f')
                    .long("force")
                    .action(ArgAction::SetTrue)
                    .help("Discard cached metadata regardless of its age"),
            ),
        )
        .subcommand(
            Command::new("check")
                .about("Show which packages are missing and what installing them involves")
                .arg(packages_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the result as JSON"),
                ),
        )
        .subcommand(
            Command::new("install")
                .about("Install missing packages")
                .arg(packages_arg())
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Do not ask for confirmation"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("pkgbridge.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
