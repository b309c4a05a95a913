//! Build script: renders the stratumd(8) manual page for packagers.

use std::{env, fs, io, path::Path, path::PathBuf};

use time::{OffsetDateTime, format_description::well_known::Iso8601};

const EPOCH_DATE: &str = "1970-01-01";

/// Date stamped into the page; honours `SOURCE_DATE_EPOCH` for
/// reproducible builds.
fn page_date() -> String {
    let Ok(raw) = env::var("SOURCE_DATE_EPOCH") else {
        return EPOCH_DATE.to_owned();
    };
    raw.parse::<i64>()
        .ok()
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .and_then(|moment| moment.format(&Iso8601::DATE).ok())
        .unwrap_or_else(|| {
            println!("cargo:warning=ignoring unusable SOURCE_DATE_EPOCH '{raw}'");
            EPOCH_DATE.to_owned()
        })
}

fn render(name: &str, version: &str, date: &str) -> String {
    let title = name.to_uppercase();
    format!(
        ".TH \"{title}\" \"8\" \"{date}\" \"{name} {version}\" \"System Manager's Manual\"\n\
.SH NAME\n\
{name} \\- root broker daemon for systemless modules\n\
.SH SYNOPSIS\n\
.B {name}\n\
.SH DESCRIPTION\n\
{name} serves privileged requests over a Unix socket, tracks the boot\n\
stages, mounts installed modules over the system partitions and keeps\n\
property overrides.\n\
.SH ENVIRONMENT\n\
.TP\n\
.B STRATUM_FOREGROUND\n\
Stay attached to the parent instead of daemonising.\n\
.TP\n\
.B STRATUM_CONFIG_PATH\n\
Configuration file to load.\n"
    )
}

fn write_page(dir: &Path, file_name: &str, page: &str) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let staged = dir.join(format!("{file_name}.tmp"));
    fs::write(&staged, page)?;
    fs::rename(&staged, dir.join(file_name))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let name = env::var("CARGO_PKG_NAME")?;
    let version = env::var("CARGO_PKG_VERSION")?;
    let page = render(&name, &version, &page_date());
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR is not set")?);
    write_page(&out_dir, &format!("{name}.8"), &page)?;
    Ok(())
}
