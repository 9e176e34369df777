//! Shared helpers for driving the `testkit` binary.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const FILTER_TOOL: &str =
    "toolshed.g2.bx.psu.edu/repos/imgteam/2d_simple_filter/ip_filter_standard/1.12.0+galaxy1";
pub const UNZIP_TOOL: &str = "toolshed.g2.bx.psu.edu/repos/imgteam/unzip/unzip/6.0+galaxy0";
pub const SPURIOUS_TOOL: &str =
    "toolshed.g2.bx.psu.edu/repos/bgruening/graphicsmagick_image_convert/graphicsmagick_image_convert/1.3.45";

pub fn testkit(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_testkit"))
        .args(args)
        .current_dir(cwd)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run testkit")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "testkit failed: {}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Catalog expecting the filter tool and one tool no run exercises.
pub fn write_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("tools.csv");
    fs::write(
        &path,
        "Suite ID,Tool IDs\n\
         2d_simple_filter,['ip_filter_standard']\n\
         2d_auto_threshold,\"['ip_threshold']\"\n",
    )
    .expect("write catalog");
    path
}

pub fn write_tar(path: &Path, members: &[(&str, String)]) {
    let file = fs::File::create(path).expect("create archive");
    let mut builder = tar::Builder::new(file);
    for (name, contents) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .expect("append member");
    }
    builder.finish().expect("finish archive");
}
