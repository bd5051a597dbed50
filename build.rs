use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let pkg = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    let version = match short_commit() {
        Some(commit) => format!("{pkg}+{commit}"),
        None => pkg,
    };

    println!("cargo:rustc-env=REELSHELF_VERSION={version}");
}

/// Short hash of HEAD with a `.dirty` marker for uncommitted changes.
fn short_commit() -> Option<String> {
    let head = git(&["rev-parse", "--short=10", "HEAD"])?;
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .map(|s| !s.is_empty())
        .unwrap_or(false);

    Some(if dirty { format!("{head}.dirty") } else { head })
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}
