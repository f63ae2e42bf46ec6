//! `translate-proxy-migrate` — offline cache migration CLI.
//!
//! Usage:
//!   translate-proxy-migrate --from <text|sqlite> --from-config <path> \
//!                            --to <text|sqlite> --to-config <path> \
//!                            [--no-progress]
//!
//! Manual argument matching, no CLI-parsing crate.

use std::path::PathBuf;
use translate_proxy::cache::backend::{Backend, BackendKind};
#[cfg(feature = "sqlite")]
use translate_proxy::cache::sqlite_backend::SqliteBackend;
use translate_proxy::cache::text_backend::TextBackend;
use translate_proxy::migrate::migrate;
use translate_proxy::output::{print_error, print_info, print_progress, print_success};

struct Args {
    from_kind: BackendKind,
    from_path: PathBuf,
    to_kind: BackendKind,
    to_path: PathBuf,
    show_progress: bool,
}

fn parse_args() -> Result<Args, String> {
    let raw: Vec<String> = std::env::args().skip(1).collect();

    let mut from_kind = None;
    let mut from_path = None;
    let mut to_kind = None;
    let mut to_path = None;
    let mut show_progress = true;

    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "--from" => {
                from_kind = Some(parse_kind(raw.get(i + 1).ok_or("--from needs a value")?)?);
                i += 2;
            }
            "--from-config" => {
                from_path = Some(PathBuf::from(raw.get(i + 1).ok_or("--from-config needs a value")?));
                i += 2;
            }
            "--to" => {
                to_kind = Some(parse_kind(raw.get(i + 1).ok_or("--to needs a value")?)?);
                i += 2;
            }
            "--to-config" => {
                to_path = Some(PathBuf::from(raw.get(i + 1).ok_or("--to-config needs a value")?));
                i += 2;
            }
            "--no-progress" => {
                show_progress = false;
                i += 1;
            }
            other => return Err(format!("unrecognized argument: {other}")),
        }
    }

    Ok(Args {
        from_kind: from_kind.ok_or("--from is required")?,
        from_path: from_path.ok_or("--from-config is required")?,
        to_kind: to_kind.ok_or("--to is required")?,
        to_path: to_path.ok_or("--to-config is required")?,
        show_progress,
    })
}

fn parse_kind(s: &str) -> Result<BackendKind, String> {
    match s {
        "text" => Ok(BackendKind::Text),
        "sqlite" => Ok(BackendKind::Sqlite),
        other => Err(format!("unsupported backend kind: {other}")),
    }
}

fn open_backend(kind: BackendKind, path: &PathBuf) -> Result<Box<dyn Backend>, String> {
    match kind {
        BackendKind::Text => TextBackend::open(path)
            .map(|b| Box::new(b) as Box<dyn Backend>)
            .map_err(|e| e.to_string()),
        #[cfg(feature = "sqlite")]
        BackendKind::Sqlite => SqliteBackend::open(path)
            .map(|b| Box::new(b) as Box<dyn Backend>)
            .map_err(|e| e.to_string()),
        #[cfg(not(feature = "sqlite"))]
        BackendKind::Sqlite => Err("this build was compiled without the `sqlite` feature".into()),
        BackendKind::Mongodb | BackendKind::Redis => {
            Err(format!("backend kind {kind} is not supported"))
        }
    }
}

fn main() {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    };

    print_info(&format!(
        "migrating {} ({}) -> {} ({})",
        args.from_path.display(),
        args.from_kind,
        args.to_path.display(),
        args.to_kind
    ));

    let mut source = match open_backend(args.from_kind, &args.from_path) {
        Ok(b) => b,
        Err(e) => {
            print_error(&format!("failed to open source backend: {e}"));
            std::process::exit(1);
        }
    };
    let mut destination = match open_backend(args.to_kind, &args.to_path) {
        Ok(b) => b,
        Err(e) => {
            print_error(&format!("failed to open destination backend: {e}"));
            std::process::exit(1);
        }
    };

    let now = chrono::Utc::now().timestamp();
    let show_progress = args.show_progress;
    let result = migrate(source.as_mut(), destination.as_mut(), now, |n| {
        if show_progress {
            print_progress(&format!("migrated {n} entries so far"));
        }
    });

    match result {
        Ok(report) => {
            print_success(&format!(
                "migration complete: {} migrated, {} failed",
                report.migrated, report.failed
            ));
            if report.failed > 0 {
                std::process::exit(1);
            }
        }
        Err(e) => {
            print_error(&format!("migration failed: {e}"));
            std::process::exit(1);
        }
    }
}
