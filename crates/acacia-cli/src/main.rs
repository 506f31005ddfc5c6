//! `acacia` - compile Acacia sources to a tree of `.mcfunction` files.

mod cli;

use std::backtrace::Backtrace;
use std::io::IsTerminal;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

use clap::Parser;

use crate::cli::Cli;

/// Location and backtrace captured by the panic hook, at the panic site.
static PANIC_DETAIL: Mutex<Option<(String, Backtrace)>> = Mutex::new(None);

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let (source, out, config) = match cli.into_parts() {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("Acacia: error: option {}: {}", e.option, e.reason);
            return 2;
        }
    };

    // An internal panic is a compiler bug, not a user error: report it as a
    // one-line message, with the captured traceback under --verbose.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map_or_else(|| "unknown location".to_string(), |l| l.to_string());
        if let Ok(mut detail) = PANIC_DETAIL.lock() {
            *detail = Some((location, Backtrace::force_capture()));
        }
    }));
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        acacia_compiler::compile_file(&source, config)
    }));
    std::panic::set_hook(default_hook);

    let (sources, result) = match outcome {
        Ok(pair) => pair,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let detail = PANIC_DETAIL.lock().ok().and_then(|mut d| d.take());
            match &detail {
                Some((location, _)) => {
                    eprintln!("Acacia: internal error: {message} (at {location})");
                }
                None => eprintln!("Acacia: internal error: {message}"),
            }
            if verbose {
                match detail {
                    Some((_, backtrace)) => eprintln!("{backtrace}"),
                    None => eprintln!("{}", Backtrace::force_capture()),
                }
            } else {
                eprintln!("Acacia: rerun with --verbose for a traceback");
            }
            return 1;
        }
    };

    match result {
        Ok(pack) => {
            if let Err(e) = pack.write(&out) {
                eprintln!("Acacia: error: {e}");
                return 1;
            }
            if verbose {
                eprintln!(
                    "Acacia: wrote {} files under {}",
                    pack.files.len(),
                    out.display()
                );
            }
            0
        }
        Err(diag) => {
            let colored = std::io::stderr().is_terminal();
            eprintln!(
                "{}",
                diag.printer().sources(&sources).colored(colored).render()
            );
            if verbose {
                eprintln!("Acacia: error code: {}", diag.code());
            }
            1
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "unknown panic"
    }
}
