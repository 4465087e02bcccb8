//! User-facing console messages. Diagnostics go through `tracing` instead.

use ansi_term::Colour;
use std::fmt;

const ICON_INFO: &str = "ℹ️";
const ICON_OK: &str = "✅";
const ICON_WARN: &str = "⚠️";
const ICON_ERR: &str = "❌";

pub fn info<T: fmt::Display>(msg: T) {
    println!("{} {}", Colour::Blue.bold().paint(ICON_INFO), msg);
}

pub fn success<T: fmt::Display>(msg: T) {
    println!("{} {}", Colour::Green.bold().paint(ICON_OK), msg);
}

pub fn warning<T: fmt::Display>(msg: T) {
    println!("{} {}", Colour::Yellow.bold().paint(ICON_WARN), msg);
}

pub fn error<T: fmt::Display>(msg: T) {
    eprintln!("{} {}", Colour::Red.bold().paint(ICON_ERR), msg);
}

/// Section header, one per client in the status view.
pub fn header<T: fmt::Display>(msg: T) {
    println!(
        "{}",
        Colour::Blue
            .bold()
            .paint(format!("====================== {msg}"))
    );
}
