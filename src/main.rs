//! pinwatch main entrypoint.

use pinwatch::run;
use pinwatch::ui::messages;

fn main() {
    if let Err(e) = run() {
        messages::error(format!("Error: {}", e));
        std::process::exit(1);
    }
}
