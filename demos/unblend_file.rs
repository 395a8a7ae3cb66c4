//! Restore transparency for a single image.
//!
//! Usage:
//! ```sh
//! cargo run --example unblend_file -- input.png output.png [background]
//! ```

use std::env;
use std::process;

use rebuild_transparency::{Background, UnblendEngine, UnblendOptions};

struct Args {
    input: String,
    output: String,
    background: Background,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let program = args.first().map_or("unblend_file", String::as_str);
    let (Some(input), Some(output)) = (args.get(1), args.get(2)) else {
        return Err(format!("Usage: {program} <input> <output> [background]"));
    };
    let background = match args.get(3) {
        Some(s) => s.parse::<Background>().map_err(|e| format!("Error: {e}"))?,
        None => Background::WHITE,
    };
    Ok(Args {
        input: input.clone(),
        output: output.clone(),
        background,
    })
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let args = match parse_args(&args) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{msg}");
            process::exit(1);
        }
    };

    let engine = UnblendEngine::new(UnblendOptions {
        background: args.background,
        ..UnblendOptions::default()
    });
    let result = engine.process_file(args.input.as_ref(), args.output.as_ref());

    if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
