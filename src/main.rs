mod cli;

use clap::Parser;
use cli::Cli;

fn main() {
    quest_engine::logger::init("info");

    let cli = Cli::parse();

    match cli::run(cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
