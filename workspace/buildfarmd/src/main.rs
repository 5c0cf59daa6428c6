fn main() {
    if let Err(e) = cli::run_cli() {
        eprintln!("buildfarmd: {e}");
        std::process::exit(1);
    }
}
