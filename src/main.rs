fn main() {
    if let Err(e) = causerie::cli::run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
