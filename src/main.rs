fn main() {
    if autoheal_cli::cli::app::run().is_err() {
        std::process::exit(1);
    }
}
