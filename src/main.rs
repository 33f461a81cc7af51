fn main() {
    if let Err(err) = huntboard::cli::run() {
        huntboard::ui::eprintln_error(&err);
        std::process::exit(huntboard::exit::exit_code(&err));
    }
}
