fn main() {
    if let Err(err) = ppmidb::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
