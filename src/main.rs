fn main() {
    if let Err(err) = center_lookup::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
