fn main() {
    if let Err(err) = edgeloom::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
