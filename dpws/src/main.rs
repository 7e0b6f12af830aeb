use dpws::cli;

fn main() {
    std::process::exit(cli::run());
}
